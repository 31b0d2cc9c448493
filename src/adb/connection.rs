//! ADB connection management for local and remote devices.

use std::process::Output;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use crate::device::DeviceError;

/// Default limit for a single adb invocation.
const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(15);

/// Type of ADB connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionType {
    Usb,
    Wifi,
    Remote,
}

/// Information about a connected device.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub device_id: String,
    pub status: String,
    pub connection_type: ConnectionType,
    pub model: Option<String>,
}

impl DeviceInfo {
    pub fn is_online(&self) -> bool {
        self.status == "device"
    }
}

/// Runs adb commands against one device (or the only attached one).
///
/// # Example
/// ```rust,no_run
/// use autoglm_client::adb::AdbConnection;
///
/// # async fn demo() -> Result<(), autoglm_client::device::DeviceError> {
/// let conn = AdbConnection::new().with_device("192.168.1.100:5555");
/// conn.connect("192.168.1.100:5555").await?;
/// let devices = conn.list_devices().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct AdbConnection {
    adb_path: String,
    device_id: Option<String>,
    command_timeout: Duration,
}

impl Default for AdbConnection {
    fn default() -> Self {
        Self::new()
    }
}

impl AdbConnection {
    /// Create a new ADB connection with default path.
    pub fn new() -> Self {
        Self {
            adb_path: "adb".to_string(),
            device_id: None,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    /// Create a new ADB connection with custom ADB path.
    pub fn with_path(mut self, adb_path: impl Into<String>) -> Self {
        self.adb_path = adb_path.into();
        self
    }

    /// Target a specific device. Empty ids mean "the only attached device".
    pub fn with_device(mut self, device_id: impl Into<String>) -> Self {
        let device_id = device_id.into();
        self.device_id = (!device_id.trim().is_empty()).then_some(device_id);
        self
    }

    pub fn with_timeout(mut self, command_timeout: Duration) -> Self {
        self.command_timeout = command_timeout;
        self
    }

    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }

    /// Arguments placed before every command.
    pub(crate) fn prefix_args(&self) -> Vec<&str> {
        match &self.device_id {
            Some(id) => vec!["-s", id.as_str()],
            None => Vec::new(),
        }
    }

    async fn run(&self, args: &[&str], target_device: bool) -> Result<Output, DeviceError> {
        let mut command = Command::new(&self.adb_path);
        if target_device {
            command.args(self.prefix_args());
        }
        command.args(args).kill_on_drop(true);

        let output = timeout(self.command_timeout, command.output())
            .await
            .map_err(|_| {
                DeviceError::CommandFailed(format!(
                    "adb {} timed out after {}s",
                    args.join(" "),
                    self.command_timeout.as_secs()
                ))
            })??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DeviceError::CommandFailed(format!(
                "adb {}: {}",
                args.join(" "),
                stderr.trim()
            )));
        }
        Ok(output)
    }

    /// Run `adb shell <args>` and return stdout.
    pub async fn shell(&self, args: &[&str]) -> Result<String, DeviceError> {
        let mut full = Vec::with_capacity(args.len() + 1);
        full.push("shell");
        full.extend_from_slice(args);
        let output = self.run(&full, true).await?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Run `adb exec-out <args>` and return raw stdout and stderr.
    pub async fn exec_out(&self, args: &[&str]) -> Result<(Vec<u8>, String), DeviceError> {
        let mut full = Vec::with_capacity(args.len() + 1);
        full.push("exec-out");
        full.extend_from_slice(args);
        let output = self.run(&full, true).await?;
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        Ok((output.stdout, stderr))
    }

    /// Connect to a remote device via TCP/IP. A missing port defaults to 5555.
    pub async fn connect(&self, address: &str) -> Result<String, DeviceError> {
        let address = if address.contains(':') {
            address.to_string()
        } else {
            format!("{}:5555", address)
        };

        let output = self.run(&["connect", &address], false).await?;
        let combined = format!(
            "{}{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );

        // adb exits 0 even when the connection is refused
        let lower = combined.to_lowercase();
        if !lower.contains("failed") && lower.contains("connected") {
            Ok(format!("Connected to {}", address))
        } else {
            Err(DeviceError::CommandFailed(combined.trim().to_string()))
        }
    }

    /// List all attached devices.
    pub async fn list_devices(&self) -> Result<Vec<DeviceInfo>, DeviceError> {
        let output = self.run(&["devices", "-l"], false).await?;
        Ok(parse_devices(&String::from_utf8_lossy(&output.stdout)))
    }

    /// Whether the targeted device is attached and authorized.
    pub async fn is_device_online(&self) -> bool {
        match self.list_devices().await {
            Ok(devices) => match &self.device_id {
                Some(id) => devices.iter().any(|d| &d.device_id == id && d.is_online()),
                None => devices.iter().any(DeviceInfo::is_online),
            },
            Err(e) => {
                tracing::warn!(error = %e, "adb devices failed");
                false
            }
        }
    }
}

/// Parse the output of `adb devices -l`.
pub fn parse_devices(stdout: &str) -> Vec<DeviceInfo> {
    stdout
        .lines()
        .skip(1)
        .filter_map(|line| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 2 {
                return None;
            }
            let device_id = parts[0].to_string();

            let connection_type = if device_id.contains(':') {
                ConnectionType::Remote
            } else if parts.iter().any(|p| p.starts_with("usb:")) {
                ConnectionType::Usb
            } else {
                ConnectionType::Wifi
            };

            let model = parts
                .iter()
                .find_map(|p| p.strip_prefix("model:"))
                .map(str::to_string);

            Some(DeviceInfo {
                device_id,
                status: parts[1].to_string(),
                connection_type,
                model,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_args() {
        let conn = AdbConnection::new();
        assert!(conn.prefix_args().is_empty());

        let conn = AdbConnection::new().with_device("device123");
        assert_eq!(conn.prefix_args(), vec!["-s", "device123"]);

        let conn = AdbConnection::new().with_device("  ");
        assert_eq!(conn.device_id(), None);
    }

    #[test]
    fn test_parse_devices() {
        let stdout = "List of devices attached\n\
            R58M1234ABC    device usb:1-1 product:a51 model:SM_A515F device:a51\n\
            192.168.1.100:5555 offline product:x model:Pixel_7\n\
            \n";
        let devices = parse_devices(stdout);

        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].device_id, "R58M1234ABC");
        assert_eq!(devices[0].connection_type, ConnectionType::Usb);
        assert_eq!(devices[0].model.as_deref(), Some("SM_A515F"));
        assert!(devices[0].is_online());
        assert_eq!(devices[1].connection_type, ConnectionType::Remote);
        assert!(!devices[1].is_online());
    }

    #[test]
    fn test_parse_devices_empty() {
        assert!(parse_devices("List of devices attached\n\n").is_empty());
    }
}
