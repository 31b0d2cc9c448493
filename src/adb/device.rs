//! Device control for Android automation over ADB.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::sleep;

use super::connection::AdbConnection;
use super::input;
use super::ui_tree::{self, DUMP_PATH};
use crate::config::catalog_for;
use crate::device::{
    Accessibility, AppCatalog, DeviceError, EditableElement, GlobalAction, InstalledApp,
};

/// Duration of the tap used to focus a field before typing.
const FOCUS_TAP: Duration = Duration::from_millis(100);
/// Wait after the focus tap for the keyboard to come up.
const FOCUS_SETTLE: Duration = Duration::from_millis(300);

/// Gestures, keys, text entry and app launching over ADB.
pub struct AdbDevice {
    conn: AdbConnection,
    available: AtomicBool,
}

impl AdbDevice {
    pub fn new(conn: AdbConnection) -> Self {
        Self {
            conn,
            available: AtomicBool::new(false),
        }
    }

    pub fn connection(&self) -> &AdbConnection {
        &self.conn
    }

    /// Check that the device is online and record the result for
    /// [`Accessibility::is_available`]. A missing ADB Keyboard only disables
    /// text input, so it is reported but does not fail the probe.
    pub async fn probe(&self) -> bool {
        let online = self.conn.is_device_online().await;
        self.available.store(online, Ordering::SeqCst);
        if online && !input::is_keyboard_installed(&self.conn).await {
            tracing::warn!(
                "ADB Keyboard is not installed or not enabled; Input actions will fail"
            );
        }
        online
    }

    async fn input_swipe(
        &self,
        from: (i32, i32),
        to: (i32, i32),
        duration: Duration,
    ) -> Result<(), DeviceError> {
        self.conn
            .shell(&[
                "input",
                "swipe",
                &from.0.to_string(),
                &from.1.to_string(),
                &to.0.to_string(),
                &to.1.to_string(),
                &duration.as_millis().to_string(),
            ])
            .await?;
        Ok(())
    }

    /// Dump the active window and list its editable elements.
    async fn editable_elements(&self) -> Result<Vec<EditableElement>, DeviceError> {
        self.conn
            .shell(&["uiautomator", "dump", DUMP_PATH])
            .await?;
        let (xml, _) = self.conn.exec_out(&["cat", DUMP_PATH]).await?;
        Ok(ui_tree::editable_elements(&String::from_utf8_lossy(&xml)))
    }
}

/// Keycode sent for a global action.
fn keycode(action: GlobalAction) -> &'static str {
    match action {
        GlobalAction::Back => "4",
        GlobalAction::Home => "KEYCODE_HOME",
    }
}

/// Parse the output of `pm list packages`.
pub fn parse_packages(stdout: &str) -> BTreeSet<String> {
    stdout
        .lines()
        .filter_map(|line| line.trim().strip_prefix("package:"))
        .filter(|package| !package.is_empty())
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl Accessibility for AdbDevice {
    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn tap(&self, x: i32, y: i32, duration: Duration) -> Result<(), DeviceError> {
        // `input tap` has no duration, so press in place instead
        self.input_swipe((x, y), (x, y), duration).await
    }

    async fn swipe(
        &self,
        from: (i32, i32),
        to: (i32, i32),
        duration: Duration,
    ) -> Result<(), DeviceError> {
        self.input_swipe(from, to, duration).await
    }

    async fn global_action(&self, action: GlobalAction) -> Result<(), DeviceError> {
        self.conn
            .shell(&["input", "keyevent", keycode(action)])
            .await?;
        Ok(())
    }

    async fn focused_editable(&self) -> Result<Option<EditableElement>, DeviceError> {
        Ok(self
            .editable_elements()
            .await?
            .into_iter()
            .find(|element| element.focused))
    }

    async fn find_editable(&self) -> Result<Option<EditableElement>, DeviceError> {
        Ok(self.editable_elements().await?.into_iter().next())
    }

    async fn set_text(&self, element: &EditableElement, text: &str) -> Result<(), DeviceError> {
        if !element.focused {
            let (x, y) = element.bounds.center();
            self.tap(x, y, FOCUS_TAP).await?;
            sleep(FOCUS_SETTLE).await;
        }
        input::replace_text(&self.conn, text).await
    }
}

#[async_trait]
impl AppCatalog for AdbDevice {
    async fn installed_apps(&self) -> Result<Vec<InstalledApp>, DeviceError> {
        let stdout = self.conn.shell(&["pm", "list", "packages"]).await?;
        let packages = parse_packages(&stdout);
        if packages.is_empty() {
            return Err(DeviceError::InvalidOutput(
                "pm list packages returned no packages".to_string(),
            ));
        }
        Ok(catalog_for(&packages))
    }

    async fn launch(&self, app: &InstalledApp) -> Result<(), DeviceError> {
        let stdout = self
            .conn
            .shell(&[
                "monkey",
                "-p",
                &app.package,
                "-c",
                "android.intent.category.LAUNCHER",
                "1",
            ])
            .await?;
        if stdout.contains("No activities found") {
            return Err(DeviceError::CommandFailed(format!(
                "{} has no launcher activity",
                app.package
            )));
        }
        Ok(())
    }

    async fn open_system_settings(&self) -> Result<(), DeviceError> {
        self.conn
            .shell(&["am", "start", "-a", "android.settings.SETTINGS"])
            .await?;
        Ok(())
    }
}
