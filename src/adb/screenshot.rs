//! Screen capture for Android devices via `screencap`.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};

use super::connection::AdbConnection;
use crate::device::{DeviceError, Frame, ScreenCapture};

const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";

/// Captures the screen with `adb exec-out screencap -p`, which streams the
/// PNG to stdout without touching the device or host disk.
///
/// Every poll takes a new capture, so the source never serves an old frame
/// itself; reuse of the last good frame is left to
/// [`crate::device::FrameCache`].
pub struct AdbScreenCapture {
    conn: AdbConnection,
    ready: AtomicBool,
}

impl AdbScreenCapture {
    pub fn new(conn: AdbConnection) -> Self {
        Self {
            conn,
            ready: AtomicBool::new(false),
        }
    }

    /// Check that the device is online and record the result for
    /// [`ScreenCapture::is_ready`].
    pub async fn probe(&self) -> bool {
        let ready = self.conn.is_device_online().await;
        self.ready.store(ready, Ordering::SeqCst);
        ready
    }

    async fn capture(&self) -> Result<Frame, DeviceError> {
        let (png, stderr) = self.conn.exec_out(&["screencap", "-p"]).await?;
        // Secure windows (payment pages and the like) make screencap fail
        if stderr.contains("Status: -1") || stderr.contains("Failed") {
            return Err(DeviceError::CommandFailed(format!(
                "screencap refused: {}",
                stderr.trim()
            )));
        }
        decode_screencap(&png)
    }
}

/// Decode `screencap -p` output into a frame.
pub fn decode_screencap(png: &[u8]) -> Result<Frame, DeviceError> {
    if !png.starts_with(PNG_MAGIC) {
        return Err(DeviceError::InvalidOutput(format!(
            "screencap returned {} bytes without a PNG header",
            png.len()
        )));
    }
    Frame::from_bytes(png).map_err(|e| DeviceError::InvalidOutput(e.to_string()))
}

#[async_trait]
impl ScreenCapture for AdbScreenCapture {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn latest_frame(&self) -> Option<Frame> {
        match self.capture().await {
            Ok(frame) => Some(frame),
            Err(e) => {
                tracing::warn!(error = %e, "Screenshot failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, RgbImage};
    use std::io::Cursor;

    #[test]
    fn test_decode_screencap_png() {
        let mut png = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(RgbImage::new(72, 160))
            .write_to(&mut png, ImageFormat::Png)
            .unwrap();

        let frame = decode_screencap(png.get_ref()).unwrap();
        assert_eq!(frame.size().width, 72);
        assert_eq!(frame.size().height, 160);
    }

    #[test]
    fn test_decode_screencap_rejects_non_png() {
        assert!(matches!(
            decode_screencap(b"error: device offline"),
            Err(DeviceError::InvalidOutput(_))
        ));
        assert!(decode_screencap(b"").is_err());
    }

    #[test]
    fn test_not_ready_until_probed() {
        let capture = AdbScreenCapture::new(AdbConnection::new());
        assert!(!capture.is_ready());
    }
}
