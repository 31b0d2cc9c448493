//! Device collaborators the agent loop is built against.
//!
//! The loop never talks to a platform directly. It receives a screen source,
//! a gesture/accessibility surface and an app catalog at construction time,
//! which keeps it testable and lets the [`crate::adb`] backend be swapped for
//! any other transport.

mod capture;
#[cfg(test)]
pub(crate) mod fake;
mod frame;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

pub use capture::{CapturedFrame, FrameCache};
pub use frame::{EncodedFrame, Frame, FrameError, ScreenSize};

/// Errors reported by device collaborators.
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("Accessibility service is not available")]
    Unavailable,
    #[error("Command execution failed: {0}")]
    CommandFailed(String),
    #[error("Unexpected device output: {0}")]
    InvalidOutput(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Global navigation actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalAction {
    Back,
    Home,
}

impl GlobalAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            GlobalAction::Back => "back",
            GlobalAction::Home => "home",
        }
    }
}

/// Pixel rectangle of an on-screen element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Bounds {
    pub fn center(&self) -> (i32, i32) {
        ((self.left + self.right) / 2, (self.top + self.bottom) / 2)
    }
}

/// An editable element found in the active window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditableElement {
    pub resource_id: Option<String>,
    pub bounds: Bounds,
    pub focused: bool,
}

/// An application entry as seen by the launcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledApp {
    /// Human-readable label.
    pub label: String,
    pub package: String,
}

/// Source of screen frames.
///
/// Implementations must tolerate being polled faster than new frames arrive:
/// they return the newest frame they have or `None`.
#[async_trait]
pub trait ScreenCapture: Send + Sync {
    /// Whether the capture session has been granted and is running.
    fn is_ready(&self) -> bool;

    async fn latest_frame(&self) -> Option<Frame>;
}

/// Gesture dispatch and element access on the device.
///
/// Absence of the capability is a normal runtime state, reported by
/// [`Accessibility::is_available`].
#[async_trait]
pub trait Accessibility: Send + Sync {
    fn is_available(&self) -> bool;

    async fn tap(&self, x: i32, y: i32, duration: Duration) -> Result<(), DeviceError>;

    async fn swipe(
        &self,
        from: (i32, i32),
        to: (i32, i32),
        duration: Duration,
    ) -> Result<(), DeviceError>;

    async fn global_action(&self, action: GlobalAction) -> Result<(), DeviceError>;

    /// The editable element that currently holds input focus.
    async fn focused_editable(&self) -> Result<Option<EditableElement>, DeviceError>;

    /// The first editable element in the active window, focused or not.
    async fn find_editable(&self) -> Result<Option<EditableElement>, DeviceError>;

    /// Replace the text content of `element`.
    async fn set_text(&self, element: &EditableElement, text: &str) -> Result<(), DeviceError>;
}

/// Installed applications and the means to start them.
#[async_trait]
pub trait AppCatalog: Send + Sync {
    async fn installed_apps(&self) -> Result<Vec<InstalledApp>, DeviceError>;

    async fn launch(&self, app: &InstalledApp) -> Result<(), DeviceError>;

    async fn open_system_settings(&self) -> Result<(), DeviceError>;
}
