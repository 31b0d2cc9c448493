//! Action handler that turns decoded commands into device effects.

use std::sync::Arc;
use std::time::Duration;

use super::command::{Action, Command, NormalizedPoint, NORMALIZED_MAX};
use crate::device::{
    Accessibility, AppCatalog, DeviceError, GlobalAction, InstalledApp, ScreenSize,
};

/// Names that open the system settings screen directly.
const SETTINGS_ALIASES: &[&str] = &["设置", "系统设置", "settings", "system settings"];

/// Result of an action execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResult {
    pub success: bool,
    pub message: Option<String>,
}

impl ActionResult {
    /// Create a successful result.
    pub fn success() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    /// Create a successful result with a note for the step log.
    pub fn success_with(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::success()
        }
    }

    /// Create a failure result.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

/// Gesture durations passed to the accessibility collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GestureTimings {
    pub tap: Duration,
    pub swipe: Duration,
}

impl Default for GestureTimings {
    fn default() -> Self {
        Self {
            tap: Duration::from_millis(100),
            swipe: Duration::from_millis(500),
        }
    }
}

/// Map a normalized coordinate onto a screen dimension in pixels.
///
/// `n` in `0..=1000` becomes `round(n / 1000 * dimension)`.
pub fn scale_coordinate(n: u16, dimension: u32) -> i32 {
    (f64::from(n) / f64::from(NORMALIZED_MAX) * f64::from(dimension)).round() as i32
}

/// Map a normalized point onto the screen.
pub fn scale_point(point: NormalizedPoint, screen: ScreenSize) -> (i32, i32) {
    (
        scale_coordinate(point.x, screen.width),
        scale_coordinate(point.y, screen.height),
    )
}

/// Executes commands against the device collaborators.
///
/// Gestures are dispatched without waiting for the device to finish
/// rendering their effect; the agent loop's settle delay covers that.
pub struct ActionHandler {
    accessibility: Arc<dyn Accessibility>,
    apps: Arc<dyn AppCatalog>,
    timings: GestureTimings,
}

impl ActionHandler {
    /// Create a new ActionHandler with default gesture timings.
    pub fn new(accessibility: Arc<dyn Accessibility>, apps: Arc<dyn AppCatalog>) -> Self {
        Self::with_timings(accessibility, apps, GestureTimings::default())
    }

    pub fn with_timings(
        accessibility: Arc<dyn Accessibility>,
        apps: Arc<dyn AppCatalog>,
        timings: GestureTimings,
    ) -> Self {
        Self {
            accessibility,
            apps,
            timings,
        }
    }

    pub fn timings(&self) -> GestureTimings {
        self.timings
    }

    /// Execute a command.
    ///
    /// # Arguments
    /// * `command` - The decoded command.
    /// * `screen` - Current screen resolution, used for coordinate scaling.
    ///
    /// # Returns
    /// ActionResult describing the outcome for the step log. Failures are
    /// reported here and never propagated.
    pub async fn execute(&self, command: &Command, screen: ScreenSize) -> ActionResult {
        if command.action.is_finish() {
            return ActionResult::success();
        }

        if !self.accessibility.is_available() {
            return ActionResult::failure(DeviceError::Unavailable.to_string());
        }

        let outcome = match &command.action {
            Action::Tap { at } => self.handle_tap(*at, screen).await,
            Action::Swipe { from, to } => self.handle_swipe(*from, *to, screen).await,
            Action::Back => self.handle_global(GlobalAction::Back).await,
            Action::Home => self.handle_global(GlobalAction::Home).await,
            Action::Launch { app } => self.handle_launch(app).await,
            Action::Input { text } => self.handle_input(text).await,
            Action::Finish => Ok(ActionResult::success()),
        };

        outcome.unwrap_or_else(|e| {
            tracing::warn!(action = command.action.name(), error = %e, "Action failed");
            ActionResult::failure(format!("{} failed: {}", command.action.name(), e))
        })
    }

    async fn handle_tap(
        &self,
        at: NormalizedPoint,
        screen: ScreenSize,
    ) -> Result<ActionResult, DeviceError> {
        let (x, y) = scale_point(at, screen);
        self.accessibility.tap(x, y, self.timings.tap).await?;
        Ok(ActionResult::success_with(format!("Tapped ({}, {})", x, y)))
    }

    async fn handle_swipe(
        &self,
        from: NormalizedPoint,
        to: NormalizedPoint,
        screen: ScreenSize,
    ) -> Result<ActionResult, DeviceError> {
        let start = scale_point(from, screen);
        let end = scale_point(to, screen);
        self.accessibility
            .swipe(start, end, self.timings.swipe)
            .await?;
        Ok(ActionResult::success_with(format!(
            "Swiped ({}, {}) -> ({}, {})",
            start.0, start.1, end.0, end.1
        )))
    }

    async fn handle_global(&self, action: GlobalAction) -> Result<ActionResult, DeviceError> {
        self.accessibility.global_action(action).await?;
        Ok(ActionResult::success())
    }

    async fn handle_launch(&self, app_name: &str) -> Result<ActionResult, DeviceError> {
        if is_settings_alias(app_name) {
            self.apps.open_system_settings().await?;
            return Ok(ActionResult::success_with("Opened system settings"));
        }

        let installed = self.apps.installed_apps().await?;
        match resolve_app(&installed, app_name) {
            Some(app) => {
                self.apps.launch(app).await?;
                Ok(ActionResult::success_with(format!(
                    "Launched {} ({})",
                    app.label, app.package
                )))
            }
            None => Ok(ActionResult::failure(format!("App not found: {}", app_name))),
        }
    }

    async fn handle_input(&self, text: &str) -> Result<ActionResult, DeviceError> {
        let element = match self.accessibility.focused_editable().await? {
            Some(element) => Some(element),
            None => self.accessibility.find_editable().await?,
        };

        match element {
            Some(element) => {
                self.accessibility.set_text(&element, text).await?;
                Ok(ActionResult::success_with(format!("Entered \"{}\"", text)))
            }
            None => Ok(ActionResult::failure("No editable field on screen")),
        }
    }
}

fn is_settings_alias(app_name: &str) -> bool {
    let name = app_name.trim().to_lowercase();
    SETTINGS_ALIASES.iter().any(|alias| *alias == name)
}

/// Resolve an app by label: exact match first, then case-insensitive substring.
pub fn resolve_app<'a>(installed: &'a [InstalledApp], name: &str) -> Option<&'a InstalledApp> {
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    if let Some(exact) = installed.iter().find(|app| app.label == name) {
        return Some(exact);
    }
    let needle = name.to_lowercase();
    installed
        .iter()
        .find(|app| app.label.to_lowercase().contains(&needle))
}
