//! In-memory collaborators for unit tests.

use async_trait::async_trait;
use image::{DynamicImage, RgbImage};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::{
    Accessibility, AppCatalog, DeviceError, EditableElement, Frame, GlobalAction, InstalledApp,
    ScreenCapture,
};
use crate::model::{ModelBackend, ModelError, ModelRequest, ModelResponse};

pub struct FakeCapture {
    frames: Mutex<VecDeque<Option<Frame>>>,
    fallback: Option<Frame>,
    polls: AtomicUsize,
    ready: bool,
}

impl FakeCapture {
    pub fn frame(width: u32, height: u32) -> Frame {
        Frame::new(DynamicImage::ImageRgb8(RgbImage::new(width, height)))
    }

    /// Serves `frames` in order, then reports unavailable forever.
    pub fn with_frames(frames: Vec<Option<Frame>>) -> Self {
        Self {
            frames: Mutex::new(frames.into()),
            fallback: None,
            polls: AtomicUsize::new(0),
            ready: true,
        }
    }

    /// Serves `frames` in order, then a 1080x2400 frame forever.
    pub fn then_always(frames: Vec<Option<Frame>>) -> Self {
        Self {
            fallback: Some(Self::frame(1080, 2400)),
            ..Self::with_frames(frames)
        }
    }

    pub fn always() -> Self {
        Self::then_always(Vec::new())
    }

    pub fn not_ready() -> Self {
        Self {
            ready: false,
            ..Self::with_frames(Vec::new())
        }
    }

    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScreenCapture for FakeCapture {
    fn is_ready(&self) -> bool {
        self.ready
    }

    async fn latest_frame(&self) -> Option<Frame> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        match self.frames.lock().unwrap().pop_front() {
            Some(next) => next,
            None => self.fallback.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Tap(i32, i32, Duration),
    Swipe((i32, i32), (i32, i32), Duration),
    Global(GlobalAction),
    SetText(EditableElement, String),
    Launch(String),
    OpenSettings,
}

pub struct FakeDevice {
    pub available: AtomicBool,
    pub focused: Option<EditableElement>,
    pub editable: Option<EditableElement>,
    pub apps: Vec<InstalledApp>,
    pub(crate) calls: Mutex<Vec<Call>>,
}

impl Default for FakeDevice {
    fn default() -> Self {
        Self {
            available: AtomicBool::new(true),
            focused: None,
            editable: None,
            apps: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl FakeDevice {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Accessibility for FakeDevice {
    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn tap(&self, x: i32, y: i32, duration: Duration) -> Result<(), DeviceError> {
        self.record(Call::Tap(x, y, duration));
        Ok(())
    }

    async fn swipe(
        &self,
        from: (i32, i32),
        to: (i32, i32),
        duration: Duration,
    ) -> Result<(), DeviceError> {
        self.record(Call::Swipe(from, to, duration));
        Ok(())
    }

    async fn global_action(&self, action: GlobalAction) -> Result<(), DeviceError> {
        self.record(Call::Global(action));
        Ok(())
    }

    async fn focused_editable(&self) -> Result<Option<EditableElement>, DeviceError> {
        Ok(self.focused.clone())
    }

    async fn find_editable(&self) -> Result<Option<EditableElement>, DeviceError> {
        Ok(self.editable.clone())
    }

    async fn set_text(&self, element: &EditableElement, text: &str) -> Result<(), DeviceError> {
        self.record(Call::SetText(element.clone(), text.to_string()));
        Ok(())
    }
}

#[async_trait]
impl AppCatalog for FakeDevice {
    async fn installed_apps(&self) -> Result<Vec<InstalledApp>, DeviceError> {
        Ok(self.apps.clone())
    }

    async fn launch(&self, app: &InstalledApp) -> Result<(), DeviceError> {
        self.record(Call::Launch(app.package.clone()));
        Ok(())
    }

    async fn open_system_settings(&self) -> Result<(), DeviceError> {
        self.record(Call::OpenSettings);
        Ok(())
    }
}

/// Scripted model: each call pops the next reply, then repeats `fallback`.
pub struct FakeModel {
    replies: Mutex<VecDeque<Result<String, ModelError>>>,
    fallback: String,
    requests: Mutex<Vec<ModelRequest>>,
}

impl FakeModel {
    pub fn new(replies: Vec<Result<String, ModelError>>, fallback: &str) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            fallback: fallback.to_string(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn always(reply: &str) -> Self {
        Self::new(Vec::new(), reply)
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelBackend for FakeModel {
    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse, ModelError> {
        self.requests.lock().unwrap().push(request.clone());
        let next = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(self.fallback.clone()));
        next.map(|content| ModelResponse { content })
    }
}
