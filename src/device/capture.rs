//! Best-effort last-good frame cache.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use super::{Frame, ScreenCapture};

/// Wraps a [`ScreenCapture`] and remembers the last frame it produced.
///
/// When the source momentarily has nothing new, the remembered frame is
/// served instead, as long as it is younger than `max_age`. The substituted
/// frame may show a screen the device has already left; callers that care
/// can tell from [`CapturedFrame::stale`].
pub struct FrameCache {
    source: Arc<dyn ScreenCapture>,
    last_good: Mutex<Option<Frame>>,
    max_age: Duration,
}

/// A frame returned by [`FrameCache::latest`].
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub frame: Frame,
    /// True when the source missed and the cached frame was substituted.
    pub stale: bool,
}

impl FrameCache {
    pub fn new(source: Arc<dyn ScreenCapture>, max_age: Duration) -> Self {
        Self {
            source,
            last_good: Mutex::new(None),
            max_age,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.source.is_ready()
    }

    /// Poll the source once, falling back to the cached frame.
    pub async fn latest(&self) -> Option<CapturedFrame> {
        let fresh = self.source.latest_frame().await;
        let mut last_good = self.last_good.lock().await;

        if let Some(frame) = fresh {
            *last_good = Some(frame.clone());
            return Some(CapturedFrame {
                frame,
                stale: false,
            });
        }

        match last_good.as_ref() {
            Some(frame) if frame.captured_at().elapsed() <= self.max_age => {
                tracing::debug!(
                    age_ms = frame.captured_at().elapsed().as_millis() as u64,
                    "Capture missed, reusing last good frame"
                );
                Some(CapturedFrame {
                    frame: frame.clone(),
                    stale: true,
                })
            }
            Some(_) => {
                *last_good = None;
                None
            }
            None => None,
        }
    }

    /// Forget the cached frame.
    pub async fn clear(&self) {
        *self.last_good.lock().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::fake::FakeCapture;

    #[tokio::test(start_paused = true)]
    async fn test_fresh_frame_is_not_stale() {
        let capture = Arc::new(FakeCapture::with_frames(vec![Some(FakeCapture::frame(10, 20))]));
        let cache = FrameCache::new(capture, Duration::from_secs(5));

        let captured = cache.latest().await.unwrap();
        assert!(!captured.stale);
        assert_eq!(captured.frame.size().width, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_miss_reuses_recent_frame() {
        let capture = Arc::new(FakeCapture::with_frames(vec![
            Some(FakeCapture::frame(10, 20)),
            None,
        ]));
        let cache = FrameCache::new(capture, Duration::from_secs(5));

        assert!(!cache.latest().await.unwrap().stale);
        tokio::time::advance(Duration::from_secs(1)).await;
        let second = cache.latest().await.unwrap();
        assert!(second.stale);
    }

    #[tokio::test(start_paused = true)]
    async fn test_miss_with_expired_frame_is_unavailable() {
        let capture = Arc::new(FakeCapture::with_frames(vec![
            Some(FakeCapture::frame(10, 20)),
            None,
            None,
        ]));
        let cache = FrameCache::new(capture, Duration::from_secs(2));

        assert!(cache.latest().await.is_some());
        tokio::time::advance(Duration::from_secs(3)).await;
        assert!(cache.latest().await.is_none());
        // Expired frame is dropped, not resurrected.
        assert!(cache.latest().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_miss_without_history_is_unavailable() {
        let capture = Arc::new(FakeCapture::with_frames(vec![None]));
        let cache = FrameCache::new(capture, Duration::from_secs(5));
        assert!(cache.latest().await.is_none());
    }
}
