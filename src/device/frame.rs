//! Screen frames and their transport encoding.

use base64::{engine::general_purpose::STANDARD, Engine};
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use thiserror::Error;
use tokio::time::Instant;

/// Frame encoding errors.
#[derive(Error, Debug)]
pub enum FrameError {
    #[error("Failed to decode frame: {0}")]
    Decode(String),
    #[error("Failed to encode frame: {0}")]
    Encode(String),
}

/// Screen resolution in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

impl ScreenSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// One captured raster snapshot of the display.
#[derive(Debug, Clone)]
pub struct Frame {
    image: DynamicImage,
    captured_at: Instant,
}

impl Frame {
    /// Wrap an already decoded image.
    pub fn new(image: DynamicImage) -> Self {
        Self {
            image,
            captured_at: Instant::now(),
        }
    }

    /// Decode a frame from encoded image bytes (PNG from `screencap`, etc).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FrameError> {
        image::load_from_memory(bytes)
            .map(Self::new)
            .map_err(|e| FrameError::Decode(e.to_string()))
    }

    pub fn size(&self) -> ScreenSize {
        ScreenSize::new(self.image.width(), self.image.height())
    }

    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }

    /// Re-encode as JPEG and wrap in base64 for the model request.
    ///
    /// JPEG has no alpha channel, so the raster is flattened to RGB first.
    pub fn encode_jpeg(&self, quality: u8) -> Result<EncodedFrame, FrameError> {
        let rgb = self.image.to_rgb8();
        let mut buffer = Vec::new();
        JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100))
            .encode_image(&rgb)
            .map_err(|e| FrameError::Encode(e.to_string()))?;

        Ok(EncodedFrame {
            base64_data: STANDARD.encode(&buffer),
            size: self.size(),
        })
    }
}

/// A frame ready to embed in a model request.
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    pub base64_data: String,
    pub size: ScreenSize,
}

impl EncodedFrame {
    pub fn data_url(&self) -> String {
        format!("data:image/jpeg;base64,{}", self.base64_data)
    }
}
