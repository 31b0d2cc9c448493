//! Model client module for AI inference.

mod client;

pub use client::{
    ContentPart, ModelBackend, ModelClient, ModelConfig, ModelError, ModelRequest, ModelResponse,
    DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY_SECS, DEFAULT_TIMEOUT_SECS,
};
