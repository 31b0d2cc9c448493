//! Model client for AI inference using OpenAI-compatible API.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

use crate::device::EncodedFrame;

/// Default number of retry attempts for failed requests.
///
/// Zero: the agent loop already backs off and moves to the next step.
pub const DEFAULT_MAX_RETRIES: u32 = 0;

/// Default delay between retry attempts in seconds.
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 2;

/// Default request timeout in seconds. Self-hosted 9B models can be slow.
pub const DEFAULT_TIMEOUT_SECS: u64 = 240;

/// Model client errors.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    #[error("API returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Failed to parse response: {0}")]
    ParseError(String),
    #[error("Max retries exceeded after {0} attempts: {1}")]
    MaxRetriesExceeded(u32, String),
}

impl ModelError {
    /// Check if an error is retryable (network errors, 5xx, rate limits).
    pub fn is_retryable(&self) -> bool {
        match self {
            ModelError::RequestFailed(_) => true,
            ModelError::Status { status, .. } => *status >= 500 || *status == 429,
            ModelError::ParseError(_) => false,
            ModelError::MaxRetriesExceeded(_, _) => false,
        }
    }
}

/// Configuration for the AI model.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub base_url: String,
    /// Sent as a bearer token when non-empty.
    pub api_key: String,
    pub model_name: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub extra_body: HashMap<String, Value>,
    /// Per-request timeout covering connect and read.
    pub timeout: Duration,
    /// Maximum number of retry attempts for failed requests.
    pub max_retries: u32,
    /// Delay between retry attempts in seconds.
    pub retry_delay_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/v1".to_string(),
            api_key: String::new(),
            model_name: "autoglm-phone".to_string(),
            max_tokens: 1024,
            temperature: 0.1,
            extra_body: HashMap::new(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_secs: DEFAULT_RETRY_DELAY_SECS,
        }
    }
}

impl ModelConfig {
    /// Create a new ModelConfig with custom base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Create a new ModelConfig with custom API key.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    /// Create a new ModelConfig with custom model name.
    pub fn with_model_name(mut self, model_name: impl Into<String>) -> Self {
        self.model_name = model_name.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the maximum number of retry attempts for failed requests.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the delay between retry attempts in seconds.
    pub fn with_retry_delay(mut self, delay_secs: u64) -> Self {
        self.retry_delay_secs = delay_secs;
        self
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

/// One ordered part of the request message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentPart {
    Text(String),
    /// A URL or `data:` URI.
    ImageUrl(String),
}

/// A single self-contained model request: one user message, no history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRequest {
    pub parts: Vec<ContentPart>,
}

impl ModelRequest {
    /// Build the per-step request: instruction, step counter, then the frame.
    pub fn for_step(instruction: &str, step_text: &str, frame: &EncodedFrame) -> Self {
        Self {
            parts: vec![
                ContentPart::Text(instruction.to_string()),
                ContentPart::Text(step_text.to_string()),
                ContentPart::ImageUrl(frame.data_url()),
            ],
        }
    }

    /// Render as an OpenAI-format `messages` array.
    pub fn to_messages(&self) -> Value {
        let content: Vec<Value> = self
            .parts
            .iter()
            .map(|part| match part {
                ContentPart::Text(text) => json!({
                    "type": "text",
                    "text": text
                }),
                ContentPart::ImageUrl(url) => json!({
                    "type": "image_url",
                    "image_url": { "url": url }
                }),
            })
            .collect();

        json!([{
            "role": "user",
            "content": content
        }])
    }
}

/// Response from the AI model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelResponse {
    /// Text content of the first choice.
    pub content: String,
}

/// Anything that can answer a [`ModelRequest`].
#[async_trait]
pub trait ModelBackend: Send + Sync {
    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse, ModelError>;
}

/// OpenAI API response structures.
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    #[serde(default)]
    content: Option<String>,
}

/// Client for interacting with OpenAI-compatible vision-language models.
pub struct ModelClient {
    config: ModelConfig,
    client: Client,
}

impl ModelClient {
    /// Create a new ModelClient with the given configuration.
    pub fn new(config: ModelConfig) -> Result<Self, ModelError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Build the JSON request body.
    pub fn build_body(&self, request: &ModelRequest) -> Value {
        let mut body = json!({
            "model": self.config.model_name,
            "messages": request.to_messages(),
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
        });

        // Merge extra_body
        if let Value::Object(ref mut map) = body {
            for (key, value) in &self.config.extra_body {
                map.insert(key.clone(), value.clone());
            }
        }

        body
    }

    /// Send a single request to the API.
    async fn send_request(&self, body: &Value) -> Result<ModelResponse, ModelError> {
        let mut builder = self
            .client
            .post(self.config.chat_url())
            .header("Content-Type", "application/json");
        if !self.config.api_key.is_empty() {
            builder = builder.bearer_auth(&self.config.api_key);
        }

        let response = builder.json(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let completion: ChatCompletionResponse = response.json().await?;
        Self::first_content(completion)
    }

    fn first_content(completion: ChatCompletionResponse) -> Result<ModelResponse, ModelError> {
        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| ModelResponse { content })
            .ok_or_else(|| ModelError::ParseError("No choices in response".to_string()))
    }
}

#[async_trait]
impl ModelBackend for ModelClient {
    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse, ModelError> {
        let body = self.build_body(request);
        let max_attempts = self.config.max_retries + 1; // +1 for the initial attempt
        let mut last_error: Option<ModelError> = None;

        for attempt in 1..=max_attempts {
            match self.send_request(&body).await {
                Ok(response) => return Ok(response),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    if attempt < max_attempts {
                        tracing::warn!(
                            attempt,
                            max_attempts,
                            error = %e,
                            "Model request failed, retrying in {}s",
                            self.config.retry_delay_secs
                        );
                        sleep(Duration::from_secs(self.config.retry_delay_secs)).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if self.config.max_retries == 0 => Err(e),
            Some(e) => Err(ModelError::MaxRetriesExceeded(max_attempts, e.to_string())),
            None => Err(ModelError::MaxRetriesExceeded(
                max_attempts,
                "Unknown error".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::ScreenSize;

    fn frame() -> EncodedFrame {
        EncodedFrame {
            base64_data: "AAAA".to_string(),
            size: ScreenSize::new(1080, 2400),
        }
    }

    #[test]
    fn test_model_config_default() {
        let config = ModelConfig::default();
        assert_eq!(config.base_url, "http://localhost:8000/v1");
        assert_eq!(config.model_name, "autoglm-phone");
        assert_eq!(config.max_retries, 0);
        assert_eq!(config.timeout, Duration::from_secs(240));
    }

    #[test]
    fn test_chat_url_trims_slash() {
        let config = ModelConfig::default().with_base_url("https://example.com/v1/");
        assert_eq!(config.chat_url(), "https://example.com/v1/chat/completions");
    }

    #[test]
    fn test_step_request_part_order() {
        let request = ModelRequest::for_step("do the thing", "step 2", &frame());
        let messages = request.to_messages();

        assert_eq!(messages.as_array().unwrap().len(), 1);
        assert_eq!(messages[0]["role"], "user");
        let content = &messages[0]["content"];
        assert_eq!(content[0]["type"], "text");
        assert_eq!(content[0]["text"], "do the thing");
        assert_eq!(content[1]["text"], "step 2");
        assert_eq!(content[2]["type"], "image_url");
        assert_eq!(
            content[2]["image_url"]["url"],
            "data:image/jpeg;base64,AAAA"
        );
    }

    #[test]
    fn test_build_body_merges_extra_body() {
        let mut config = ModelConfig::default().with_model_name("glm");
        config
            .extra_body
            .insert("skip_special_tokens".to_string(), json!(false));
        let client = ModelClient::new(config).unwrap();

        let body = client.build_body(&ModelRequest::for_step("a", "b", &frame()));
        assert_eq!(body["model"], "glm");
        assert_eq!(body["max_tokens"], 1024);
        assert_eq!(body["skip_special_tokens"], false);
        assert!(body["messages"].is_array());
    }

    #[test]
    fn test_retryable_errors() {
        let status = |status| ModelError::Status {
            status,
            body: String::new(),
        };
        assert!(status(500).is_retryable());
        assert!(status(503).is_retryable());
        assert!(status(429).is_retryable());
        assert!(!status(400).is_retryable());
        assert!(!status(401).is_retryable());
        assert!(!ModelError::ParseError("x".to_string()).is_retryable());
    }

    #[test]
    fn test_first_content() {
        let completion: ChatCompletionResponse = serde_json::from_value(json!({
            "choices": [{ "message": { "role": "assistant", "content": "do(action=\"Home\")" } }]
        }))
        .unwrap();
        assert_eq!(
            ModelClient::first_content(completion).unwrap().content,
            "do(action=\"Home\")"
        );

        let empty: ChatCompletionResponse =
            serde_json::from_value(json!({ "choices": [] })).unwrap();
        assert!(matches!(
            ModelClient::first_content(empty),
            Err(ModelError::ParseError(_))
        ));
    }
}
