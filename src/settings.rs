//! Persisted settings for the agent client.
//! Stored as JSON in the platform-specific config directory via `directories::ProjectDirs`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::agent::AgentConfig;
use crate::model::ModelConfig;

/// Settings persistence errors.
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Cannot determine config directory")]
    NoConfigDir,
    #[error("Failed to access settings file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid settings file: {0}")]
    Format(#[from] serde_json::Error),
}

/// Application settings that can be saved and loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Model API base URL
    pub base_url: String,
    /// Model API key, empty for none
    pub api_key: String,
    /// Model name
    pub model_name: String,
    /// ADB device ID (optional)
    pub device_id: String,
    /// Language code ("cn" or "en")
    pub lang: String,
    /// Maximum steps for one run
    pub max_steps: u32,
    /// Wait after an executed action, in milliseconds
    pub settle_ms: u64,
    /// Wait after a failed step, in milliseconds
    pub error_backoff_ms: u64,
    /// Wait between capture polls, in milliseconds
    pub capture_backoff_ms: u64,
    /// Consecutive capture misses before a step is charged
    pub max_capture_failures: u32,
    /// How long a cached frame may be reused, in milliseconds
    pub frame_max_age_ms: u64,
    /// Model request timeout in seconds
    pub request_timeout_secs: u64,
    /// Maximum retries for model requests
    pub max_retries: u32,
    /// Retry delay in seconds
    pub retry_delay: u64,
    /// JPEG quality of the frame sent to the model
    pub jpeg_quality: u8,
    /// Press Home before the first step
    pub home_before_start: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        let agent = AgentConfig::default();
        let model = ModelConfig::default();
        Self {
            base_url: model.base_url,
            api_key: model.api_key,
            model_name: model.model_name,
            device_id: String::new(),
            lang: agent.lang,
            max_steps: agent.max_steps,
            settle_ms: agent.settle_delay.as_millis() as u64,
            error_backoff_ms: agent.error_backoff.as_millis() as u64,
            capture_backoff_ms: agent.capture_backoff.as_millis() as u64,
            max_capture_failures: agent.max_capture_failures,
            frame_max_age_ms: agent.max_frame_age.as_millis() as u64,
            request_timeout_secs: model.timeout.as_secs(),
            max_retries: model.max_retries,
            retry_delay: model.retry_delay_secs,
            jpeg_quality: agent.jpeg_quality,
            home_before_start: agent.home_before_start,
        }
    }
}

impl AppSettings {
    fn project_dirs() -> Option<directories::ProjectDirs> {
        directories::ProjectDirs::from("com", "autoglm", "autoglm-client")
    }

    /// Get the config directory path.
    pub fn config_dir() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the settings file path.
    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("settings.json"))
    }

    /// Get logs directory path.
    pub fn logs_dir() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.data_dir().join("logs"))
    }

    /// Load settings from the config file, falling back to defaults when
    /// the file is missing or unreadable.
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else {
            return Self::default();
        };
        match Self::load_from(&path) {
            Ok(settings) => settings,
            Err(SettingsError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Self::default()
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring settings file");
                Self::default()
            }
        }
    }

    /// Load settings from a specific file. Missing fields take defaults.
    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save settings to the config file.
    pub fn save(&self) -> Result<(), SettingsError> {
        let path = Self::settings_path().ok_or(SettingsError::NoConfigDir)?;
        self.save_to(&path)
    }

    /// Save settings to a specific file, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Override fields from environment variables.
    ///
    /// Unparseable numeric values are ignored with a warning.
    pub fn apply_env(&mut self) {
        self.apply_vars(|key| std::env::var(key).ok());
    }

    fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(v) = var("MODEL_BASE_URL") {
            self.base_url = v;
        }
        if let Some(v) = var("MODEL_API_KEY") {
            self.api_key = v;
        }
        if let Some(v) = var("MODEL_NAME") {
            self.model_name = v;
        }
        if let Some(v) = var("ADB_DEVICE_ID") {
            self.device_id = v;
        }
        if let Some(v) = var("AGENT_LANG") {
            self.lang = v;
        }
        parse_var(&var, "AGENT_MAX_STEPS", &mut self.max_steps);
        parse_var(&var, "MODEL_MAX_RETRIES", &mut self.max_retries);
        parse_var(&var, "MODEL_RETRY_DELAY", &mut self.retry_delay);
        parse_var(&var, "MODEL_TIMEOUT_SECS", &mut self.request_timeout_secs);
    }

    /// Agent loop configuration derived from these settings.
    pub fn to_agent_config(&self) -> AgentConfig {
        AgentConfig {
            max_steps: self.max_steps,
            capture_backoff: Duration::from_millis(self.capture_backoff_ms),
            max_capture_failures: self.max_capture_failures.max(1),
            error_backoff: Duration::from_millis(self.error_backoff_ms),
            settle_delay: Duration::from_millis(self.settle_ms),
            home_before_start: self.home_before_start,
            max_frame_age: Duration::from_millis(self.frame_max_age_ms),
            jpeg_quality: self.jpeg_quality.clamp(1, 100),
            lang: self.lang.clone(),
            ..AgentConfig::default()
        }
    }

    /// Model client configuration derived from these settings.
    pub fn to_model_config(&self) -> ModelConfig {
        ModelConfig::default()
            .with_base_url(&self.base_url)
            .with_api_key(&self.api_key)
            .with_model_name(&self.model_name)
            .with_timeout(Duration::from_secs(self.request_timeout_secs))
            .with_max_retries(self.max_retries)
            .with_retry_delay(self.retry_delay)
    }
}

fn parse_var<T: std::str::FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
    target: &mut T,
) {
    if let Some(raw) = var(key) {
        match raw.trim().parse() {
            Ok(value) => *target = value,
            Err(_) => tracing::warn!(key, value = %raw, "Ignoring invalid environment value"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_match_agent_and_model() {
        let settings = AppSettings::default();
        assert_eq!(settings.max_steps, 20);
        assert_eq!(settings.settle_ms, 4000);
        assert_eq!(settings.max_retries, 0);
        assert_eq!(settings.request_timeout_secs, 240);
        assert_eq!(settings.jpeg_quality, 80);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let settings = AppSettings {
            model_name: "glm-4v".to_string(),
            max_steps: 7,
            ..AppSettings::default()
        };

        settings.save_to(&path).unwrap();
        assert_eq!(AppSettings::load_from(&path).unwrap(), settings);
    }

    #[test]
    fn test_partial_file_takes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "lang": "en", "max_steps": 5 }"#).unwrap();

        let settings = AppSettings::load_from(&path).unwrap();
        assert_eq!(settings.lang, "en");
        assert_eq!(settings.max_steps, 5);
        assert_eq!(settings.settle_ms, 4000);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "not json").unwrap();
        assert!(matches!(
            AppSettings::load_from(&path),
            Err(SettingsError::Format(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("MODEL_BASE_URL", "https://api.example.com/v1"),
            ("AGENT_LANG", "en"),
            ("AGENT_MAX_STEPS", "12"),
            ("MODEL_MAX_RETRIES", "lots"),
        ]
        .into_iter()
        .collect();
        let mut settings = AppSettings::default();
        settings.apply_vars(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(settings.base_url, "https://api.example.com/v1");
        assert_eq!(settings.lang, "en");
        assert_eq!(settings.max_steps, 12);
        assert_eq!(settings.max_retries, 0);
    }

    #[test]
    fn test_derived_configs() {
        let settings = AppSettings {
            settle_ms: 1500,
            jpeg_quality: 0,
            api_key: "sk-test".to_string(),
            ..AppSettings::default()
        };

        let agent = settings.to_agent_config();
        assert_eq!(agent.settle_delay, Duration::from_millis(1500));
        assert_eq!(agent.jpeg_quality, 1);

        let model = settings.to_model_config();
        assert_eq!(model.api_key, "sk-test");
        assert_eq!(model.timeout, Duration::from_secs(240));
    }
}
