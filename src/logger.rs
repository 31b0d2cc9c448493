//! Append-only step log shown to the user.
//!
//! The agent loop produces one [`LogEntry`] per step outcome and hands it to
//! a [`StepLog`]. Entries travel over an unbounded channel so whichever task
//! owns the display (the CLI here) renders them on its own thread.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::settings::AppSettings;

/// Log level enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
    Action,
    Thinking,
}

impl LogLevel {
    /// Get display string for the log level.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Success => "SUCCESS",
            LogLevel::Warning => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Action => "ACTION",
            LogLevel::Thinking => "THINK",
        }
    }

    /// Get emoji for the log level.
    pub fn emoji(&self) -> &'static str {
        match self {
            LogLevel::Info => "ℹ️",
            LogLevel::Success => "✅",
            LogLevel::Warning => "⚠️",
            LogLevel::Error => "❌",
            LogLevel::Action => "👉",
            LogLevel::Thinking => "🔄",
        }
    }
}

/// A single log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub level: LogLevel,
    /// Step the entry belongs to, if any.
    pub step: Option<u32>,
    pub message: String,
}

impl LogEntry {
    /// Create a new log entry.
    pub fn new(level: LogLevel, step: Option<u32>, message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            level,
            step,
            message: message.into(),
        }
    }

    fn step_prefix(&self) -> String {
        self.step
            .map(|step| format!("#{} ", step))
            .unwrap_or_default()
    }

    /// Format the log entry for display.
    pub fn format_display(&self) -> String {
        format!(
            "[{}] {} {}{}",
            self.timestamp.format("%H:%M:%S"),
            self.level.emoji(),
            self.step_prefix(),
            self.message
        )
    }

    /// Format the log entry for file storage.
    pub fn format_file(&self) -> String {
        format!(
            "[{}] [{}] {}{}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.level.as_str(),
            self.step_prefix(),
            self.message
        )
    }
}

/// Producer side of the step log, owned by the agent loop.
///
/// Every entry is mirrored as a `tracing` event; when a receiver is attached
/// it is also sent there. A dropped receiver is not an error.
#[derive(Debug, Clone, Default)]
pub struct StepLog {
    sender: Option<UnboundedSender<LogEntry>>,
}

impl StepLog {
    /// A log that only emits tracing events.
    pub fn detached() -> Self {
        Self::default()
    }

    /// A log connected to a fresh channel.
    pub fn channel() -> (Self, UnboundedReceiver<LogEntry>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                sender: Some(sender),
            },
            receiver,
        )
    }

    pub fn log(&self, level: LogLevel, step: Option<u32>, message: impl Into<String>) {
        let entry = LogEntry::new(level, step, message);
        let step = entry.step.unwrap_or(0);
        match level {
            LogLevel::Error => tracing::error!(step, "{}", entry.message),
            LogLevel::Warning => tracing::warn!(step, "{}", entry.message),
            _ => tracing::info!(step, level = level.as_str(), "{}", entry.message),
        }
        if let Some(sender) = &self.sender {
            let _ = sender.send(entry);
        }
    }

    pub fn info(&self, step: Option<u32>, message: impl Into<String>) {
        self.log(LogLevel::Info, step, message);
    }

    pub fn success(&self, step: Option<u32>, message: impl Into<String>) {
        self.log(LogLevel::Success, step, message);
    }

    pub fn warning(&self, step: Option<u32>, message: impl Into<String>) {
        self.log(LogLevel::Warning, step, message);
    }

    pub fn error(&self, step: Option<u32>, message: impl Into<String>) {
        self.log(LogLevel::Error, step, message);
    }

    pub fn action(&self, step: Option<u32>, message: impl Into<String>) {
        self.log(LogLevel::Action, step, message);
    }

    pub fn thinking(&self, step: Option<u32>, message: impl Into<String>) {
        self.log(LogLevel::Thinking, step, message);
    }
}

/// Consumer side: keeps entries in memory and appends them to a session file.
#[derive(Debug, Clone)]
pub struct Logger {
    /// In-memory log entries for display.
    entries: Vec<LogEntry>,
    /// Maximum entries to keep in memory.
    max_entries: usize,
    /// Current session log file path.
    log_file: Option<PathBuf>,
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

impl Logger {
    /// Create a logger writing to a new session file in the logs directory.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            max_entries: 1000,
            log_file: AppSettings::logs_dir().and_then(|dir| Self::create_log_file(&dir)),
        }
    }

    /// Create a logger writing to a new session file under `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            entries: Vec::new(),
            max_entries: 1000,
            log_file: Self::create_log_file(dir),
        }
    }

    /// Create a logger that keeps entries in memory only.
    pub fn in_memory() -> Self {
        Self {
            entries: Vec::new(),
            max_entries: 1000,
            log_file: None,
        }
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries.max(1);
        self
    }

    /// Create a new log file for this session.
    fn create_log_file(dir: &Path) -> Option<PathBuf> {
        fs::create_dir_all(dir).ok()?;

        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let path = dir.join(format!("session_{}.log", timestamp));

        File::create(&path).ok()?;

        Some(path)
    }

    /// Record an entry produced by a [`StepLog`].
    pub fn record(&mut self, entry: LogEntry) {
        if let Some(ref path) = self.log_file {
            if let Ok(mut file) = OpenOptions::new().append(true).open(path) {
                let _ = writeln!(file, "{}", entry.format_file());
            }
        }

        self.entries.push(entry);

        if self.entries.len() > self.max_entries {
            self.entries.remove(0);
        }
    }

    /// Get all log entries.
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Get the current log file path.
    pub fn log_file_path(&self) -> Option<&PathBuf> {
        self.log_file.as_ref()
    }

    /// Get formatted log text for display.
    pub fn format_all(&self) -> String {
        self.entries
            .iter()
            .map(|e| e.format_display())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_formatting() {
        let entry = LogEntry::new(LogLevel::Action, Some(3), "Tap [500,200]");
        assert!(entry.format_display().ends_with("👉 #3 Tap [500,200]"));
        assert!(entry.format_file().ends_with("[ACTION] #3 Tap [500,200]"));

        let plain = LogEntry::new(LogLevel::Info, None, "started");
        assert!(plain.format_file().ends_with("[INFO] started"));
    }

    #[test]
    fn test_step_log_channel() {
        let (log, mut receiver) = StepLog::channel();
        log.warning(Some(1), "capture failed");
        log.success(None, "done");

        let first = receiver.try_recv().unwrap();
        assert_eq!(first.level, LogLevel::Warning);
        assert_eq!(first.step, Some(1));
        assert_eq!(receiver.try_recv().unwrap().message, "done");
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn test_step_log_tolerates_dropped_receiver() {
        let (log, receiver) = StepLog::channel();
        drop(receiver);
        log.info(None, "nobody listening");
        StepLog::detached().error(Some(2), "also fine");
    }

    #[test]
    fn test_logger_writes_session_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut logger = Logger::in_dir(dir.path());
        logger.record(LogEntry::new(LogLevel::Info, Some(1), "thinking"));
        logger.record(LogEntry::new(LogLevel::Success, None, "Task completed"));

        let path = logger.log_file_path().unwrap();
        let contents = fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("[SUCCESS] Task completed"));
    }

    #[test]
    fn test_logger_trims_memory() {
        let mut logger = Logger::in_memory().with_max_entries(2);
        for i in 0..5 {
            logger.record(LogEntry::new(LogLevel::Info, Some(i), format!("entry {}", i)));
        }
        assert_eq!(logger.entries().len(), 2);
        assert_eq!(logger.entries()[0].message, "entry 3");
        assert!(logger.format_all().contains("entry 4"));
    }
}
