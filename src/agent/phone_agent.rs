//! Perceive, decide, act: the agent control loop.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::Instrument;
use uuid::Uuid;

use crate::actions::{parse_command, ActionHandler};
use crate::config::{instruction_prompt, step_prompt};
use crate::device::{
    Accessibility, AppCatalog, CapturedFrame, FrameCache, GlobalAction, ScreenCapture,
};
use crate::logger::StepLog;
use crate::model::{ModelBackend, ModelRequest};

/// Configuration for the PhoneAgent.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Maximum number of steps before stopping.
    pub max_steps: u32,
    /// Wait between polls when no frame is available.
    pub capture_backoff: Duration,
    /// Consecutive capture misses tolerated before a step is charged.
    pub max_capture_failures: u32,
    /// Wait after a failed step.
    pub error_backoff: Duration,
    /// Wait after an executed action so the UI can react.
    pub settle_delay: Duration,
    /// Press Home before the first step.
    pub home_before_start: bool,
    /// Wait after the initial Home press.
    pub start_settle: Duration,
    /// How long a cached frame may stand in for a missed capture.
    pub max_frame_age: Duration,
    /// JPEG quality of the frame sent to the model.
    pub jpeg_quality: u8,
    /// Language code ("cn" for Chinese, "en" for English).
    pub lang: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: 20,
            capture_backoff: Duration::from_millis(1000),
            max_capture_failures: 3,
            error_backoff: Duration::from_millis(3000),
            settle_delay: Duration::from_millis(4000),
            home_before_start: true,
            start_settle: Duration::from_millis(3500),
            max_frame_age: Duration::from_millis(5000),
            jpeg_quality: 80,
            lang: "cn".to_string(),
        }
    }
}

impl AgentConfig {
    /// Create a new AgentConfig with custom language.
    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = lang.into();
        self
    }

    /// Create a new AgentConfig with custom max steps.
    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn with_error_backoff(mut self, delay: Duration) -> Self {
        self.error_backoff = delay;
        self
    }

    pub fn with_capture_backoff(mut self, delay: Duration, max_failures: u32) -> Self {
        self.capture_backoff = delay;
        self.max_capture_failures = max_failures.max(1);
        self
    }

    /// Skip the initial Home press.
    pub fn without_home(mut self) -> Self {
        self.home_before_start = false;
        self
    }
}

/// The device collaborators an agent is built from.
#[derive(Clone)]
pub struct Collaborators {
    pub capture: Arc<dyn ScreenCapture>,
    pub accessibility: Arc<dyn Accessibility>,
    pub apps: Arc<dyn AppCatalog>,
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The model issued finish.
    Completed { steps: u32 },
    /// The step budget ran out first.
    StepLimitReached { steps: u32 },
    /// Stopped from outside.
    Cancelled { steps: u32 },
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Completed { .. })
    }

    pub fn steps(&self) -> u32 {
        match self {
            RunOutcome::Completed { steps }
            | RunOutcome::StepLimitReached { steps }
            | RunOutcome::Cancelled { steps } => *steps,
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Completed { steps } => write!(f, "Task completed in {} steps", steps),
            RunOutcome::StepLimitReached { steps } => {
                write!(f, "Step limit reached after {} steps without finishing", steps)
            }
            RunOutcome::Cancelled { steps } => write!(f, "Stopped after {} steps", steps),
        }
    }
}

/// Cooperative stop switch for a running agent.
///
/// Clearing the flag takes effect at the top of the next iteration; an
/// in-flight model call or gesture is not interrupted.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    running: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

enum StepOutcome {
    Finished,
    Executed,
    Failed,
}

/// AI-powered agent for automating Android phone interactions.
///
/// Every step captures the screen, asks the model for exactly one command
/// in a fresh request with no conversation history, and executes it. No
/// single step failure ends the run; only finish, the step budget or a stop
/// request do.
pub struct PhoneAgent {
    frames: FrameCache,
    accessibility: Arc<dyn Accessibility>,
    model: Arc<dyn ModelBackend>,
    handler: ActionHandler,
    config: AgentConfig,
    log: StepLog,
    running: Arc<AtomicBool>,
    step_count: u32,
}

impl PhoneAgent {
    /// Create a new PhoneAgent.
    ///
    /// # Arguments
    /// * `collaborators` - Screen capture, accessibility and app catalog.
    /// * `model` - The vision-language model backend.
    /// * `config` - Configuration for the agent behavior.
    pub fn new(
        collaborators: Collaborators,
        model: Arc<dyn ModelBackend>,
        config: AgentConfig,
    ) -> Self {
        Self {
            frames: FrameCache::new(collaborators.capture, config.max_frame_age),
            handler: ActionHandler::new(collaborators.accessibility.clone(), collaborators.apps),
            accessibility: collaborators.accessibility,
            model,
            config,
            log: StepLog::detached(),
            running: Arc::new(AtomicBool::new(true)),
            step_count: 0,
        }
    }

    /// Attach the step log that receives one entry per step outcome.
    pub fn with_log(mut self, log: StepLog) -> Self {
        self.log = log;
        self
    }

    /// Handle that stops the current (or next) run.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            running: self.running.clone(),
        }
    }

    /// Prepare for a new task.
    ///
    /// Installs a fresh running flag, so handles taken before the reset no
    /// longer affect the agent.
    pub fn reset(&mut self) {
        self.running = Arc::new(AtomicBool::new(true));
        self.step_count = 0;
    }

    /// Get the current step count.
    pub fn step_count(&self) -> u32 {
        self.step_count
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Run the agent until the model finishes, the step budget is spent,
    /// or the run is stopped through a [`CancelHandle`].
    ///
    /// The running flag is cleared on return; call [`PhoneAgent::reset`]
    /// before running again.
    pub async fn run(&mut self, goal: &str) -> RunOutcome {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("agent_run", %run_id);
        let outcome = self.run_loop(goal).instrument(span).await;
        self.running.store(false, Ordering::SeqCst);
        outcome
    }

    async fn run_loop(&mut self, goal: &str) -> RunOutcome {
        self.step_count = 0;
        self.frames.clear().await;
        self.log.info(None, format!("Task started: {}", goal));

        if self.config.home_before_start && self.accessibility.is_available() {
            self.log.info(None, "Returning to home screen before the first step");
            if let Err(e) = self.accessibility.global_action(GlobalAction::Home).await {
                self.log.warning(None, format!("Home press failed: {}", e));
            }
            sleep(self.config.start_settle).await;
        }

        let instruction = instruction_prompt(&self.config.lang, goal);
        let mut capture_failures = 0u32;

        let outcome = loop {
            if !self.running.load(Ordering::SeqCst) {
                break RunOutcome::Cancelled {
                    steps: self.step_count,
                };
            }
            if self.step_count >= self.config.max_steps {
                break RunOutcome::StepLimitReached {
                    steps: self.step_count,
                };
            }

            let Some(captured) = self.frames.latest().await else {
                capture_failures += 1;
                if capture_failures > self.config.max_capture_failures {
                    self.step_count += 1;
                    self.log.warning(
                        Some(self.step_count),
                        format!(
                            "Screen capture unavailable for {} consecutive polls, skipping step",
                            capture_failures
                        ),
                    );
                    capture_failures = 0;
                } else {
                    self.log.warning(None, "Screen capture failed, retrying...");
                }
                sleep(self.config.capture_backoff).await;
                continue;
            };
            capture_failures = 0;
            self.step_count += 1;

            match self.execute_step(&instruction, captured).await {
                StepOutcome::Finished => {
                    break RunOutcome::Completed {
                        steps: self.step_count,
                    }
                }
                StepOutcome::Executed => sleep(self.config.settle_delay).await,
                StepOutcome::Failed => sleep(self.config.error_backoff).await,
            }
        };

        match outcome {
            RunOutcome::Completed { .. } => self.log.success(None, outcome.to_string()),
            RunOutcome::StepLimitReached { .. } => self.log.warning(None, outcome.to_string()),
            RunOutcome::Cancelled { .. } => self.log.info(None, outcome.to_string()),
        }
        outcome
    }

    /// Execute a single step of the agent loop on an already captured frame.
    async fn execute_step(&self, instruction: &str, captured: CapturedFrame) -> StepOutcome {
        let step = Some(self.step_count);

        if captured.stale {
            self.log.info(step, "No fresh frame, using the last captured screen");
        }

        let encoded = match captured.frame.encode_jpeg(self.config.jpeg_quality) {
            Ok(encoded) => encoded,
            Err(e) => {
                self.log.error(step, e.to_string());
                return StepOutcome::Failed;
            }
        };

        let request = ModelRequest::for_step(
            instruction,
            &step_prompt(&self.config.lang, self.step_count),
            &encoded,
        );

        self.log.thinking(step, "Thinking...");
        let response = match self.model.complete(&request).await {
            Ok(response) => response,
            Err(e) => {
                self.log.error(step, format!("Model request failed: {}", e));
                return StepOutcome::Failed;
            }
        };
        self.log.info(
            step,
            format!("Model reply: {}...", preview(&response.content, 50)),
        );

        let command = match parse_command(&response.content) {
            Ok(command) => command,
            Err(e) => {
                self.log.warning(
                    step,
                    format!(
                        "Could not parse command ({}): {}...",
                        e,
                        preview(&response.content, 20)
                    ),
                );
                return StepOutcome::Failed;
            }
        };
        tracing::debug!(thought = %command.thought, "Model thought");
        self.log.action(step, command.action.to_string());

        if command.action.is_finish() {
            return StepOutcome::Finished;
        }

        let result = self.handler.execute(&command, encoded.size).await;
        if result.success {
            if let Some(message) = result.message {
                self.log.info(step, message);
            }
            StepOutcome::Executed
        } else {
            self.log.error(
                step,
                result
                    .message
                    .unwrap_or_else(|| format!("{} failed", command.action.name())),
            );
            StepOutcome::Failed
        }
    }
}

/// First `max_chars` characters of `text` on one line.
fn preview(text: &str, max_chars: usize) -> String {
    text.chars()
        .take(max_chars)
        .map(|c| if c == '\n' { ' ' } else { c })
        .collect()
}
