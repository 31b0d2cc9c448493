//! User-facing start/stop controls around the agent loop.

use std::sync::Arc;
use thiserror::Error;
use tokio::task::{JoinError, JoinHandle};

use super::phone_agent::{AgentConfig, CancelHandle, Collaborators, PhoneAgent, RunOutcome};
use crate::logger::StepLog;
use crate::model::ModelBackend;

/// Reasons a run is refused before it starts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StartError {
    #[error("Please enter a task")]
    EmptyGoal,
    #[error("Screen capture is not ready")]
    CaptureNotReady,
    #[error("Accessibility service is not available")]
    AccessibilityUnavailable,
}

/// A run in progress.
pub struct RunHandle {
    cancel: CancelHandle,
    join: JoinHandle<RunOutcome>,
}

impl RunHandle {
    /// Ask the loop to stop at the top of its next iteration.
    pub fn stop(&self) {
        self.cancel.stop();
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the loop to end.
    pub async fn wait(self) -> Result<RunOutcome, JoinError> {
        self.join.await
    }
}

/// Builds a fresh [`PhoneAgent`] per run and spawns it on the runtime.
///
/// Only one run is expected at a time; starting a second while the first is
/// active is not prevented.
pub struct AgentController {
    collaborators: Collaborators,
    model: Arc<dyn ModelBackend>,
    config: AgentConfig,
    log: StepLog,
}

impl AgentController {
    pub fn new(
        collaborators: Collaborators,
        model: Arc<dyn ModelBackend>,
        config: AgentConfig,
    ) -> Self {
        Self {
            collaborators,
            model,
            config,
            log: StepLog::detached(),
        }
    }

    pub fn with_log(mut self, log: StepLog) -> Self {
        self.log = log;
        self
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Check that both device capabilities are usable.
    pub fn check_ready(&self) -> Result<(), StartError> {
        if !self.collaborators.capture.is_ready() {
            return Err(StartError::CaptureNotReady);
        }
        if !self.collaborators.accessibility.is_available() {
            return Err(StartError::AccessibilityUnavailable);
        }
        Ok(())
    }

    /// Start a run for `goal`.
    pub fn start(&self, goal: &str) -> Result<RunHandle, StartError> {
        let goal = goal.trim();
        if goal.is_empty() {
            return Err(StartError::EmptyGoal);
        }
        self.check_ready()?;

        let mut agent = PhoneAgent::new(
            self.collaborators.clone(),
            self.model.clone(),
            self.config.clone(),
        )
        .with_log(self.log.clone());
        let cancel = agent.cancel_handle();
        let goal = goal.to_string();

        tracing::info!(goal = %goal, "Starting agent run");
        let join = tokio::spawn(async move { agent.run(&goal).await });

        Ok(RunHandle { cancel, join })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::fake::{FakeCapture, FakeDevice, FakeModel};
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    fn controller(capture: FakeCapture, device: FakeDevice, reply: &str) -> AgentController {
        let device = Arc::new(device);
        AgentController::new(
            Collaborators {
                capture: Arc::new(capture),
                accessibility: device.clone(),
                apps: device,
            },
            Arc::new(FakeModel::always(reply)),
            AgentConfig::default().without_home(),
        )
    }

    #[tokio::test]
    async fn test_start_rejects_empty_goal() {
        let c = controller(FakeCapture::always(), FakeDevice::default(), "finish()");
        assert_eq!(c.start("   ").err(), Some(StartError::EmptyGoal));
    }

    #[tokio::test]
    async fn test_start_requires_capture() {
        let c = controller(FakeCapture::not_ready(), FakeDevice::default(), "finish()");
        assert_eq!(c.start("open settings").err(), Some(StartError::CaptureNotReady));
    }

    #[tokio::test]
    async fn test_start_requires_accessibility() {
        let device = FakeDevice::default();
        device.available.store(false, Ordering::SeqCst);
        let c = controller(FakeCapture::always(), device, "finish()");
        assert_eq!(
            c.start("open settings").err(),
            Some(StartError::AccessibilityUnavailable)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_to_completion() {
        let c = controller(
            FakeCapture::always(),
            FakeDevice::default(),
            r#"finish(message="done")"#,
        );
        let handle = c.start("open settings").unwrap();
        assert_eq!(handle.wait().await.unwrap(), RunOutcome::Completed { steps: 1 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_before_first_step() {
        let c = controller(
            FakeCapture::always(),
            FakeDevice::default(),
            r#"do(action="Back")"#,
        );
        let handle = c.start("keep going").unwrap();
        handle.stop();
        assert!(!handle.cancel_handle().is_running());
        assert_eq!(handle.wait().await.unwrap(), RunOutcome::Cancelled { steps: 0 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_mid_run() {
        let c = controller(
            FakeCapture::always(),
            FakeDevice::default(),
            r#"do(action="Back")"#,
        );
        let handle = c.start("keep going").unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        handle.stop();

        let outcome = handle.wait().await.unwrap();
        assert_eq!(outcome, RunOutcome::Cancelled { steps: 2 });
    }
}
