//! Agent module for orchestrating phone automation.

mod controller;
mod phone_agent;

pub use controller::{AgentController, RunHandle, StartError};
pub use phone_agent::{AgentConfig, CancelHandle, Collaborators, PhoneAgent, RunOutcome};
