// Copyright 2025 Zhipu AI (Original Python implementation)
// Copyright 2025 ModerRAS (Rust implementation)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # AutoGLM client
//!
//! AI-powered agent for automating Android phone interactions.
//!
//! Each step captures the screen, asks a vision-language model for exactly
//! one instruction such as `do(action="Tap", element=[500,200])`, and
//! executes it on the device. Coordinates are normalized to 0-1000 and scaled
//! against the real resolution. Device access goes through the traits in
//! [`device`], with an ADB-backed implementation in [`adb`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use autoglm_client::adb::{AdbConnection, AdbDevice, AdbScreenCapture};
//! use autoglm_client::{AgentConfig, Collaborators, ModelClient, ModelConfig, PhoneAgent};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let conn = AdbConnection::new();
//!     let capture = Arc::new(AdbScreenCapture::new(conn.clone()));
//!     let device = Arc::new(AdbDevice::new(conn));
//!     capture.probe().await;
//!     device.probe().await;
//!
//!     let collaborators = Collaborators {
//!         capture,
//!         accessibility: device.clone(),
//!         apps: device,
//!     };
//!     let model = Arc::new(ModelClient::new(ModelConfig::default())?);
//!
//!     let mut agent = PhoneAgent::new(collaborators, model, AgentConfig::default());
//!     let outcome = agent.run("打开设置，搜索视频彩铃").await;
//!
//!     println!("Task result: {}", outcome);
//!     Ok(())
//! }
//! ```

pub mod actions;
pub mod adb;
pub mod agent;
pub mod config;
pub mod device;
pub mod logger;
pub mod model;
pub mod settings;

pub use actions::{parse_command, Action, ActionHandler, Command, ParseError, NORMALIZED_MAX};
pub use agent::{
    AgentConfig, AgentController, CancelHandle, Collaborators, PhoneAgent, RunHandle, RunOutcome,
    StartError,
};
pub use device::{Accessibility, AppCatalog, DeviceError, Frame, ScreenCapture, ScreenSize};
pub use model::{ModelBackend, ModelClient, ModelConfig, ModelError, ModelResponse};
pub use settings::AppSettings;
