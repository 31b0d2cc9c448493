//! Configuration module: prompts and the known-app table.

mod apps;
mod prompts;

pub use apps::{catalog_for, label_for, KNOWN_APPS};
pub use prompts::{instruction_prompt, step_prompt, ACTIONS_EN, ACTIONS_ZH};
