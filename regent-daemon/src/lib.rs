use std::path::PathBuf;

pub mod config;
pub mod controller;
pub mod daemon;
pub mod deps;
pub mod errors;
pub mod inventory;
pub mod model;
pub mod orchestrator;
pub mod registry;
pub mod store;

pub use daemon::start_daemon;
pub use orchestrator::{Collaborators, Orchestrator, OrchestratorConfig, OrchestratorHandle};

const GLOBAL_STATE_DIR: &str = ".regent";

/// Directory for persisted daemon state.
///
/// `REGENT_STATE_DIR` overrides the default of `~/.regent`.
pub fn global_state_dir() -> Result<PathBuf, errors::ConfigError> {
    if let Ok(dir) = std::env::var("REGENT_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|home| home.join(GLOBAL_STATE_DIR))
        .ok_or_else(|| errors::ConfigError::Invalid("could not determine home directory".into()))
}
