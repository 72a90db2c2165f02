use std::path::PathBuf;
use thiserror::Error;

use regent_protocol::ServiceId;

/// Format a YAML error for user-friendly display, including the field path
fn format_yaml_error(e: &serde_path_to_error::Error<serde_yaml::Error>) -> String {
    let path = e.path().to_string();
    let inner = e.inner();
    let msg = inner.to_string();

    let located = if let Some(loc) = inner.location() {
        format!("Line {}, Column {}: {}", loc.line(), loc.column(), msg)
    } else {
        msg
    };

    if path.is_empty() || path == "." {
        located
    } else {
        format!("{}: {}", path, located)
    }
}

/// Errors loading the daemon config or topology files
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}':\n  {}", format_yaml_error(.source))]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_path_to_error::Error<serde_yaml::Error>,
    },

    #[error("Configuration error: {0}")]
    Invalid(String),
}

/// Errors from a [`ConfigStore`](crate::store::ConfigStore)
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to access '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize mode state: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("Failed to parse mode state '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors from a [`DependencyModel`](crate::model::DependencyModel)
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Unknown service: {0}")]
    UnknownService(ServiceId),
}

/// Errors that stop the daemon from starting
#[derive(Error, Debug)]
pub enum DaemonError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Invalid topology: {0}")]
    Cycle(#[from] crate::deps::DependencyCycle),

    #[error(transparent)]
    Orchestrator(#[from] crate::orchestrator::OrchestratorError),
}
