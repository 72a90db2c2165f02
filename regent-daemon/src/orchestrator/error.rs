//! Error types for the orchestrator

use std::collections::BTreeSet;

use regent_protocol::{Mode, ServiceId};

use crate::errors::{ModelError, StoreError};

fn join(services: &BTreeSet<ServiceId>) -> String {
    services
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors from a mode transition
#[derive(Debug, thiserror::Error)]
pub enum ModeError {
    #[error("Unknown mode: {0}")]
    UnknownMode(Mode),

    #[error("Failed to persist mode: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// A role app depends on something that is not itself a role app
    #[error("Orphaned role dependencies: {}", join(.orphans))]
    OrphanedDependencies { orphans: BTreeSet<ServiceId> },

    #[error("Dependency model error: {0}")]
    Model(#[from] ModelError),

    #[error("Config store error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Mode(#[from] ModeError),

    #[error("Orchestrator is not running")]
    ActorClosed,
}
