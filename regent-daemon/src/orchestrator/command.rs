use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::oneshot;

use regent_protocol::protocol::{Admission, RunningEntry};
use regent_protocol::{Mode, NodeId, ServiceId};

use crate::deps::DependencyGraph;

use super::error::ModeError;

/// Everything the orchestrator actor understands. Variants with a `reply`
/// are synchronous; the rest are fire-and-forget.
pub enum OrchestratorCommand {
    // === Lifecycle events ===
    Running {
        service: ServiceId,
        node: NodeId,
    },
    Stopped {
        service: ServiceId,
        node: NodeId,
    },

    // === Mode ===
    SetMode {
        mode: Mode,
        reply: oneshot::Sender<Result<(), ModeError>>,
    },

    // === Admission queries ===
    ShouldIRun {
        service: ServiceId,
        reply: oneshot::Sender<bool>,
    },
    OkToStart {
        service: ServiceId,
        reply: oneshot::Sender<Admission>,
    },
    OkToStop {
        service: ServiceId,
        reply: oneshot::Sender<Admission>,
    },
    CheckDependencies {
        deps: Vec<RunningEntry>,
        reply: oneshot::Sender<Admission>,
    },

    // === Introspection ===
    Graph {
        reply: oneshot::Sender<Arc<DependencyGraph>>,
    },
    CurrentMode {
        reply: oneshot::Sender<Mode>,
    },
    AllowedApps {
        reply: oneshot::Sender<BTreeSet<ServiceId>>,
    },
    RunningServices {
        reply: oneshot::Sender<Vec<RunningEntry>>,
    },

    /// Stop the actor loop
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}
