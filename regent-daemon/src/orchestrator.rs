//! Per-node orchestrator actor.
//!
//! A single task owns the orchestrator state and the running-service
//! registry and processes commands one at a time from its mailbox, so no
//! state is ever shared or locked.
//!
//! ## Module Structure
//!
//! - `actor` - Orchestrator struct, startup validation and the command loop
//! - `state` - OrchestratorState and the admission rules
//! - `handle` - OrchestratorHandle (cheap-to-clone interface for callers)
//! - `command` - OrchestratorCommand enum (all command variants)
//! - `error` - OrchestratorError and ModeError

mod actor;
mod command;
mod error;
mod handle;
mod state;

pub use actor::Orchestrator;
pub use command::OrchestratorCommand;
pub use error::{ModeError, OrchestratorError};
pub use handle::OrchestratorHandle;
pub use state::OrchestratorState;

use std::collections::BTreeSet;
use std::sync::Arc;

use regent_protocol::{NodeId, ServiceId};

use crate::config::{RemoteEventPolicy, DEFAULT_BOOTSTRAP_SERVICE, DEFAULT_MAILBOX_CAPACITY};
use crate::controller::{ControllerFactory, CONTROLLER_CHANNEL_CAPACITY};
use crate::inventory::LocalInventory;
use crate::model::DependencyModel;
use crate::store::ConfigStore;

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// The node this orchestrator runs on
    pub node: NodeId,
    /// The orchestrator's own service; its `running` event unlocks protected mode
    pub bootstrap_service: ServiceId,
    pub mailbox_capacity: usize,
    pub controller_channel_capacity: usize,
    /// Services that never get a controller, in addition to those the
    /// dependency model marks foundational
    pub foundational_services: BTreeSet<ServiceId>,
    pub remote_events: RemoteEventPolicy,
}

impl OrchestratorConfig {
    pub fn new(node: impl Into<NodeId>) -> Self {
        Self {
            node: node.into(),
            bootstrap_service: ServiceId::from(DEFAULT_BOOTSTRAP_SERVICE),
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            controller_channel_capacity: CONTROLLER_CHANNEL_CAPACITY,
            foundational_services: BTreeSet::new(),
            remote_events: RemoteEventPolicy::default(),
        }
    }

    pub fn with_bootstrap_service(mut self, service: impl Into<ServiceId>) -> Self {
        self.bootstrap_service = service.into();
        self
    }
}

/// External collaborators injected into the orchestrator
#[derive(Clone)]
pub struct Collaborators {
    pub model: Arc<dyn DependencyModel>,
    pub store: Arc<dyn ConfigStore>,
    pub inventory: Arc<dyn LocalInventory>,
    pub controllers: Arc<dyn ControllerFactory>,
}
