//! Test harness that runs an orchestrator against in-memory collaborators

use crate::helpers::recording_controller::RecordingControllerFactory;
use regent_daemon::config::TopologyConfig;
use regent_daemon::controller::ControllerEvent;
use regent_daemon::inventory::StaticInventory;
use regent_daemon::model::StaticDependencyModel;
use regent_daemon::orchestrator::OrchestratorError;
use regent_daemon::store::{ConfigStore, MemoryConfigStore};
use regent_daemon::{Collaborators, Orchestrator, OrchestratorConfig, OrchestratorHandle};
use regent_protocol::ServiceId;
use std::sync::Arc;

/// A running orchestrator plus the test doubles it was built with
pub struct TestOrchestrator {
    pub handle: OrchestratorHandle,
    pub controllers: Arc<RecordingControllerFactory>,
    pub store: Arc<dyn ConfigStore>,
}

impl TestOrchestrator {
    /// Start an orchestrator on `node` with an in-memory store seeded from
    /// the topology. `running` is what the local inventory reports.
    pub fn start(
        topology: TopologyConfig,
        node: &str,
        running: &[&str],
    ) -> Result<Self, OrchestratorError> {
        Self::start_with_config(OrchestratorConfig::new(node), topology, running)
    }

    pub fn start_with_config(
        config: OrchestratorConfig,
        topology: TopologyConfig,
        running: &[&str],
    ) -> Result<Self, OrchestratorError> {
        let store = Arc::new(MemoryConfigStore::new(
            topology.default_mode.clone(),
            topology.protected_apps.clone(),
        ));
        Self::start_with_store(config, topology, store, running)
    }

    /// Start with a caller-provided config store
    pub fn start_with_store(
        config: OrchestratorConfig,
        topology: TopologyConfig,
        store: Arc<dyn ConfigStore>,
        running: &[&str],
    ) -> Result<Self, OrchestratorError> {
        let controllers = Arc::new(RecordingControllerFactory::new());
        let collaborators = Collaborators {
            model: Arc::new(StaticDependencyModel::new(topology, config.node.clone())),
            store: Arc::clone(&store),
            inventory: Arc::new(StaticInventory::new(
                running.iter().map(|s| ServiceId::from(*s)),
            )),
            controllers: controllers.clone(),
        };

        let handle = Orchestrator::spawn(config, collaborators)?;

        Ok(Self {
            handle,
            controllers,
            store,
        })
    }

    /// Events queued for `service`'s controller since the last call
    pub fn events(&self, service: &str) -> Vec<ControllerEvent> {
        self.controllers.drain(service)
    }
}
