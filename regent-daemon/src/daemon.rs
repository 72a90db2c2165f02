//! Daemon startup: loads the topology, opens the mode store and runs an
//! orchestrator with the reference collaborators.

use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{RegentConfig, TopologyConfig};
use crate::controller::LoggingControllerFactory;
use crate::deps::start_order;
use crate::errors::DaemonError;
use crate::inventory::StaticInventory;
use crate::model::StaticDependencyModel;
use crate::orchestrator::{Collaborators, Orchestrator, OrchestratorHandle};
use crate::store::{ConfigStore, FileConfigStore, ModeState};

/// Start the orchestrator described by `config` and report the daemon's own
/// bootstrap service as running, which unlocks the default mode.
///
/// Must be called from within a tokio runtime.
pub async fn start_daemon(config: &RegentConfig) -> Result<OrchestratorHandle, DaemonError> {
    let topology = TopologyConfig::load(&config.topology)?;

    let order = start_order(&topology.graph())?;
    info!(
        "Start order: {}",
        order.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
    );

    let state_dir = config.state_dir()?;
    let store = FileConfigStore::open(
        state_dir.clone(),
        ModeState::new(topology.default_mode.clone(), topology.protected_apps.clone()),
    )?;
    info!("Mode state in {:?}", state_dir);

    let stored_default = store.default_mode()?;
    if !topology.modes.contains_key(&stored_default) {
        warn!(
            "Stored default mode {} is not defined in {:?}; the node will stay in protected mode",
            stored_default, config.topology
        );
    } else if stored_default != topology.default_mode {
        info!(
            "Using stored default mode {} instead of topology default {}",
            stored_default, topology.default_mode
        );
    }

    let collaborators = Collaborators {
        model: Arc::new(StaticDependencyModel::new(topology, config.node.clone())),
        store: Arc::new(store),
        inventory: Arc::new(StaticInventory::new(config.already_running.iter().cloned())),
        controllers: Arc::new(LoggingControllerFactory),
    };

    let handle = Orchestrator::spawn(config.orchestrator_config(), collaborators)?;

    handle
        .running(config.bootstrap_service.clone(), config.node.clone())
        .await;

    Ok(handle)
}
