//! Daemon configuration (`regent.yaml`).
//!
//! ```yaml
//! node: node1
//! bootstrap_service: regent
//! topology: topology.yaml
//! mailbox_capacity: 256
//! controller_channel_capacity: 100
//! foundational_services: [kernel, stdlib]
//! remote_events: accept
//! already_running: [regent]
//! ```

mod topology;

pub use topology::{DependsOnEntry, ServiceTopology, TopologyConfig};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use regent_protocol::{NodeId, ServiceId};

use crate::controller::CONTROLLER_CHANNEL_CAPACITY;
use crate::errors::ConfigError;
use crate::orchestrator::OrchestratorConfig;

/// Default orchestrator mailbox capacity
pub const DEFAULT_MAILBOX_CAPACITY: usize = 256;

/// Default name of the orchestrator's own bootstrap service
pub const DEFAULT_BOOTSTRAP_SERVICE: &str = "regent";

/// What to do with `running`/`stopped` events about other nodes.
///
/// Delivery between nodes is assumed at-least-once with per-sender FIFO.
/// The registry is a set, so redelivery is harmless either way.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteEventPolicy {
    /// Track remote services in the registry and fan events out
    #[default]
    Accept,
    /// Drop events about other nodes
    Ignore,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegentConfig {
    /// Name of this node
    pub node: NodeId,
    #[serde(default = "default_bootstrap_service")]
    pub bootstrap_service: ServiceId,
    /// Topology file, relative to the config file's directory
    pub topology: PathBuf,
    /// Where the mode state is persisted (defaults to the global state dir)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_dir: Option<PathBuf>,
    #[serde(default = "default_mailbox_capacity")]
    pub mailbox_capacity: usize,
    #[serde(default = "default_controller_channel_capacity")]
    pub controller_channel_capacity: usize,
    /// Services that never get a controller
    #[serde(default = "default_foundational_services")]
    pub foundational_services: Vec<ServiceId>,
    #[serde(default)]
    pub remote_events: RemoteEventPolicy,
    /// Services already running on this node when the daemon starts
    #[serde(default)]
    pub already_running: Vec<ServiceId>,
}

fn default_bootstrap_service() -> ServiceId {
    ServiceId::from(DEFAULT_BOOTSTRAP_SERVICE)
}

fn default_mailbox_capacity() -> usize {
    DEFAULT_MAILBOX_CAPACITY
}

fn default_controller_channel_capacity() -> usize {
    CONTROLLER_CHANNEL_CAPACITY
}

fn default_foundational_services() -> Vec<ServiceId> {
    vec![ServiceId::from("kernel"), ServiceId::from("stdlib")]
}

impl RegentConfig {
    /// Load the config and resolve the topology path against the config's directory
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config: RegentConfig = read_yaml(path)?;

        if config.topology.is_relative() {
            let config_dir = path.parent().unwrap_or(Path::new("."));
            config.topology = config_dir.join(&config.topology);
        }
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.node.as_str().is_empty() {
            return Err(ConfigError::Invalid("node name must not be empty".into()));
        }
        if self.mailbox_capacity == 0 {
            return Err(ConfigError::Invalid("mailbox_capacity must be at least 1".into()));
        }
        if self.controller_channel_capacity == 0 {
            return Err(ConfigError::Invalid(
                "controller_channel_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Resolved state directory
    pub fn state_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.state_dir {
            Some(dir) => Ok(dir.clone()),
            None => crate::global_state_dir(),
        }
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            node: self.node.clone(),
            bootstrap_service: self.bootstrap_service.clone(),
            mailbox_capacity: self.mailbox_capacity,
            controller_channel_capacity: self.controller_channel_capacity,
            foundational_services: self.foundational_services.iter().cloned().collect(),
            remote_events: self.remote_events,
        }
    }
}

/// Read a YAML file, reporting the offending field path on parse errors
pub(crate) fn read_yaml<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConfigError::NotFound(path.to_path_buf())
        } else {
            ConfigError::Read {
                path: path.to_path_buf(),
                source: e,
            }
        }
    })?;

    let de = serde_yaml::Deserializer::from_str(&contents);
    serde_path_to_error::deserialize(de).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}
