//! Service topology: the dependency graph, role membership and mode tables.
//!
//! ```yaml
//! default_mode: production
//! protected_apps: [regent]
//! services:
//!   regent: {}
//!   stdlib: { load_only: true, foundational: true }
//!   db: { role: true }
//!   cache: { role: true }
//!   web:
//!     role: true
//!     depends_on:
//!       - db
//!       - cache: uses
//! modes:
//!   production: [cache, db, web]
//!   maintenance: [db]
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use regent_protocol::protocol::{DependencyKind, ServiceKind};
use regent_protocol::{Mode, NodeId, ServiceId};

use crate::deps::{start_order, DependencyGraph};
use crate::errors::ConfigError;

/// A `depends_on` entry - either a bare name (start-after) or `{name: kind}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DependsOnEntry {
    Simple(ServiceId),
    Labelled(BTreeMap<ServiceId, DependencyKind>),
}

impl DependsOnEntry {
    pub fn edges(&self) -> Vec<(ServiceId, DependencyKind)> {
        match self {
            DependsOnEntry::Simple(name) => vec![(name.clone(), DependencyKind::StartAfter)],
            DependsOnEntry::Labelled(map) => {
                map.iter().map(|(name, kind)| (name.clone(), *kind)).collect()
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceTopology {
    /// Home node; defaults to the local node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<NodeId>,
    /// Has no executable entry point
    #[serde(default)]
    pub load_only: bool,
    /// Runtime-level service that is never controlled
    #[serde(default)]
    pub foundational: bool,
    /// Run-permission governed by the active mode
    #[serde(default)]
    pub role: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<DependsOnEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyConfig {
    pub default_mode: Mode,
    #[serde(default)]
    pub protected_apps: BTreeSet<ServiceId>,
    #[serde(default)]
    pub services: BTreeMap<ServiceId, ServiceTopology>,
    #[serde(default)]
    pub modes: BTreeMap<Mode, BTreeSet<ServiceId>>,
}

impl TopologyConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let topology: TopologyConfig = super::read_yaml(path)?;
        topology.validate()?;
        Ok(topology)
    }

    /// Reject references to undeclared services, an undeclared default mode,
    /// a reuse of the protected mode name, and start-after cycles.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let known = |service: &ServiceId| self.services.contains_key(service);

        for (name, service) in &self.services {
            for entry in &service.depends_on {
                for (dep, _) in entry.edges() {
                    if !known(&dep) {
                        return Err(ConfigError::Invalid(format!(
                            "Missing dependency for service {}: {}",
                            name, dep
                        )));
                    }
                }
            }
        }

        for (mode, members) in &self.modes {
            if mode.is_protected() {
                return Err(ConfigError::Invalid(format!(
                    "mode '{}' is reserved for bootstrap and cannot be declared",
                    mode
                )));
            }
            if let Some(unknown) = members.iter().find(|s| !known(s)) {
                return Err(ConfigError::Invalid(format!(
                    "mode '{}' lists unknown service '{}'",
                    mode, unknown
                )));
            }
        }

        if !self.modes.contains_key(&self.default_mode) {
            return Err(ConfigError::Invalid(format!(
                "default_mode '{}' is not a declared mode",
                self.default_mode
            )));
        }

        if let Some(unknown) = self.protected_apps.iter().find(|s| !known(s)) {
            return Err(ConfigError::Invalid(format!(
                "protected_apps lists unknown service '{}'",
                unknown
            )));
        }

        start_order(&self.graph()).map_err(|cycle| ConfigError::Invalid(cycle.to_string()))?;

        Ok(())
    }

    pub fn graph(&self) -> DependencyGraph {
        let mut graph = DependencyGraph::new();
        for (name, service) in &self.services {
            let kind = if service.load_only {
                ServiceKind::LoadOnly
            } else {
                ServiceKind::Executable
            };
            graph.add_service(name.clone(), kind);
        }
        for (name, service) in &self.services {
            for entry in &service.depends_on {
                for (dep, kind) in entry.edges() {
                    graph.add_dependency(name.clone(), dep, kind);
                }
            }
        }
        graph
    }

    pub fn role_apps(&self) -> BTreeSet<ServiceId> {
        self.services
            .iter()
            .filter(|(_, service)| service.role)
            .map(|(name, _)| name.clone())
            .collect()
    }
}
