//! Programmatic topology creation with builder pattern

use regent_daemon::config::{DependsOnEntry, ServiceTopology, TopologyConfig};
use regent_protocol::protocol::DependencyKind;
use regent_protocol::{Mode, NodeId, ServiceId};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Builder for creating test topologies
pub struct TestTopologyBuilder {
    default_mode: Mode,
    protected_apps: BTreeSet<ServiceId>,
    services: BTreeMap<ServiceId, ServiceTopology>,
    modes: BTreeMap<Mode, BTreeSet<ServiceId>>,
}

impl TestTopologyBuilder {
    /// Start a topology whose default mode is `default_mode`. The mode itself
    /// still has to be added with [`Self::add_mode`].
    pub fn new(default_mode: &str) -> Self {
        Self {
            default_mode: Mode::from(default_mode),
            protected_apps: BTreeSet::new(),
            services: BTreeMap::new(),
            modes: BTreeMap::new(),
        }
    }

    pub fn with_protected_apps(mut self, apps: &[&str]) -> Self {
        self.protected_apps = apps.iter().map(|a| ServiceId::from(*a)).collect();
        self
    }

    pub fn add_service(mut self, name: &str, service: TestServiceBuilder) -> Self {
        self.services.insert(ServiceId::from(name), service.build());
        self
    }

    pub fn add_mode(mut self, name: &str, members: &[&str]) -> Self {
        self.modes.insert(
            Mode::from(name),
            members.iter().map(|m| ServiceId::from(*m)).collect(),
        );
        self
    }

    pub fn build(self) -> TopologyConfig {
        TopologyConfig {
            default_mode: self.default_mode,
            protected_apps: self.protected_apps,
            services: self.services,
            modes: self.modes,
        }
    }

    /// Write the topology to a YAML file and return the path
    pub fn write_to_file(self, dir: &Path) -> std::io::Result<PathBuf> {
        let path = dir.join("topology.yaml");
        let contents = serde_yaml::to_string(&self.build()).map_err(std::io::Error::other)?;
        std::fs::write(&path, contents)?;
        Ok(path)
    }
}

/// Builder for a single service entry
#[derive(Default)]
pub struct TestServiceBuilder {
    service: ServiceTopology,
}

impl TestServiceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for a role app
    pub fn role() -> Self {
        Self::new().with_role(true)
    }

    pub fn with_role(mut self, role: bool) -> Self {
        self.service.role = role;
        self
    }

    pub fn load_only(mut self) -> Self {
        self.service.load_only = true;
        self
    }

    pub fn foundational(mut self) -> Self {
        self.service.foundational = true;
        self
    }

    pub fn on_node(mut self, node: &str) -> Self {
        self.service.node = Some(NodeId::from(node));
        self
    }

    /// Add a start-after dependency
    pub fn depends_on(mut self, name: &str) -> Self {
        self.service
            .depends_on
            .push(DependsOnEntry::Simple(ServiceId::from(name)));
        self
    }

    /// Add a dependency that imposes no start order
    pub fn uses(mut self, name: &str) -> Self {
        self.service.depends_on.push(DependsOnEntry::Labelled(BTreeMap::from([(
            ServiceId::from(name),
            DependencyKind::Uses,
        )])));
        self
    }

    pub fn build(self) -> ServiceTopology {
        self.service
    }
}
