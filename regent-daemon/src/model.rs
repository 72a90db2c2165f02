//! Dependency model: the orchestrator's view of the dependency graph, role
//! membership and mode tables.

use std::collections::BTreeSet;
use std::sync::Arc;

use regent_protocol::{Mode, NodeId, ServiceId};

use crate::config::TopologyConfig;
use crate::deps::{closure, direct_dependencies, DependencyGraph};
use crate::errors::ModelError;

/// A managed service as declared to the dependency model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotatedDep {
    pub service: ServiceId,
    /// Node the service lives on
    pub node: NodeId,
    /// Language-runtime level service; never gets a controller
    pub foundational: bool,
}

/// Result of [`DependencyModel::dependencies`]
#[derive(Debug, Clone)]
pub struct Dependencies {
    pub graph: Arc<DependencyGraph>,
    pub annotated: Vec<AnnotatedDep>,
}

pub trait DependencyModel: Send + Sync {
    fn dependencies(&self) -> Result<Dependencies, ModelError>;

    /// Services whose run permission is governed by the active mode
    fn role_apps(&self) -> Result<BTreeSet<ServiceId>, ModelError>;

    /// Direct dependencies of `service`
    fn dependencies_of_app(&self, graph: &DependencyGraph, service: &ServiceId) -> BTreeSet<ServiceId> {
        direct_dependencies(graph, service)
    }

    /// Direct and transitive dependencies of `service`, following
    /// [`Self::dependencies_of_app`]. `service` itself is only included when
    /// it sits on a cycle.
    fn app_dependencies(&self, graph: &DependencyGraph, service: &ServiceId) -> BTreeSet<ServiceId> {
        closure(self.dependencies_of_app(graph, service), |dep| {
            self.dependencies_of_app(graph, dep)
        })
    }

    /// `seeds` plus everything they depend on
    fn dependency_closure(
        &self,
        graph: &DependencyGraph,
        seeds: &BTreeSet<ServiceId>,
    ) -> BTreeSet<ServiceId> {
        let mut closed = seeds.clone();
        for seed in seeds {
            closed.extend(self.app_dependencies(graph, seed));
        }
        closed
    }

    /// Members of `mode`; empty for unknown modes
    fn apps_in_mode(&self, mode: &Mode) -> BTreeSet<ServiceId>;

    fn valid_mode(&self, mode: &Mode) -> bool;
}

/// Dependency model backed by a topology file
#[derive(Debug, Clone)]
pub struct StaticDependencyModel {
    topology: TopologyConfig,
    graph: Arc<DependencyGraph>,
    local_node: NodeId,
}

impl StaticDependencyModel {
    /// Services without an explicit `node` are placed on `local_node`
    pub fn new(topology: TopologyConfig, local_node: NodeId) -> Self {
        let graph = Arc::new(topology.graph());
        Self {
            topology,
            graph,
            local_node,
        }
    }

    pub fn topology(&self) -> &TopologyConfig {
        &self.topology
    }
}

impl DependencyModel for StaticDependencyModel {
    /// Fails if an edge points at a service the topology never declares,
    /// since its node is unknown.
    fn dependencies(&self) -> Result<Dependencies, ModelError> {
        if let Some(undeclared) = self
            .graph
            .services()
            .find(|service| !self.topology.services.contains_key(*service))
        {
            return Err(ModelError::UnknownService(undeclared.clone()));
        }

        let annotated = self
            .topology
            .services
            .iter()
            .map(|(name, service)| AnnotatedDep {
                service: name.clone(),
                node: service
                    .node
                    .clone()
                    .unwrap_or_else(|| self.local_node.clone()),
                foundational: service.foundational,
            })
            .collect();

        Ok(Dependencies {
            graph: Arc::clone(&self.graph),
            annotated,
        })
    }

    fn role_apps(&self) -> Result<BTreeSet<ServiceId>, ModelError> {
        Ok(self.topology.role_apps())
    }

    fn apps_in_mode(&self, mode: &Mode) -> BTreeSet<ServiceId> {
        self.topology.modes.get(mode).cloned().unwrap_or_default()
    }

    fn valid_mode(&self, mode: &Mode) -> bool {
        self.topology.modes.contains_key(mode)
    }
}
