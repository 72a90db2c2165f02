//! Running-service registry.
//!
//! The set of `(service, node)` pairs this node believes to be running
//! anywhere in the cluster. Owned and mutated exclusively by the orchestrator
//! actor; duplicate inserts and removals of absent entries are no-ops, so
//! redelivered lifecycle events are harmless.

use std::collections::BTreeSet;

use regent_protocol::protocol::RunningEntry;
use regent_protocol::{NodeId, ServiceId};

#[derive(Debug, Clone, Default)]
pub struct RunningRegistry {
    entries: BTreeSet<RunningEntry>,
}

impl RunningRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from a local inventory snapshot
    pub fn seeded<I>(node: &NodeId, services: I) -> Self
    where
        I: IntoIterator<Item = ServiceId>,
    {
        Self {
            entries: services
                .into_iter()
                .map(|service| RunningEntry {
                    service,
                    node: node.clone(),
                })
                .collect(),
        }
    }

    /// Returns true if the entry was not already present
    pub fn insert(&mut self, service: ServiceId, node: NodeId) -> bool {
        self.entries.insert(RunningEntry { service, node })
    }

    /// Returns true if the entry was present
    pub fn remove(&mut self, service: &ServiceId, node: &NodeId) -> bool {
        // BTreeSet has no borrowed-tuple lookup, so build the key
        self.entries.remove(&RunningEntry {
            service: service.clone(),
            node: node.clone(),
        })
    }

    pub fn contains(&self, entry: &RunningEntry) -> bool {
        self.entries.contains(entry)
    }

    /// Whether `service` is running on any node
    pub fn is_running_anywhere(&self, service: &ServiceId) -> bool {
        self.nodes_running(service).next().is_some()
    }

    /// Nodes currently running `service`
    pub fn nodes_running<'a>(&'a self, service: &'a ServiceId) -> impl Iterator<Item = &'a NodeId> {
        self.entries
            .iter()
            .skip_while(move |entry| &entry.service < service)
            .take_while(move |entry| &entry.service == service)
            .map(|entry| &entry.node)
    }

    pub fn entries(&self) -> impl Iterator<Item = &RunningEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
