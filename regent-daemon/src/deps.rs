use std::collections::{BTreeMap, BTreeSet};

use regent_protocol::protocol::{
    DependencyEdge, DependencyKind, GraphSnapshot, ServiceKind, ServiceVertex,
};
use regent_protocol::ServiceId;

/// Directed dependency graph over managed services.
///
/// An edge `A -> B` means A depends on B. Edges labelled
/// [`DependencyKind::StartAfter`] additionally mean that A may only start once
/// B is running. Edges are kept in both directions so that admission checks
/// for starting (out-edges) and stopping (in-edges) are equally cheap.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    kinds: BTreeMap<ServiceId, ServiceKind>,
    out_edges: BTreeMap<ServiceId, BTreeMap<ServiceId, DependencyKind>>,
    in_edges: BTreeMap<ServiceId, BTreeMap<ServiceId, DependencyKind>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a vertex, or update its kind if it already exists
    pub fn add_service(&mut self, service: impl Into<ServiceId>, kind: ServiceKind) {
        let service = service.into();
        self.out_edges.entry(service.clone()).or_default();
        self.in_edges.entry(service.clone()).or_default();
        self.kinds.insert(service, kind);
    }

    /// Add an edge `from -> to`. Missing endpoints are added as executable services.
    pub fn add_dependency(
        &mut self,
        from: impl Into<ServiceId>,
        to: impl Into<ServiceId>,
        kind: DependencyKind,
    ) {
        let from = from.into();
        let to = to.into();
        for service in [&from, &to] {
            if !self.kinds.contains_key(service) {
                self.add_service(service.clone(), ServiceKind::Executable);
            }
        }
        if let Some(edges) = self.out_edges.get_mut(&from) {
            edges.insert(to.clone(), kind);
        }
        if let Some(edges) = self.in_edges.get_mut(&to) {
            edges.insert(from, kind);
        }
    }

    pub fn contains(&self, service: &ServiceId) -> bool {
        self.kinds.contains_key(service)
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    pub fn services(&self) -> impl Iterator<Item = &ServiceId> {
        self.kinds.keys()
    }

    pub fn kind(&self, service: &ServiceId) -> Option<ServiceKind> {
        self.kinds.get(service).copied()
    }

    /// Load-only services have nothing to run and vacuously satisfy dependents
    pub fn is_load_only(&self, service: &ServiceId) -> bool {
        self.kind(service) == Some(ServiceKind::LoadOnly)
    }

    /// Direct dependencies of `service` with their edge labels
    pub fn dependencies(
        &self,
        service: &ServiceId,
    ) -> impl Iterator<Item = (&ServiceId, DependencyKind)> {
        self.out_edges
            .get(service)
            .into_iter()
            .flat_map(|edges| edges.iter().map(|(to, kind)| (to, *kind)))
    }

    /// Services that directly depend on `service`, with their edge labels
    pub fn dependents(
        &self,
        service: &ServiceId,
    ) -> impl Iterator<Item = (&ServiceId, DependencyKind)> {
        self.in_edges
            .get(service)
            .into_iter()
            .flat_map(|edges| edges.iter().map(|(from, kind)| (from, *kind)))
    }

    /// Services that must be running before `service` may start
    pub fn start_after(&self, service: &ServiceId) -> impl Iterator<Item = &ServiceId> {
        self.dependencies(service)
            .filter(|(_, kind)| *kind == DependencyKind::StartAfter)
            .map(|(to, _)| to)
    }

    /// Services that were ordered to start after `service`
    pub fn started_after_by(&self, service: &ServiceId) -> impl Iterator<Item = &ServiceId> {
        self.dependents(service)
            .filter(|(_, kind)| *kind == DependencyKind::StartAfter)
            .map(|(from, _)| from)
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            services: self
                .kinds
                .iter()
                .map(|(service, kind)| ServiceVertex {
                    service: service.clone(),
                    kind: *kind,
                })
                .collect(),
            edges: self
                .out_edges
                .iter()
                .flat_map(|(from, edges)| {
                    edges.iter().map(move |(to, kind)| DependencyEdge {
                        from: from.clone(),
                        to: to.clone(),
                        kind: *kind,
                    })
                })
                .collect(),
        }
    }
}

/// Smallest superset of `seeds` closed under `neighbours`.
///
/// Seeds without neighbours are kept as-is. Cycles are fine.
pub fn closure<I, F>(seeds: I, mut neighbours: F) -> BTreeSet<ServiceId>
where
    I: IntoIterator<Item = ServiceId>,
    F: FnMut(&ServiceId) -> BTreeSet<ServiceId>,
{
    let mut closed: BTreeSet<ServiceId> = BTreeSet::new();
    let mut stack: Vec<ServiceId> = seeds.into_iter().collect();

    while let Some(service) = stack.pop() {
        if closed.contains(&service) {
            continue;
        }
        stack.extend(
            neighbours(&service)
                .into_iter()
                .filter(|dep| !closed.contains(dep)),
        );
        closed.insert(service);
    }

    closed
}

/// Direct dependency targets of `service`, edges of any label
pub fn direct_dependencies(graph: &DependencyGraph, service: &ServiceId) -> BTreeSet<ServiceId> {
    graph.dependencies(service).map(|(to, _)| to.clone()).collect()
}

/// A cycle among start-after edges; no start order exists
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Cycle detected involving: {}", .0.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", "))]
pub struct DependencyCycle(pub Vec<ServiceId>);

/// Order in which services can be started so that every start-after
/// dependency starts first (Kahn's algorithm, deterministic).
pub fn start_order(graph: &DependencyGraph) -> Result<Vec<ServiceId>, DependencyCycle> {
    let mut in_degree: BTreeMap<&ServiceId, usize> =
        graph.services().map(|service| (service, 0)).collect();

    for service in graph.services() {
        let count = graph.start_after(service).count();
        if let Some(deg) = in_degree.get_mut(service) {
            *deg = count;
        }
    }

    // Sorted descending so that pop() yields the alphabetically smallest
    let mut queue: Vec<&ServiceId> = in_degree
        .iter()
        .filter(|&(_, deg)| *deg == 0)
        .map(|(service, _)| *service)
        .collect();
    queue.reverse();

    let mut result = Vec::with_capacity(graph.len());

    while let Some(service) = queue.pop() {
        result.push(service.clone());

        for dependent in graph.started_after_by(service) {
            if let Some(deg) = in_degree.get_mut(dependent) {
                *deg -= 1;
                if *deg == 0 {
                    let pos = queue.partition_point(|x| *x > dependent);
                    queue.insert(pos, dependent);
                }
            }
        }
    }

    if result.len() != graph.len() {
        let remaining = graph
            .services()
            .filter(|service| !result.contains(service))
            .cloned()
            .collect();
        return Err(DependencyCycle(remaining));
    }

    Ok(result)
}
