use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use regent_protocol::protocol::{Admission, Blocker, RunningEntry};
use regent_protocol::{Mode, ServiceId};

use crate::controller::ControllerHandle;
use crate::deps::DependencyGraph;
use crate::registry::RunningRegistry;

/// Everything the orchestrator decides with.
///
/// `allowed_apps` is derived from the other fields and is only replaced as a
/// whole by a mode transition.
#[derive(Debug)]
pub struct OrchestratorState {
    pub(super) controllers: BTreeMap<ServiceId, ControllerHandle>,
    pub(super) role_apps: BTreeSet<ServiceId>,
    pub(super) other_apps: BTreeSet<ServiceId>,
    pub(super) allowed_apps: BTreeSet<ServiceId>,
    pub(super) mode: Mode,
    pub(super) graph: Arc<DependencyGraph>,
}

impl OrchestratorState {
    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    pub fn graph(&self) -> &Arc<DependencyGraph> {
        &self.graph
    }

    pub fn role_apps(&self) -> &BTreeSet<ServiceId> {
        &self.role_apps
    }

    pub fn other_apps(&self) -> &BTreeSet<ServiceId> {
        &self.other_apps
    }

    pub fn allowed_apps(&self) -> &BTreeSet<ServiceId> {
        &self.allowed_apps
    }

    pub fn controlled(&self) -> impl Iterator<Item = &ServiceId> {
        self.controllers.keys()
    }

    /// Allowed set in protected mode: the dependency closure of the protected
    /// apps, restricted to services that have a controller.
    pub fn protected_allowed(&self, closure: BTreeSet<ServiceId>) -> BTreeSet<ServiceId> {
        closure
            .into_iter()
            .filter(|service| self.controllers.contains_key(service))
            .collect()
    }

    /// Allowed set in any other mode: its members plus every non-role app
    pub fn mode_allowed(&self, members: BTreeSet<ServiceId>) -> BTreeSet<ServiceId> {
        let mut allowed = members;
        allowed.extend(self.other_apps.iter().cloned());
        allowed
    }

    pub fn should_i_run(&self, service: &ServiceId) -> bool {
        self.allowed_apps.contains(service)
    }

    /// Allowed, and every start-after dependency is running somewhere or load-only.
    /// A service outside the allowed set is `NotAllowed` whatever its dependencies.
    pub fn ok_to_start(&self, registry: &RunningRegistry, service: &ServiceId) -> Admission {
        if !self.should_i_run(service) {
            return Admission::NotAllowed;
        }

        let blockers = self
            .graph
            .start_after(service)
            .filter(|dep| !registry.is_running_anywhere(dep) && !self.graph.is_load_only(dep))
            .map(|dep| Blocker::not_running(dep.clone()))
            .collect();

        Admission::from_blockers(blockers)
    }

    /// No other running service was ordered to start after `service`
    pub fn ok_to_stop(&self, registry: &RunningRegistry, service: &ServiceId) -> Admission {
        let blockers = self
            .graph
            .started_after_by(service)
            .filter(|dependent| *dependent != service && registry.is_running_anywhere(dependent))
            .map(|dependent| Blocker::still_running(dependent.clone()))
            .collect();

        Admission::from_blockers(blockers)
    }

    /// Every pair that is neither registered nor load-only, in request order
    pub fn check_dependencies(&self, registry: &RunningRegistry, deps: &[RunningEntry]) -> Admission {
        let blockers = deps
            .iter()
            .filter(|entry| !registry.contains(entry) && !self.graph.is_load_only(&entry.service))
            .map(|entry| Blocker::not_running(entry.service.clone()))
            .collect();

        Admission::from_blockers(blockers)
    }
}
