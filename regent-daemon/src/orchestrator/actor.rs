//! Orchestrator - the per-node actor implementation

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use regent_protocol::{Mode, NodeId, ServiceId};

use crate::config::RemoteEventPolicy;
use crate::controller::{ControllerEvent, Delivery};
use crate::model::{Dependencies, DependencyModel};
use crate::registry::RunningRegistry;
use crate::store::ConfigStore;

use super::command::OrchestratorCommand;
use super::error::{ModeError, OrchestratorError};
use super::handle::OrchestratorHandle;
use super::state::OrchestratorState;
use super::{Collaborators, OrchestratorConfig};

pub struct Orchestrator {
    config: OrchestratorConfig,
    state: OrchestratorState,
    registry: RunningRegistry,
    model: Arc<dyn DependencyModel>,
    store: Arc<dyn ConfigStore>,
    rx: mpsc::Receiver<OrchestratorCommand>,
}

impl Orchestrator {
    /// Validate the dependency configuration, start controllers and enter
    /// protected mode.
    ///
    /// Fails without starting anything if a role app depends on a service
    /// that is not a role app. Controllers are created through the injected
    /// factory, so this must run inside a tokio runtime when the factory
    /// spawns tasks.
    pub fn create(
        config: OrchestratorConfig,
        collaborators: Collaborators,
    ) -> Result<(OrchestratorHandle, Self), OrchestratorError> {
        let Collaborators {
            model,
            store,
            inventory,
            controllers: factory,
        } = collaborators;

        let registry = RunningRegistry::seeded(&config.node, inventory.running_services());

        let Dependencies { graph, annotated } = model.dependencies()?;
        let role_apps = model.role_apps()?;

        let foundational: BTreeSet<&ServiceId> = annotated
            .iter()
            .filter(|dep| dep.foundational)
            .map(|dep| &dep.service)
            .chain(config.foundational_services.iter())
            .collect();

        let orphaned: BTreeSet<ServiceId> = model
            .dependency_closure(&graph, &role_apps)
            .into_iter()
            .filter(|service| !role_apps.contains(service) && !foundational.contains(service))
            .collect();
        if !orphaned.is_empty() {
            let err = OrchestratorError::OrphanedDependencies { orphans: orphaned };
            error!("Refusing to start: {}", err);
            return Err(err);
        }

        let controllers: BTreeMap<_, _> = annotated
            .iter()
            .filter(|dep| dep.node == config.node && !foundational.contains(&dep.service))
            .map(|dep| {
                let handle = factory.spawn(&dep.service, config.controller_channel_capacity);
                (dep.service.clone(), handle)
            })
            .collect();

        let other_apps: BTreeSet<ServiceId> = controllers
            .keys()
            .filter(|service| !role_apps.contains(*service))
            .cloned()
            .collect();

        let mut state = OrchestratorState {
            controllers,
            role_apps,
            other_apps,
            allowed_apps: BTreeSet::new(),
            mode: Mode::protected(),
            graph,
        };
        let protected_apps = store.protected_mode_apps()?;
        state.allowed_apps =
            state.protected_allowed(model.dependency_closure(&state.graph, &protected_apps));
        store.set_current_mode(&state.mode)?;

        info!(
            node = %config.node,
            controllers = state.controllers.len(),
            role_apps = state.role_apps.len(),
            other_apps = state.other_apps.len(),
            allowed = state.allowed_apps.len(),
            running = registry.len(),
            "Orchestrator started in protected mode"
        );

        let (tx, rx) = mpsc::channel(config.mailbox_capacity.max(1));
        let handle = OrchestratorHandle::new(config.node.clone(), tx);

        let orchestrator = Self {
            config,
            state,
            registry,
            model,
            store,
            rx,
        };

        Ok((handle, orchestrator))
    }

    /// Create the orchestrator and spawn its command loop
    pub fn spawn(
        config: OrchestratorConfig,
        collaborators: Collaborators,
    ) -> Result<OrchestratorHandle, OrchestratorError> {
        let (handle, orchestrator) = Self::create(config, collaborators)?;
        tokio::spawn(orchestrator.run());
        Ok(handle)
    }

    pub fn state(&self) -> &OrchestratorState {
        &self.state
    }

    pub fn registry(&self) -> &RunningRegistry {
        &self.registry
    }

    /// Process commands until shutdown or until every handle is dropped
    pub async fn run(mut self) {
        debug!("Orchestrator on {} processing commands", self.config.node);

        while let Some(cmd) = self.rx.recv().await {
            if let OrchestratorCommand::Shutdown { reply } = cmd {
                info!("Orchestrator on {} shutting down", self.config.node);
                let _ = reply.send(());
                return;
            }
            self.process_command(cmd);
        }

        debug!("All orchestrator handles dropped, stopping");
    }

    fn process_command(&mut self, cmd: OrchestratorCommand) {
        match cmd {
            OrchestratorCommand::Running { service, node } => {
                self.handle_running(service, node);
            }
            OrchestratorCommand::Stopped { service, node } => {
                self.handle_stopped(service, node);
            }
            OrchestratorCommand::SetMode { mode, reply } => {
                let _ = reply.send(self.set_mode(mode));
            }
            OrchestratorCommand::ShouldIRun { service, reply } => {
                let _ = reply.send(self.state.should_i_run(&service));
            }
            OrchestratorCommand::OkToStart { service, reply } => {
                let admission = self.state.ok_to_start(&self.registry, &service);
                debug!("ok_to_start({}) -> {:?}", service, admission);
                let _ = reply.send(admission);
            }
            OrchestratorCommand::OkToStop { service, reply } => {
                let admission = self.state.ok_to_stop(&self.registry, &service);
                debug!("ok_to_stop({}) -> {:?}", service, admission);
                let _ = reply.send(admission);
            }
            OrchestratorCommand::CheckDependencies { deps, reply } => {
                let _ = reply.send(self.state.check_dependencies(&self.registry, &deps));
            }
            OrchestratorCommand::Graph { reply } => {
                let _ = reply.send(Arc::clone(&self.state.graph));
            }
            OrchestratorCommand::CurrentMode { reply } => {
                let _ = reply.send(self.state.mode.clone());
            }
            OrchestratorCommand::AllowedApps { reply } => {
                let _ = reply.send(self.state.allowed_apps.clone());
            }
            OrchestratorCommand::RunningServices { reply } => {
                let _ = reply.send(self.registry.entries().cloned().collect());
            }
            OrchestratorCommand::Shutdown { reply } => {
                // Handled by the run loop
                let _ = reply.send(());
            }
        }
    }

    fn accepts_event_from(&self, node: &NodeId) -> bool {
        *node == self.config.node || self.config.remote_events == RemoteEventPolicy::Accept
    }

    fn handle_running(&mut self, service: ServiceId, node: NodeId) {
        if !self.accepts_event_from(&node) {
            debug!("Ignoring running event for {} from remote node {}", service, node);
            return;
        }

        if self.registry.insert(service.clone(), node.clone()) {
            debug!("{} is running on {}", service, node);
        }

        self.broadcast(
            ControllerEvent::AppRunning {
                service: service.clone(),
                node: node.clone(),
            },
            Some(&service),
        );

        if self.state.mode.is_protected()
            && service == self.config.bootstrap_service
            && node == self.config.node
        {
            self.unlock(&service);
        }
    }

    fn handle_stopped(&mut self, service: ServiceId, node: NodeId) {
        if !self.accepts_event_from(&node) {
            debug!("Ignoring stopped event for {} from remote node {}", service, node);
            return;
        }

        if self.registry.remove(&service, &node) {
            debug!("{} stopped on {}", service, node);
        }

        self.broadcast(
            ControllerEvent::AppStopped {
                service: service.clone(),
                node,
            },
            Some(&service),
        );
    }

    /// Leave protected mode for the configured default once the bootstrap
    /// service itself is confirmed running.
    fn unlock(&mut self, bootstrap: &ServiceId) {
        let default_mode = match self.store.default_mode() {
            Ok(mode) => mode,
            Err(e) => {
                error!("Cannot read default mode, staying in protected mode: {}", e);
                return;
            }
        };

        info!("{} is running, unlocking into mode {}", bootstrap, default_mode);
        if let Err(e) = self.transition(default_mode, Some(bootstrap)) {
            error!("Failed to leave protected mode: {}", e);
        }
    }

    fn set_mode(&mut self, mode: Mode) -> Result<(), ModeError> {
        self.transition(mode, None)
    }

    /// Switch to `mode`, persist it and tell every controller except `except`.
    /// On error nothing changes.
    fn transition(&mut self, mode: Mode, except: Option<&ServiceId>) -> Result<(), ModeError> {
        if mode == self.state.mode {
            return Ok(());
        }

        if !mode.is_protected() && !self.model.valid_mode(&mode) {
            warn!("Rejecting switch to unknown mode {}", mode);
            return Err(ModeError::UnknownMode(mode));
        }

        let allowed = if mode.is_protected() {
            let protected_apps = self.store.protected_mode_apps()?;
            self.state
                .protected_allowed(self.model.dependency_closure(&self.state.graph, &protected_apps))
        } else {
            self.state.mode_allowed(self.model.apps_in_mode(&mode))
        };

        self.store.set_current_mode(&mode)?;

        let previous = std::mem::replace(&mut self.state.mode, mode.clone());
        self.state.allowed_apps = allowed;
        info!(
            "Mode changed from {} to {} ({} services allowed)",
            previous,
            mode,
            self.state.allowed_apps.len()
        );

        self.broadcast(
            ControllerEvent::NewMode {
                mode,
                node: self.config.node.clone(),
            },
            except,
        );

        Ok(())
    }

    /// Best-effort delivery to every controller except the one for `except`
    fn broadcast(&self, event: ControllerEvent, except: Option<&ServiceId>) {
        let mut dropped = 0usize;
        for (service, controller) in &self.state.controllers {
            if Some(service) == except {
                continue;
            }
            if controller.deliver(event.clone()) != Delivery::Delivered {
                dropped += 1;
            }
        }
        if dropped > 0 {
            debug!("{} event not delivered to {} controllers", event.as_str(), dropped);
        }
    }
}
