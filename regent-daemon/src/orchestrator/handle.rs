//! OrchestratorHandle - handle for communicating with the Orchestrator
//!
//! Callers never touch orchestrator state directly; every operation is a
//! message on the actor's mailbox. Synchronous operations wait for the reply,
//! lifecycle events only wait for mailbox capacity.

use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use regent_protocol::protocol::{
    decode_notification, decode_request, Admission, Notification, Request, Response, RunningEntry,
};
use regent_protocol::{Mode, NodeId, ServiceId};

use crate::deps::DependencyGraph;

use super::command::OrchestratorCommand;
use super::error::OrchestratorError;

/// Handle for sending commands to the orchestrator.
/// This is cheap to clone (just clones the channel sender and node name).
#[derive(Clone, Debug)]
pub struct OrchestratorHandle {
    node: NodeId,
    tx: mpsc::Sender<OrchestratorCommand>,
}

impl OrchestratorHandle {
    pub(super) fn new(node: NodeId, tx: mpsc::Sender<OrchestratorCommand>) -> Self {
        Self { node, tx }
    }

    /// Node the orchestrator runs on
    pub fn node(&self) -> &NodeId {
        &self.node
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> OrchestratorCommand,
    ) -> Result<T, OrchestratorError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(make(reply_tx))
            .await
            .map_err(|_| OrchestratorError::ActorClosed)?;
        reply_rx.await.map_err(|_| OrchestratorError::ActorClosed)
    }

    // === Lifecycle events ===

    /// Report that `service` is running on `node`.
    ///
    /// Returns once the event is queued, without waiting for it to be
    /// processed. While the mailbox is full this waits for a free slot
    /// instead of dropping the event, so the registry never misses a
    /// transition.
    pub async fn running(&self, service: ServiceId, node: NodeId) {
        if self
            .tx
            .send(OrchestratorCommand::Running { service, node })
            .await
            .is_err()
        {
            warn!("Orchestrator closed, dropping running event");
        }
    }

    /// Report that `service` stopped on `node`. Queues like [`Self::running`].
    pub async fn stopped(&self, service: ServiceId, node: NodeId) {
        if self
            .tx
            .send(OrchestratorCommand::Stopped { service, node })
            .await
            .is_err()
        {
            warn!("Orchestrator closed, dropping stopped event");
        }
    }

    // === Mode ===

    pub async fn set_mode(&self, mode: Mode) -> Result<(), OrchestratorError> {
        self.request(|reply| OrchestratorCommand::SetMode { mode, reply })
            .await?
            .map_err(OrchestratorError::from)
    }

    // === Admission queries ===

    pub async fn should_i_run(&self, service: ServiceId) -> Result<bool, OrchestratorError> {
        self.request(|reply| OrchestratorCommand::ShouldIRun { service, reply })
            .await
    }

    pub async fn ok_to_start(&self, service: ServiceId) -> Result<Admission, OrchestratorError> {
        self.request(|reply| OrchestratorCommand::OkToStart { service, reply })
            .await
    }

    pub async fn ok_to_stop(&self, service: ServiceId) -> Result<Admission, OrchestratorError> {
        self.request(|reply| OrchestratorCommand::OkToStop { service, reply })
            .await
    }

    pub async fn check_dependencies(
        &self,
        deps: Vec<RunningEntry>,
    ) -> Result<Admission, OrchestratorError> {
        self.request(|reply| OrchestratorCommand::CheckDependencies { deps, reply })
            .await
    }

    // === Introspection ===

    pub async fn graph(&self) -> Result<Arc<DependencyGraph>, OrchestratorError> {
        self.request(|reply| OrchestratorCommand::Graph { reply }).await
    }

    pub async fn current_mode(&self) -> Result<Mode, OrchestratorError> {
        self.request(|reply| OrchestratorCommand::CurrentMode { reply })
            .await
    }

    pub async fn allowed_apps(&self) -> Result<BTreeSet<ServiceId>, OrchestratorError> {
        self.request(|reply| OrchestratorCommand::AllowedApps { reply })
            .await
    }

    pub async fn running_services(&self) -> Result<Vec<RunningEntry>, OrchestratorError> {
        self.request(|reply| OrchestratorCommand::RunningServices { reply })
            .await
    }

    /// Stop the orchestrator. Returns once the actor loop has exited.
    pub async fn shutdown(&self) {
        if self
            .request(|reply| OrchestratorCommand::Shutdown { reply })
            .await
            .is_err()
        {
            debug!("Orchestrator already stopped");
        }
    }

    // === Wire protocol ===

    /// Answer a decoded wire request
    pub async fn call(&self, request: Request) -> Response {
        let result = match request {
            Request::SetMode { mode } => self.set_mode(mode).await.map(|()| Response::Ok),
            Request::ShouldIRun { service } => self.should_i_run(service).await.map(Response::Bool),
            Request::OkToStart { service } => {
                self.ok_to_start(service).await.map(Response::Admission)
            }
            Request::OkToStop { service } => self.ok_to_stop(service).await.map(Response::Admission),
            Request::CheckDependencies { deps } => {
                self.check_dependencies(deps).await.map(Response::Admission)
            }
            Request::Graph => self.graph().await.map(|graph| Response::Graph(graph.snapshot())),
            Request::CurrentMode => self.current_mode().await.map(Response::Mode),
            Request::AllowedApps => self
                .allowed_apps()
                .await
                .map(|apps| Response::Services(apps.into_iter().collect())),
            Request::RunningServices => self.running_services().await.map(Response::Running),
            Request::Unknown => return Response::UnknownRequest,
        };

        result.unwrap_or_else(|e| Response::Error {
            message: e.to_string(),
        })
    }

    /// Answer an encoded wire request. Anything that does not decode to a
    /// known request gets [`Response::UnknownRequest`].
    pub async fn call_raw(&self, bytes: &[u8]) -> Response {
        match decode_request(bytes) {
            Ok(request) => self.call(request).await,
            Err(e) => {
                debug!("Undecodable request: {}", e);
                Response::UnknownRequest
            }
        }
    }

    /// Deliver a decoded wire notification
    pub async fn notify(&self, notification: Notification) {
        match notification {
            Notification::Running { service, node } => self.running(service, node).await,
            Notification::Stopped { service, node } => self.stopped(service, node).await,
            Notification::Unknown => debug!("Dropping unknown notification"),
        }
    }

    /// Deliver an encoded wire notification; unknown ones are dropped
    pub async fn notify_raw(&self, bytes: &[u8]) {
        match decode_notification(bytes) {
            Ok(notification) => self.notify(notification).await,
            Err(e) => debug!("Dropping undecodable notification: {}", e),
        }
    }
}
