//! Per-service controller notifications.
//!
//! Every controller-bearing service gets its own bounded channel. The
//! orchestrator only ever uses `try_send` on it: a controller that is slow or
//! gone loses the notification instead of stalling the orchestrator.

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{info, warn};

use regent_protocol::{Mode, NodeId, ServiceId};

/// Notifications the orchestrator sends to service controllers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    /// The orchestrator on `node` switched to `mode`
    NewMode { mode: Mode, node: NodeId },
    /// `service` started on `node`
    AppRunning { service: ServiceId, node: NodeId },
    /// `service` stopped on `node`
    AppStopped { service: ServiceId, node: NodeId },
}

impl ControllerEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControllerEvent::NewMode { .. } => "new_mode",
            ControllerEvent::AppRunning { .. } => "app_running",
            ControllerEvent::AppStopped { .. } => "app_stopped",
        }
    }
}

/// Event message sent through controller channels
#[derive(Debug, Clone)]
pub struct ControllerMessage {
    pub event: ControllerEvent,
    /// When the orchestrator emitted the event
    pub timestamp: DateTime<Utc>,
}

impl ControllerMessage {
    pub fn new(event: ControllerEvent) -> Self {
        Self {
            event,
            timestamp: Utc::now(),
        }
    }
}

pub type ControllerSender = mpsc::Sender<ControllerMessage>;
pub type ControllerReceiver = mpsc::Receiver<ControllerMessage>;

/// Default channel capacity per controller
pub const CONTROLLER_CHANNEL_CAPACITY: usize = 100;

pub fn controller_channel(capacity: usize) -> (ControllerSender, ControllerReceiver) {
    mpsc::channel(capacity.max(1))
}

/// Result of a single best-effort delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// The controller's channel was full; the event was dropped
    Full,
    /// The controller is gone; the event was dropped
    Closed,
}

/// Orchestrator-side handle to one service's controller
#[derive(Debug, Clone)]
pub struct ControllerHandle {
    service: ServiceId,
    tx: ControllerSender,
}

impl ControllerHandle {
    pub fn new(service: ServiceId, tx: ControllerSender) -> Self {
        Self { service, tx }
    }

    /// The service this controller is responsible for
    pub fn service(&self) -> &ServiceId {
        &self.service
    }

    /// Deliver without waiting. Never blocks, never retries.
    pub fn deliver(&self, event: ControllerEvent) -> Delivery {
        match self.tx.try_send(ControllerMessage::new(event)) {
            Ok(()) => Delivery::Delivered,
            Err(TrySendError::Full(msg)) => {
                warn!(
                    "Controller for {} is backlogged, dropping {} event",
                    self.service,
                    msg.event.as_str()
                );
                Delivery::Full
            }
            Err(TrySendError::Closed(msg)) => {
                warn!(
                    "Controller for {} is closed, dropping {} event",
                    self.service,
                    msg.event.as_str()
                );
                Delivery::Closed
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Creates the controller for a managed service.
///
/// Called once per controller-bearing service while the orchestrator starts.
/// Implementations own whatever runs on the receiving end of the channel.
pub trait ControllerFactory: Send + Sync {
    fn spawn(&self, service: &ServiceId, capacity: usize) -> ControllerHandle;
}

/// Controller factory whose controllers only log what they are told.
///
/// Must be used from within a tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingControllerFactory;

impl ControllerFactory for LoggingControllerFactory {
    fn spawn(&self, service: &ServiceId, capacity: usize) -> ControllerHandle {
        let (tx, mut rx) = controller_channel(capacity);
        let name = service.clone();
        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                match msg.event {
                    ControllerEvent::NewMode { mode, node } => {
                        info!(service = %name, %mode, %node, "new mode");
                    }
                    ControllerEvent::AppRunning { service, node } => {
                        info!(service = %name, app = %service, %node, "app running");
                    }
                    ControllerEvent::AppStopped { service, node } => {
                        info!(service = %name, app = %service, %node, "app stopped");
                    }
                }
            }
        });
        ControllerHandle::new(service.clone(), tx)
    }
}
