use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::ProtocolError;
use crate::ids::{Mode, NodeId, ServiceId};

/// A `(service, node)` pair: the service is known to be running on that node
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RunningEntry {
    pub service: ServiceId,
    pub node: NodeId,
}

impl RunningEntry {
    pub fn new(service: impl Into<ServiceId>, node: impl Into<NodeId>) -> Self {
        Self {
            service: service.into(),
            node: node.into(),
        }
    }
}

impl fmt::Display for RunningEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.service, self.node)
    }
}

/// Label on a dependency edge `A -> B`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    /// A may only start once B is running
    #[default]
    StartAfter,
    /// A needs B present but imposes no start ordering
    Uses,
}

impl DependencyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StartAfter => "start_after",
            Self::Uses => "uses",
        }
    }
}

/// Whether a service has an executable entry point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    #[default]
    Executable,
    /// Library-style service with nothing to run; always satisfies dependents
    LoadOnly,
}

/// Why a service blocks an admission request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    NotRunning,
    StillRunning,
}

impl BlockReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotRunning => "not_running",
            Self::StillRunning => "still_running",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blocker {
    pub service: ServiceId,
    pub reason: BlockReason,
}

impl Blocker {
    pub fn not_running(service: impl Into<ServiceId>) -> Self {
        Self {
            service: service.into(),
            reason: BlockReason::NotRunning,
        }
    }

    pub fn still_running(service: impl Into<ServiceId>) -> Self {
        Self {
            service: service.into(),
            reason: BlockReason::StillRunning,
        }
    }
}

/// Outcome of an admission check (`ok_to_start`, `ok_to_stop`, `check_dependencies`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Admission {
    Granted,
    /// The service is not in the allowed set of the current mode
    NotAllowed,
    /// The complete list of services standing in the way
    Blocked(Vec<Blocker>),
}

impl Admission {
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted)
    }

    /// Granted when `blockers` is empty
    pub fn from_blockers(blockers: Vec<Blocker>) -> Self {
        if blockers.is_empty() {
            Self::Granted
        } else {
            Self::Blocked(blockers)
        }
    }

    pub fn blockers(&self) -> &[Blocker] {
        match self {
            Self::Blocked(blockers) => blockers,
            _ => &[],
        }
    }
}

/// Serializable view of a dependency graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct GraphSnapshot {
    pub services: Vec<ServiceVertex>,
    pub edges: Vec<DependencyEdge>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceVertex {
    pub service: ServiceId,
    pub kind: ServiceKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub from: ServiceId,
    pub to: ServiceId,
    pub kind: DependencyKind,
}

/// Synchronous request to an orchestrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    SetMode { mode: Mode },
    ShouldIRun { service: ServiceId },
    OkToStart { service: ServiceId },
    OkToStop { service: ServiceId },
    CheckDependencies { deps: Vec<RunningEntry> },
    Graph,
    CurrentMode,
    AllowedApps,
    RunningServices,
    /// Any request kind this node does not understand
    #[serde(other)]
    Unknown,
}

/// Fire-and-forget lifecycle event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    Running { service: ServiceId, node: NodeId },
    Stopped { service: ServiceId, node: NodeId },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Response {
    Ok,
    Bool(bool),
    Admission(Admission),
    Graph(GraphSnapshot),
    Mode(Mode),
    Services(Vec<ServiceId>),
    Running(Vec<RunningEntry>),
    Error { message: String },
    UnknownRequest,
}

pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, ProtocolError> {
    serde_json::to_vec(message).map_err(ProtocolError::Encode)
}

pub fn decode_request(bytes: &[u8]) -> Result<Request, ProtocolError> {
    serde_json::from_slice(bytes).map_err(ProtocolError::Decode)
}

pub fn decode_notification(bytes: &[u8]) -> Result<Notification, ProtocolError> {
    serde_json::from_slice(bytes).map_err(ProtocolError::Decode)
}

pub fn decode_response(bytes: &[u8]) -> Result<Response, ProtocolError> {
    serde_json::from_slice(bytes).map_err(ProtocolError::Decode)
}
