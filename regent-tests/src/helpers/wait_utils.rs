//! Async utilities to wait for orchestrator state

use crate::helpers::recording_controller::RecordingControllerFactory;
use regent_daemon::controller::ControllerEvent;
use regent_daemon::OrchestratorHandle;
use regent_protocol::Mode;
use std::time::Duration;
use tokio::time::{sleep, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Error type for wait operations
#[derive(Debug)]
pub enum WaitError {
    Timeout,
    OrchestratorClosed,
}

impl std::fmt::Display for WaitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WaitError::Timeout => write!(f, "Wait operation timed out"),
            WaitError::OrchestratorClosed => write!(f, "Orchestrator is not running"),
        }
    }
}

impl std::error::Error for WaitError {}

/// Wait until the orchestrator reports `mode` as current
pub async fn wait_for_mode(
    handle: &OrchestratorHandle,
    mode: &str,
    timeout: Duration,
) -> Result<(), WaitError> {
    let expected = Mode::from(mode);
    let deadline = Instant::now() + timeout;

    loop {
        let current = handle
            .current_mode()
            .await
            .map_err(|_| WaitError::OrchestratorClosed)?;
        if current == expected {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(WaitError::Timeout);
        }
        sleep(POLL_INTERVAL).await;
    }
}

/// Collect events for `service` until at least `count` have arrived
pub async fn wait_for_events(
    controllers: &RecordingControllerFactory,
    service: &str,
    count: usize,
    timeout: Duration,
) -> Result<Vec<ControllerEvent>, WaitError> {
    let deadline = Instant::now() + timeout;
    let mut events = Vec::new();

    loop {
        events.extend(controllers.drain(service));
        if events.len() >= count {
            return Ok(events);
        }
        if Instant::now() >= deadline {
            return Err(WaitError::Timeout);
        }
        sleep(POLL_INTERVAL).await;
    }
}
