//! Controller factory that records every notification for later inspection

use parking_lot::Mutex;
use regent_daemon::controller::{
    controller_channel, ControllerEvent, ControllerFactory, ControllerHandle, ControllerReceiver,
};
use regent_protocol::ServiceId;
use std::collections::BTreeMap;

/// Keeps the receiving end of every controller channel it hands out.
///
/// Nothing consumes the channels until a test drains them, so a channel
/// capacity smaller than the number of events makes the orchestrator drop
/// notifications, which is useful for testing best-effort delivery.
#[derive(Default)]
pub struct RecordingControllerFactory {
    receivers: Mutex<BTreeMap<ServiceId, ControllerReceiver>>,
}

impl RecordingControllerFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Services a controller was created for, in name order
    pub fn controlled(&self) -> Vec<ServiceId> {
        self.receivers.lock().keys().cloned().collect()
    }

    pub fn has_controller(&self, service: &str) -> bool {
        self.receivers.lock().contains_key(service)
    }

    /// Take every event queued for `service` so far.
    /// Returns an empty list for services without a controller.
    pub fn drain(&self, service: &str) -> Vec<ControllerEvent> {
        let mut receivers = self.receivers.lock();
        let Some(rx) = receivers.get_mut(service) else {
            return Vec::new();
        };

        let mut events = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            events.push(msg.event);
        }
        events
    }

    /// Drain every controller and return the events per service
    pub fn drain_all(&self) -> BTreeMap<ServiceId, Vec<ControllerEvent>> {
        let services = self.controlled();
        services
            .into_iter()
            .map(|service| {
                let events = self.drain(service.as_str());
                (service, events)
            })
            .collect()
    }

    /// Drop the receiver for `service`, as if its controller had died
    pub fn kill(&self, service: &str) {
        self.receivers.lock().remove(service);
    }
}

impl ControllerFactory for RecordingControllerFactory {
    fn spawn(&self, service: &ServiceId, capacity: usize) -> ControllerHandle {
        let (tx, rx) = controller_channel(capacity);
        self.receivers.lock().insert(service.clone(), rx);
        ControllerHandle::new(service.clone(), tx)
    }
}
