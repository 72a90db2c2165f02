//! Snapshot of services already running on the local node, used to seed the
//! running-service registry when the orchestrator starts.

use regent_protocol::ServiceId;

pub trait LocalInventory: Send + Sync {
    fn running_services(&self) -> Vec<ServiceId>;
}

/// Fixed inventory, e.g. from `already_running` in the daemon config
#[derive(Debug, Clone, Default)]
pub struct StaticInventory {
    services: Vec<ServiceId>,
}

impl StaticInventory {
    pub fn new(services: impl IntoIterator<Item = ServiceId>) -> Self {
        Self {
            services: services.into_iter().collect(),
        }
    }
}

impl LocalInventory for StaticInventory {
    fn running_services(&self) -> Vec<ServiceId> {
        self.services.clone()
    }
}
