pub mod errors;
pub mod ids;
pub mod protocol;

pub use ids::{Mode, NodeId, ServiceId};
