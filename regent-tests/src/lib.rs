//! Test utilities for the regent workspace
//!
//! This crate provides topology builders, a recording controller factory and
//! an orchestrator harness for testing mode transitions, admission checks
//! and lifecycle fan-out without running the daemon binary.

pub mod helpers;

pub use helpers::harness::TestOrchestrator;
pub use helpers::recording_controller::RecordingControllerFactory;
pub use helpers::topology_builder::{TestServiceBuilder, TestTopologyBuilder};
pub use helpers::wait_utils::{wait_for_events, wait_for_mode, WaitError};
