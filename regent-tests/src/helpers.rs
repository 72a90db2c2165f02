pub mod harness;
pub mod recording_controller;
pub mod topology_builder;
pub mod wait_utils;
