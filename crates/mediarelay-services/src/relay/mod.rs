//! Relay orchestration

pub mod orchestrator;

pub use orchestrator::RelayPipeline;
