//! Mediarelay Core Library
//!
//! This crate provides the domain models, error taxonomy, configuration, and
//! naming rules shared by every stage of the relay pipeline
//! (transcode → publish → submit).

pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod naming;

// Re-export commonly used types
pub use config::{BaseConfig, DropboxConfig, PersistenceConfig, RelayConfig, TranscriptionConfig};
pub use error::{ErrorMetadata, LogLevel, RelayError, RelayResult, Stage};
pub use models::{
    MediaAsset, MediaKind, ProcessRecord, SubmissionRecord, SubmissionRequest, TranscodeSpec,
};
