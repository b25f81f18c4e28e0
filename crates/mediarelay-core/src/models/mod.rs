//! Domain models for the relay pipeline.

pub mod media;
pub mod submission;
pub mod transcode;

pub use media::{MediaAsset, MediaKind};
pub use submission::{ProcessRecord, SubmissionRecord, SubmissionRequest};
pub use transcode::TranscodeSpec;
