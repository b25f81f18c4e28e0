//! Mediarelay Services Layer
//!
//! Hosts the relay orchestration (transcode → publish → submit) and the
//! clients for the two downstream collaborators: the transcription provider
//! and the persistence endpoint. Re-exports the processing and storage types
//! the API crate needs so that it depends on a single service facade.

pub mod persistence;
pub mod relay;
pub mod transcription;

pub use persistence::{LoggingRecordSink, PostgrestRecordSink, RecordSink};
pub use relay::RelayPipeline;
pub use transcription::{TranscriptionProvider, TranskriptorClient};

pub use mediarelay_processing::{FfmpegTranscoder, TranscodeError, Transcoder};
pub use mediarelay_storage::{
    BlobStore, CredentialManager, DropboxClient, OAuthRenewer, PublishedArtifact, Publisher,
    UploadLimits,
};
