//! Application state shared by all handlers.

use mediarelay_core::RelayConfig;
use mediarelay_processing::Transcoder;
use mediarelay_services::{RecordSink, RelayPipeline};
use mediarelay_storage::{BlobStore, CredentialManager};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: RelayConfig,
    pub pipeline: Arc<RelayPipeline>,
    pub records: Arc<dyn RecordSink>,
    /// Same transcoder the pipeline runs; kept for the deep health check.
    pub transcoder: Arc<dyn Transcoder>,
    pub store: Arc<dyn BlobStore>,
    pub credentials: Arc<CredentialManager>,
}
