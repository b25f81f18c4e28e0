//! Blob store abstraction trait
//!
//! One method per remote call. Implementations take the access token as an
//! argument and never renew it themselves; renewal is the caller's concern
//! (see [`crate::retry`]).

use async_trait::async_trait;
use bytes::Bytes;
use mediarelay_core::RelayError;
use thiserror::Error;

/// Outcome of a single blob store call
#[derive(Debug, Error)]
pub enum BlobStoreError {
    /// The access token was rejected. The only variant that triggers renewal.
    #[error("Authentication rejected: {0}")]
    Unauthorized(String),

    #[error("Shared link already exists for {0}")]
    SharedLinkAlreadyExists(String),

    /// The remote side disagrees with the session offset we sent.
    #[error("Incorrect session offset {sent} (remote expects {expected:?})")]
    IncorrectOffset { sent: u64, expected: Option<u64> },

    #[error("Blob store returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl BlobStoreError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, BlobStoreError::Unauthorized(_))
    }
}

/// Result type for blob store calls
pub type BlobStoreResult<T> = Result<T, BlobStoreError>;

/// Map a terminal blob store failure for `operation` onto the relay taxonomy.
pub fn into_relay_error(operation: &str, err: BlobStoreError) -> RelayError {
    match err {
        BlobStoreError::Unauthorized(body) => RelayError::Upload {
            status: Some(401),
            message: format!("{}: authentication rejected after renewal: {}", operation, body),
        },
        BlobStoreError::IncorrectOffset { .. } | BlobStoreError::Malformed(_) => {
            RelayError::Protocol(format!("{}: {}", operation, err))
        }
        BlobStoreError::Status { status, body } => RelayError::Upload {
            status: Some(status),
            message: format!("{}: {}", operation, body),
        },
        BlobStoreError::SharedLinkAlreadyExists(_) | BlobStoreError::Transport(_) => {
            RelayError::Upload {
                status: None,
                message: format!("{}: {}", operation, err),
            }
        }
        BlobStoreError::IoError(e) => RelayError::Io(e),
    }
}

/// Remote blob store addressed by absolute paths (`/dir/file.mp3`).
///
/// Writes always use overwrite semantics: no autorename, no conflict
/// detection, no notification.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Upload the whole content in one request
    async fn upload(&self, token: &str, path: &str, data: Bytes) -> BlobStoreResult<()>;

    /// Open an upload session with its first chunk and return the session id
    async fn start_session(&self, token: &str, first_chunk: Bytes) -> BlobStoreResult<String>;

    /// Append `chunk` at `offset`, which must equal the bytes received so far
    async fn append(
        &self,
        token: &str,
        session_id: &str,
        offset: u64,
        chunk: Bytes,
    ) -> BlobStoreResult<()>;

    /// Commit the session at `offset` (the total size) to `path`
    async fn finish(
        &self,
        token: &str,
        session_id: &str,
        offset: u64,
        path: &str,
    ) -> BlobStoreResult<()>;

    /// Create a public link. Fails with
    /// [`BlobStoreError::SharedLinkAlreadyExists`] when one is already there.
    async fn create_shared_link(&self, token: &str, path: &str) -> BlobStoreResult<String>;

    /// Existing public links for exactly `path`
    async fn list_shared_links(&self, token: &str, path: &str) -> BlobStoreResult<Vec<String>>;

    /// Cheap authenticated call used as a liveness probe for a token
    async fn current_account(&self, token: &str) -> BlobStoreResult<()>;
}
