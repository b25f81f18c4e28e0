//! Upload session protocol
//!
//! Publishes a local file to the blob store and returns a public link for it.
//! Files up to [`UploadLimits::single_upload_max`] go up in one request;
//! anything larger goes through a start/append/finish session in
//! [`UploadLimits::chunk_size`] chunks.

use crate::credential::CredentialManager;
use crate::retry::with_auth_retry;
use crate::session::UploadSession;
use crate::traits::{BlobStore, BlobStoreError};
use bytes::Bytes;
use mediarelay_core::constants::{SINGLE_UPLOAD_LIMIT_BYTES, UPLOAD_CHUNK_SIZE};
use mediarelay_core::{RelayError, RelayResult};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadLimits {
    /// Largest file sent with a single upload call (inclusive)
    pub single_upload_max: u64,
    pub chunk_size: usize,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            single_upload_max: SINGLE_UPLOAD_LIMIT_BYTES,
            chunk_size: UPLOAD_CHUNK_SIZE,
        }
    }
}

/// Result of a successful publish
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishedArtifact {
    pub path: String,
    pub shared_url: String,
    pub direct_url: String,
    pub size_bytes: u64,
}

pub struct Publisher {
    store: Arc<dyn BlobStore>,
    credentials: Arc<CredentialManager>,
    limits: UploadLimits,
}

impl Publisher {
    pub fn new(store: Arc<dyn BlobStore>, credentials: Arc<CredentialManager>) -> Self {
        Self {
            store,
            credentials,
            limits: UploadLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: UploadLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Upload `local_path` to `destination_path` (overwriting) and return its
    /// public link.
    #[tracing::instrument(skip(self), fields(size_bytes = tracing::field::Empty))]
    pub async fn publish(
        &self,
        local_path: &Path,
        destination_path: &str,
    ) -> RelayResult<PublishedArtifact> {
        let started = Instant::now();
        let size_bytes = tokio::fs::metadata(local_path).await?.len();
        tracing::Span::current().record("size_bytes", size_bytes);

        if size_bytes <= self.limits.single_upload_max {
            tracing::info!(path = "single", "Upload path chosen");
            self.upload_single(local_path, destination_path).await?;
        } else {
            tracing::info!(
                path = "session",
                chunk_size = self.limits.chunk_size,
                "Upload path chosen"
            );
            self.upload_session(local_path, destination_path, size_bytes)
                .await?;
        }

        let shared_url = self.shared_link(destination_path).await?;
        let direct_url = to_direct_download(&shared_url);

        tracing::info!(
            destination = %destination_path,
            duration_ms = started.elapsed().as_millis() as u64,
            "Artifact published"
        );

        Ok(PublishedArtifact {
            path: destination_path.to_string(),
            shared_url,
            direct_url,
            size_bytes,
        })
    }

    async fn upload_single(&self, local_path: &Path, destination_path: &str) -> RelayResult<()> {
        let data = Bytes::from(tokio::fs::read(local_path).await?);
        let store = &self.store;

        with_auth_retry(&self.credentials, "files/upload", |token| {
            let data = data.clone();
            async move { store.upload(&token, destination_path, data).await }
        })
        .await
    }

    async fn upload_session(
        &self,
        local_path: &Path,
        destination_path: &str,
        size_bytes: u64,
    ) -> RelayResult<()> {
        let store = &self.store;
        let mut file = File::open(local_path).await?;
        let mut session = UploadSession::new(destination_path);

        let first = read_chunk(&mut file, self.limits.chunk_size).await?;
        let first_len = first.len() as u64;
        let session_id = with_auth_retry(&self.credentials, "upload_session/start", |token| {
            let chunk = first.clone();
            async move { store.start_session(&token, chunk).await }
        })
        .await?;
        session.start(session_id, first_len)?;
        tracing::debug!(offset = first_len, "Upload session started");

        loop {
            let (session_id, offset) = session.cursor()?;
            if offset >= size_bytes {
                break;
            }

            let chunk = read_chunk(&mut file, self.limits.chunk_size).await?;
            if chunk.is_empty() {
                return Err(RelayError::Protocol(format!(
                    "{} ended at offset {} before its reported size {}",
                    local_path.display(),
                    offset,
                    size_bytes
                )));
            }
            let chunk_len = chunk.len() as u64;

            with_auth_retry(&self.credentials, "upload_session/append_v2", |token| {
                let chunk = chunk.clone();
                async move { store.append(&token, session_id, offset, chunk).await }
            })
            .await?;

            let offset = session.advance(chunk_len)?;
            tracing::debug!(offset, total = size_bytes, "Session chunk appended");
        }

        let (session_id, offset) = session.cursor()?;
        if offset != size_bytes {
            return Err(RelayError::Protocol(format!(
                "session offset {} overshoots file size {}",
                offset, size_bytes
            )));
        }

        with_auth_retry(&self.credentials, "upload_session/finish", |token| async move {
            store
                .finish(&token, session_id, offset, destination_path)
                .await
        })
        .await?;
        session.finish(size_bytes)?;

        Ok(())
    }

    /// Create a public link, or reuse the existing one for this path.
    async fn shared_link(&self, destination_path: &str) -> RelayResult<String> {
        let store = &self.store;

        let created = with_auth_retry(
            &self.credentials,
            "sharing/create_shared_link_with_settings",
            |token| async move {
                match store.create_shared_link(&token, destination_path).await {
                    Ok(url) => Ok(Some(url)),
                    Err(BlobStoreError::SharedLinkAlreadyExists(_)) => Ok(None),
                    Err(e) => Err(e),
                }
            },
        )
        .await?;

        if let Some(url) = created {
            tracing::debug!(destination = %destination_path, "Shared link created");
            return Ok(url);
        }

        let links = with_auth_retry(&self.credentials, "sharing/list_shared_links", |token| async move {
            store.list_shared_links(&token, destination_path).await
        })
        .await?;

        links.into_iter().next().ok_or_else(|| RelayError::Upload {
            status: None,
            message: format!(
                "shared link reported as existing but none listed for {}",
                destination_path
            ),
        })
    }
}

/// Read up to `chunk_size` bytes, short only at end of file.
async fn read_chunk(file: &mut File, chunk_size: usize) -> std::io::Result<Bytes> {
    let mut buffer = vec![0u8; chunk_size];
    let mut filled = 0;
    while filled < chunk_size {
        let n = file.read(&mut buffer[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    buffer.truncate(filled);
    Ok(Bytes::from(buffer))
}

/// Turn a Dropbox share link into a direct-download link (`dl=1`).
/// Non-Dropbox URLs are returned unchanged.
pub fn to_direct_download(url: &str) -> String {
    if url.contains("dl=0") {
        return url.replace("dl=0", "dl=1");
    }
    if url.contains("dl=1") || !url.contains("dropbox.com") {
        return url.to_string();
    }
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{}{}dl=1", url, separator)
}
