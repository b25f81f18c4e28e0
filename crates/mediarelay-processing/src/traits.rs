//! Transcoder abstraction
//!
//! The relay orchestrator depends on this trait rather than on ffmpeg directly
//! so that it can be exercised without a media toolchain on the host.

use async_trait::async_trait;
use mediarelay_core::{RelayError, TranscodeSpec};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Transcode operation errors
#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("Unsupported media type: {0}")]
    UnsupportedMedia(String),

    #[error("{tool} is not available: {message}")]
    ToolUnavailable { tool: String, message: String },

    #[error("ffmpeg exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("ffmpeg timed out after {0} seconds")]
    TimedOut(u64),

    #[error("Invalid tool path: {0}")]
    InvalidToolPath(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<TranscodeError> for RelayError {
    fn from(err: TranscodeError) -> Self {
        match err {
            TranscodeError::UnsupportedMedia(mimetype) => RelayError::UnsupportedMedia { mimetype },
            TranscodeError::ToolUnavailable { tool, message } => {
                RelayError::ToolUnavailable { tool, message }
            }
            TranscodeError::InvalidToolPath(path) => RelayError::ToolUnavailable {
                tool: path,
                message: "invalid executable path".to_string(),
            },
            TranscodeError::IoError(e) => RelayError::Io(e),
            other => RelayError::Transcode(other.to_string()),
        }
    }
}

/// Converts an input media file into a constant-bitrate MP3.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Transcode `input` and return the path of a new MP3 file.
    ///
    /// The input is never modified. Mimetypes that are neither `audio/*` nor
    /// `video/*` fail with [`TranscodeError::UnsupportedMedia`] before any
    /// external process is started.
    async fn transcode(
        &self,
        input: &Path,
        declared_mimetype: &str,
        spec: TranscodeSpec,
    ) -> Result<PathBuf, TranscodeError>;

    /// Check that the external tool can be started.
    async fn probe(&self) -> Result<(), TranscodeError>;
}
