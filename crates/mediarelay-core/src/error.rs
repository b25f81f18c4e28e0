//! Error types module
//!
//! Every stage of the relay reports failures through `RelayError`. Each variant
//! names the stage that failed and carries the underlying status/message so a
//! caller can diagnose the problem without retrying. Only authentication
//! failures against the blob store are retried, and that happens inside the
//! storage crate before a `RelayError` is ever produced.

use std::fmt;
use std::io;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like unsupported input
    Debug,
    /// Warning level - for failures of remote collaborators
    Warn,
    /// Error level - for environment or unexpected failures
    Error,
}

/// Pipeline stage a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Transcode,
    Credential,
    Upload,
    Submission,
    Persistence,
    Local,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Transcode => "transcode",
            Stage::Credential => "credential",
            Stage::Upload => "upload",
            Stage::Submission => "submission",
            Stage::Persistence => "persistence",
            Stage::Local => "local",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata for error responses - defines how an error should be presented
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "UNSUPPORTED_MEDIA")
    fn error_code(&self) -> &'static str;

    /// Whether re-running the whole request may succeed
    fn is_recoverable(&self) -> bool;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden in production
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Unsupported media type: {mimetype}")]
    UnsupportedMedia { mimetype: String },

    #[error("{tool} not available on this host: {message}")]
    ToolUnavailable { tool: String, message: String },

    #[error("Transcode failed: {0}")]
    Transcode(String),

    #[error("Credential renewal failed: {0}")]
    Renewal(String),

    #[error("Upload protocol error: {0}")]
    Protocol(String),

    #[error("Upload failed{}: {message}", status_suffix(.status))]
    Upload { status: Option<u16>, message: String },

    #[error("Submission failed{}: {message}", status_suffix(.status))]
    Submission { status: Option<u16>, message: String },

    #[error("Persistence failed: {0}")]
    Persistence(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for relay operations
pub type RelayResult<T> = Result<T, RelayError>;

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default()
}

impl RelayError {
    /// Stage that produced this error.
    pub fn stage(&self) -> Stage {
        match self {
            RelayError::UnsupportedMedia { .. }
            | RelayError::ToolUnavailable { .. }
            | RelayError::Transcode(_) => Stage::Transcode,
            RelayError::Renewal(_) => Stage::Credential,
            RelayError::Protocol(_) | RelayError::Upload { .. } => Stage::Upload,
            RelayError::Submission { .. } => Stage::Submission,
            RelayError::Persistence(_) => Stage::Persistence,
            RelayError::Io(_) | RelayError::Config(_) | RelayError::InvalidInput(_) => {
                Stage::Local
            }
        }
    }

    /// Variant name, used as `error_type` in logs and non-production responses.
    pub fn error_type(&self) -> &'static str {
        match self {
            RelayError::UnsupportedMedia { .. } => "UnsupportedMediaError",
            RelayError::ToolUnavailable { .. } => "ToolUnavailableError",
            RelayError::Transcode(_) => "TranscodeError",
            RelayError::Renewal(_) => "RenewalError",
            RelayError::Protocol(_) => "ProtocolError",
            RelayError::Upload { .. } => "UploadError",
            RelayError::Submission { .. } => "SubmissionError",
            RelayError::Persistence(_) => "PersistenceError",
            RelayError::Io(_) => "IoError",
            RelayError::Config(_) => "ConfigError",
            RelayError::InvalidInput(_) => "InvalidInputError",
        }
    }

    /// Full message prefixed with the failing stage.
    pub fn detailed_message(&self) -> String {
        format!("[{}] {}", self.stage(), self)
    }
}

/// Static metadata for each variant: (http_status, error_code, recoverable, sensitive, log_level).
fn relay_error_static_metadata(err: &RelayError) -> (u16, &'static str, bool, bool, LogLevel) {
    match err {
        RelayError::UnsupportedMedia { .. } => {
            (400, "UNSUPPORTED_MEDIA", false, false, LogLevel::Debug)
        }
        RelayError::ToolUnavailable { .. } => {
            (500, "TOOL_UNAVAILABLE", false, true, LogLevel::Error)
        }
        RelayError::Transcode(_) => (500, "TRANSCODE_FAILED", false, false, LogLevel::Error),
        RelayError::Renewal(_) => (502, "CREDENTIAL_RENEWAL_FAILED", false, true, LogLevel::Error),
        RelayError::Protocol(_) => (502, "UPLOAD_PROTOCOL_ERROR", true, false, LogLevel::Error),
        RelayError::Upload { .. } => (502, "UPLOAD_FAILED", true, false, LogLevel::Warn),
        RelayError::Submission { .. } => (502, "SUBMISSION_FAILED", true, false, LogLevel::Warn),
        RelayError::Persistence(_) => (502, "PERSISTENCE_FAILED", true, false, LogLevel::Warn),
        RelayError::Io(_) => (500, "IO_ERROR", true, true, LogLevel::Error),
        RelayError::Config(_) => (500, "CONFIG_ERROR", false, true, LogLevel::Error),
        RelayError::InvalidInput(_) => (400, "INVALID_INPUT", false, false, LogLevel::Debug),
    }
}

impl ErrorMetadata for RelayError {
    fn http_status_code(&self) -> u16 {
        relay_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        relay_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        relay_error_static_metadata(self).2
    }

    fn client_message(&self) -> String {
        match self {
            RelayError::UnsupportedMedia { mimetype } if mimetype.is_empty() => {
                "Unsupported file type: unknown".to_string()
            }
            RelayError::UnsupportedMedia { mimetype } => {
                format!("Unsupported file type: {}", mimetype)
            }
            RelayError::ToolUnavailable { tool, .. } => {
                format!("{} not found on the server", tool)
            }
            RelayError::Renewal(_) => "Blob store credentials could not be renewed".to_string(),
            RelayError::Io(_) => "Local storage failure".to_string(),
            RelayError::Config(_) => "Server misconfiguration".to_string(),
            RelayError::InvalidInput(message) => message.clone(),
            other => other.detailed_message(),
        }
    }

    fn is_sensitive(&self) -> bool {
        relay_error_static_metadata(self).3
    }

    fn log_level(&self) -> LogLevel {
        relay_error_static_metadata(self).4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_media_is_client_error() {
        let err = RelayError::UnsupportedMedia {
            mimetype: "application/pdf".to_string(),
        };
        assert_eq!(err.http_status_code(), 400);
        assert_eq!(err.stage(), Stage::Transcode);
        assert_eq!(err.client_message(), "Unsupported file type: application/pdf");
    }

    #[test]
    fn test_tool_unavailable_is_server_error() {
        let err = RelayError::ToolUnavailable {
            tool: "ffmpeg".to_string(),
            message: "No such file or directory".to_string(),
        };
        assert_eq!(err.http_status_code(), 500);
        assert!(err.is_sensitive());
    }

    #[test]
    fn test_status_is_reported_verbatim() {
        let err = RelayError::Submission {
            status: Some(422),
            message: "{\"detail\":\"bad url\"}".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Submission failed (HTTP 422): {\"detail\":\"bad url\"}"
        );
        assert_eq!(
            err.detailed_message(),
            "[submission] Submission failed (HTTP 422): {\"detail\":\"bad url\"}"
        );

        let err = RelayError::Upload {
            status: None,
            message: "connection reset".to_string(),
        };
        assert_eq!(err.to_string(), "Upload failed: connection reset");
    }

    #[test]
    fn test_stage_attribution() {
        assert_eq!(RelayError::Renewal("x".into()).stage(), Stage::Credential);
        assert_eq!(RelayError::Protocol("x".into()).stage(), Stage::Upload);
        assert_eq!(RelayError::Persistence("x".into()).stage(), Stage::Persistence);
        let io = RelayError::from(io::Error::new(io::ErrorKind::Other, "disk"));
        assert_eq!(io.stage(), Stage::Local);
    }
}
