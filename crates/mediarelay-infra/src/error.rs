//! HTTP error response body
//!
//! `IntoResponse` for relay errors lives in the API crate; this crate only
//! owns the serialized shape.

use serde::Serialize;

/// Standard error response format for HTTP APIs
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Pipeline stage that failed, when the error came from a relay run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    /// Machine-readable error code for programmatic handling
    pub code: String,
    /// Whether re-submitting the same request may succeed
    pub recoverable: bool,
}
