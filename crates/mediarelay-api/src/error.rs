//! HTTP error response conversion
//!
//! Handlers return `Result<_, HttpRelayError>`; any [`RelayError`] converts
//! with `?` and renders as an [`ErrorResponse`] with the status taken from
//! [`ErrorMetadata`]. The detailed body is rendered by default; in production
//! [`hide_error_details`] swaps in the redacted one.

use axum::{
    extract::{multipart::MultipartRejection, rejection::QueryRejection, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use mediarelay_core::{ErrorMetadata, LogLevel, RelayError};
use mediarelay_infra::ErrorResponse;

/// Wrapper type for RelayError to implement IntoResponse
/// (orphan rules: both the trait and the error type are foreign here)
#[derive(Debug)]
pub struct HttpRelayError(pub RelayError);

impl From<RelayError> for HttpRelayError {
    fn from(err: RelayError) -> Self {
        HttpRelayError(err)
    }
}

impl From<QueryRejection> for HttpRelayError {
    fn from(rejection: QueryRejection) -> Self {
        HttpRelayError(RelayError::InvalidInput(format!(
            "Invalid query parameters: {}",
            rejection.body_text()
        )))
    }
}

impl From<MultipartRejection> for HttpRelayError {
    fn from(rejection: MultipartRejection) -> Self {
        HttpRelayError(RelayError::InvalidInput(format!(
            "Invalid multipart body: {}",
            rejection.body_text()
        )))
    }
}

fn log_error(error: &RelayError) {
    let error_type = error.error_type();
    let stage = error.stage().as_str();
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %error, error_type, stage, "Request failed");
        }
        LogLevel::Warn => {
            tracing::warn!(error = %error, error_type, stage, "Request failed");
        }
        LogLevel::Error => {
            tracing::error!(error = %error, error_type, stage, "Request failed");
        }
    }
}

/// Redacted rendering carried on every error response.
#[derive(Clone, Debug)]
struct RedactedBody(ErrorResponse);

/// Replace error bodies with their redacted form when `hide_details` is set.
pub async fn hide_error_details(
    State(hide_details): State<bool>,
    request: Request,
    next: Next,
) -> Response {
    let response = next.run(request).await;
    if !hide_details {
        return response;
    }
    match response.extensions().get::<RedactedBody>().cloned() {
        Some(RedactedBody(body)) => (response.status(), Json(body)).into_response(),
        None => response,
    }
}

impl HttpRelayError {
    fn body(&self, hide_details: bool) -> ErrorResponse {
        let err = &self.0;
        let expose = !hide_details && !err.is_sensitive();
        ErrorResponse {
            error: err.client_message(),
            stage: Some(err.stage().as_str().to_string()),
            details: expose.then(|| err.detailed_message()),
            error_type: expose.then(|| err.error_type().to_string()),
            code: err.error_code().to_string(),
            recoverable: err.is_recoverable(),
        }
    }
}

impl IntoResponse for HttpRelayError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.http_status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        log_error(&self.0);

        let mut response = (status, Json(self.body(false))).into_response();
        response
            .extensions_mut()
            .insert(RedactedBody(self.body(true)));
        response
    }
}
