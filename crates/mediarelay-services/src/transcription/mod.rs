//! Transcription provider submission
//!
//! The provider accepts a public media URL plus caller metadata and answers
//! with an opaque order id. Transcripts arrive later through the callback URL,
//! outside this service.

use async_trait::async_trait;
use mediarelay_core::{RelayError, RelayResult, SubmissionRequest, TranscriptionConfig};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::time::Duration;

#[async_trait]
pub trait TranscriptionProvider: Send + Sync {
    /// Submit `public_url` and return the provider's order id.
    async fn submit(&self, public_url: &str, request: &SubmissionRequest) -> RelayResult<String>;
}

#[derive(Serialize)]
struct SubmissionBody<'a> {
    url: &'a str,
    language: &'a str,
    service: &'a str,
    callback_url: &'a str,
    reference: &'a str,
}

pub struct TranskriptorClient {
    http_client: Client,
    api_url: String,
    api_key: String,
}

impl Debug for TranskriptorClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("TranskriptorClient")
            .field("api_url", &self.api_url)
            .finish()
    }
}

impl TranskriptorClient {
    pub fn new(api_url: String, api_key: String, timeout: Duration) -> RelayResult<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            api_url,
            api_key,
        })
    }

    pub fn from_config(config: &TranscriptionConfig, timeout: Duration) -> RelayResult<Self> {
        Self::new(config.api_url.clone(), config.api_key.clone(), timeout)
    }
}

fn extract_order_id(body: &Value) -> Option<String> {
    match body.get("order_id")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[async_trait]
impl TranscriptionProvider for TranskriptorClient {
    #[tracing::instrument(skip(self, request), fields(reference = %request.reference))]
    async fn submit(&self, public_url: &str, request: &SubmissionRequest) -> RelayResult<String> {
        let body = SubmissionBody {
            url: public_url,
            language: &request.language,
            service: &request.service,
            callback_url: &request.callback_url,
            reference: &request.reference,
        };

        let response = self
            .http_client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .header("accept", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| RelayError::Submission {
                status: None,
                message: e.to_string(),
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        if status.is_client_error() || status.is_server_error() {
            return Err(RelayError::Submission {
                status: Some(status.as_u16()),
                message: text,
            });
        }

        let parsed: Value = serde_json::from_str(&text).map_err(|_| RelayError::Submission {
            status: Some(status.as_u16()),
            message: format!("Unexpected response: {}", text),
        })?;

        let order_id = extract_order_id(&parsed).ok_or_else(|| RelayError::Submission {
            status: Some(status.as_u16()),
            message: format!("Unexpected response: {}", text),
        })?;

        tracing::info!(order_id = %order_id, "Submission accepted");
        Ok(order_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn request() -> SubmissionRequest {
        SubmissionRequest {
            language: "pt-BR".to_string(),
            service: "Standard".to_string(),
            callback_url: "https://hooks.example.com/done".to_string(),
            reference: "dropbox-1a2b3c4d".to_string(),
        }
    }

    fn client(server: &mockito::ServerGuard) -> TranskriptorClient {
        TranskriptorClient::new(
            format!("{}/developer/transcription/url", server.url()),
            "tk-key".to_string(),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_submit_sends_url_and_metadata() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/developer/transcription/url")
            .match_header("authorization", "Bearer tk-key")
            .match_body(Matcher::Json(json!({
                "url": "https://www.dropbox.com/s/abc/a.mp3?dl=0",
                "language": "pt-BR",
                "service": "Standard",
                "callback_url": "https://hooks.example.com/done",
                "reference": "dropbox-1a2b3c4d"
            })))
            .with_status(200)
            .with_body(r#"{"order_id":"ord-42","message":"queued"}"#)
            .create_async()
            .await;

        let order_id = client(&server)
            .submit("https://www.dropbox.com/s/abc/a.mp3?dl=0", &request())
            .await
            .unwrap();

        assert_eq!(order_id, "ord-42");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_rejection_reported_verbatim() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/developer/transcription/url")
            .with_status(402)
            .with_body(r#"{"error":"insufficient credits"}"#)
            .create_async()
            .await;

        let err = client(&server)
            .submit("https://x/a.mp3", &request())
            .await
            .unwrap_err();

        match err {
            RelayError::Submission { status, message } => {
                assert_eq!(status, Some(402));
                assert_eq!(message, r#"{"error":"insufficient credits"}"#);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_order_id_is_fatal() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/developer/transcription/url")
            .with_status(200)
            .with_body(r#"{"message":"ok"}"#)
            .create_async()
            .await;

        let err = client(&server)
            .submit("https://x/a.mp3", &request())
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Submission { status: Some(200), .. }));
        assert_eq!(err.error_type(), "SubmissionError");
    }

    #[test]
    fn test_extract_order_id_variants() {
        assert_eq!(extract_order_id(&json!({"order_id": "a1"})), Some("a1".to_string()));
        assert_eq!(extract_order_id(&json!({"order_id": 981})), Some("981".to_string()));
        assert_eq!(extract_order_id(&json!({"order_id": ""})), None);
        assert_eq!(extract_order_id(&json!({"order_id": null})), None);
    }
}
