//! Dropbox HTTP API backend
//!
//! Content endpoints (`files/upload`, `files/upload_session/*`) carry their
//! arguments as JSON in the `Dropbox-API-Arg` header and the bytes as an
//! octet-stream body. RPC endpoints (`sharing/*`, `users/*`) take a JSON body.

use crate::traits::{BlobStore, BlobStoreError, BlobStoreResult};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::time::Duration;

const API_ARG_HEADER: &str = "Dropbox-API-Arg";
const OCTET_STREAM: &str = "application/octet-stream";

#[derive(Deserialize)]
struct SessionStartResponse {
    session_id: String,
}

#[derive(Deserialize)]
struct SharedLinkResponse {
    url: String,
}

#[derive(Deserialize)]
struct ListSharedLinksResponse {
    #[serde(default)]
    links: Vec<SharedLinkResponse>,
}

pub struct DropboxClient {
    http_client: Client,
    api_url: String,
    content_url: String,
}

impl Debug for DropboxClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("DropboxClient")
            .field("api_url", &self.api_url)
            .field("content_url", &self.content_url)
            .finish()
    }
}

/// Commit arguments shared by single uploads and session finish: always
/// overwrite, never rename, never notify.
fn commit_info(path: &str) -> Value {
    json!({
        "path": path,
        "mode": "overwrite",
        "autorename": false,
        "mute": false,
        "strict_conflict": false,
    })
}

/// Serialize `value` for an HTTP header. Dropbox requires every non-ASCII
/// character to be escaped as `\uXXXX`.
fn header_json(value: &Value) -> String {
    let raw = value.to_string();
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c.is_ascii() {
            escaped.push(c);
        } else {
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                escaped.push_str(&format!("\\u{:04x}", unit));
            }
        }
    }
    escaped
}

/// Find the first numeric `key` anywhere in a JSON document.
fn find_u64(value: &Value, key: &str) -> Option<u64> {
    match value {
        Value::Object(map) => map
            .get(key)
            .and_then(Value::as_u64)
            .or_else(|| map.values().find_map(|v| find_u64(v, key))),
        Value::Array(items) => items.iter().find_map(|v| find_u64(v, key)),
        _ => None,
    }
}

impl DropboxClient {
    pub fn new(api_url: &str, content_url: &str, timeout: Duration) -> BlobStoreResult<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BlobStoreError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            api_url: api_url.trim_end_matches('/').to_string(),
            content_url: content_url.trim_end_matches('/').to_string(),
        })
    }

    async fn content_call(
        &self,
        token: &str,
        endpoint: &str,
        arg: &Value,
        body: Bytes,
    ) -> BlobStoreResult<Response> {
        let response = self
            .http_client
            .post(format!("{}/2/{}", self.content_url, endpoint))
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, OCTET_STREAM)
            .header(API_ARG_HEADER, header_json(arg))
            .body(body)
            .send()
            .await
            .map_err(|e| BlobStoreError::Transport(e.to_string()))?;

        check(response, arg).await
    }

    async fn rpc_call(&self, token: &str, endpoint: &str, body: &Value) -> BlobStoreResult<Response> {
        let response = self
            .http_client
            .post(format!("{}/2/{}", self.api_url, endpoint))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(|e| BlobStoreError::Transport(e.to_string()))?;

        check(response, body).await
    }
}

/// Classify a non-success response. `arg` is the request argument, used to
/// report what we sent alongside what the server expected.
async fn check(response: Response, arg: &Value) -> BlobStoreResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());

    if status == StatusCode::UNAUTHORIZED {
        return Err(BlobStoreError::Unauthorized(body));
    }

    if status == StatusCode::CONFLICT {
        if body.contains("incorrect_offset") {
            let expected = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| find_u64(&v, "correct_offset"));
            return Err(BlobStoreError::IncorrectOffset {
                sent: find_u64(arg, "offset").unwrap_or(0),
                expected,
            });
        }
        if body.contains("shared_link_already_exists") {
            let path = arg
                .get("path")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            return Err(BlobStoreError::SharedLinkAlreadyExists(path));
        }
    }

    Err(BlobStoreError::Status {
        status: status.as_u16(),
        body,
    })
}

async fn parse<T: DeserializeOwned>(response: Response, what: &str) -> BlobStoreResult<T> {
    response
        .json::<T>()
        .await
        .map_err(|e| BlobStoreError::Malformed(format!("{}: {}", what, e)))
}

#[async_trait]
impl BlobStore for DropboxClient {
    async fn upload(&self, token: &str, path: &str, data: Bytes) -> BlobStoreResult<()> {
        self.content_call(token, "files/upload", &commit_info(path), data)
            .await?;
        Ok(())
    }

    async fn start_session(&self, token: &str, first_chunk: Bytes) -> BlobStoreResult<String> {
        let response = self
            .content_call(
                token,
                "files/upload_session/start",
                &json!({ "close": false }),
                first_chunk,
            )
            .await?;
        let started: SessionStartResponse = parse(response, "upload_session/start").await?;
        if started.session_id.is_empty() {
            return Err(BlobStoreError::Malformed(
                "upload_session/start: empty session_id".to_string(),
            ));
        }
        Ok(started.session_id)
    }

    async fn append(
        &self,
        token: &str,
        session_id: &str,
        offset: u64,
        chunk: Bytes,
    ) -> BlobStoreResult<()> {
        let arg = json!({
            "cursor": { "session_id": session_id, "offset": offset },
            "close": false,
        });
        self.content_call(token, "files/upload_session/append_v2", &arg, chunk)
            .await?;
        Ok(())
    }

    async fn finish(
        &self,
        token: &str,
        session_id: &str,
        offset: u64,
        path: &str,
    ) -> BlobStoreResult<()> {
        let arg = json!({
            "cursor": { "session_id": session_id, "offset": offset },
            "commit": commit_info(path),
        });
        self.content_call(token, "files/upload_session/finish", &arg, Bytes::new())
            .await?;
        Ok(())
    }

    async fn create_shared_link(&self, token: &str, path: &str) -> BlobStoreResult<String> {
        let body = json!({
            "path": path,
            "settings": { "requested_visibility": "public" },
        });
        let response = self
            .rpc_call(token, "sharing/create_shared_link_with_settings", &body)
            .await?;
        let link: SharedLinkResponse =
            parse(response, "sharing/create_shared_link_with_settings").await?;
        Ok(link.url)
    }

    async fn list_shared_links(&self, token: &str, path: &str) -> BlobStoreResult<Vec<String>> {
        let body = json!({ "path": path, "direct_only": true });
        let response = self
            .rpc_call(token, "sharing/list_shared_links", &body)
            .await?;
        let listed: ListSharedLinksResponse =
            parse(response, "sharing/list_shared_links").await?;
        Ok(listed.links.into_iter().map(|l| l.url).collect())
    }

    async fn current_account(&self, token: &str) -> BlobStoreResult<()> {
        self.rpc_call(token, "users/get_current_account", &Value::Null)
            .await?;
        Ok(())
    }
}
