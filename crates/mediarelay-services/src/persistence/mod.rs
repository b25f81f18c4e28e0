//! Persistence collaborator
//!
//! Receives a [`ProcessRecord`] only after a submission has been accepted.
//! The PostgREST sink inserts one row per record; without configuration the
//! record is logged instead.

use async_trait::async_trait;
use mediarelay_core::{PersistenceConfig, ProcessRecord, RelayError, RelayResult};
use reqwest::Client;
use serde_json::{json, Map, Value};
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::time::Duration;

#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Store `record` and return the stored row (or `{}` when nothing comes back).
    async fn insert(&self, record: &ProcessRecord) -> RelayResult<Value>;

    /// Lightweight reachability check used by the deep health check.
    async fn ping(&self) -> RelayResult<()>;

    /// `false` for the logging fallback; the health check then reports the
    /// store as not configured instead of pinging it.
    fn is_configured(&self) -> bool {
        true
    }
}

/// Column layout of the `transcricoes` table.
fn row_for(record: &ProcessRecord) -> Value {
    let mut row = Map::new();
    row.insert("processo_id".into(), json!(record.process_id));
    row.insert("conteudo".into(), json!(""));
    row.insert("status".into(), json!(record.status));
    row.insert("tempo_processamento".into(), json!(0));
    row.insert("dropbox_url".into(), json!(record.public_url));
    row.insert("order_id".into(), json!(record.order_id));
    row.insert("dropbox_filename".into(), json!(record.filename));
    if let Some(kind) = record.transcription_type.as_deref() {
        row.insert("tipo_transcricao".into(), json!(kind));
    }
    Value::Object(row)
}

pub struct PostgrestRecordSink {
    http_client: Client,
    table_url: String,
    anon_key: String,
}

impl Debug for PostgrestRecordSink {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("PostgrestRecordSink")
            .field("table_url", &self.table_url)
            .finish()
    }
}

impl PostgrestRecordSink {
    pub fn new(base_url: &str, anon_key: String, table: &str, timeout: Duration) -> RelayResult<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            table_url: format!("{}/rest/v1/{}", base_url.trim_end_matches('/'), table),
            anon_key,
        })
    }

    /// `None` when persistence is not configured.
    pub fn from_config(config: &PersistenceConfig, timeout: Duration) -> RelayResult<Option<Self>> {
        match (config.url.as_deref(), config.anon_key.as_deref()) {
            (Some(url), Some(key)) if config.is_configured() => {
                Self::new(url, key.to_string(), &config.table, timeout).map(Some)
            }
            _ => Ok(None),
        }
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.anon_key)
    }
}

#[async_trait]
impl RecordSink for PostgrestRecordSink {
    async fn insert(&self, record: &ProcessRecord) -> RelayResult<Value> {
        let response = self
            .authorized(self.http_client.post(&self.table_url))
            .header("Prefer", "return=representation")
            .json(&row_for(record))
            .send()
            .await
            .map_err(|e| RelayError::Persistence(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(RelayError::Persistence(format!("{} - {}", status, body)));
        }

        let rows: Value = response
            .json()
            .await
            .map_err(|e| RelayError::Persistence(format!("Failed to parse response: {}", e)))?;

        let row = match rows {
            Value::Array(mut items) if !items.is_empty() => items.swap_remove(0),
            _ => json!({}),
        };

        tracing::info!(
            process_id = %record.process_id,
            order_id = %record.order_id,
            "Process record stored"
        );
        Ok(row)
    }

    async fn ping(&self) -> RelayResult<()> {
        let response = self
            .authorized(self.http_client.get(&self.table_url))
            .query(&[("select", "*"), ("limit", "1")])
            .send()
            .await
            .map_err(|e| RelayError::Persistence(e.to_string()))?;

        if !response.status().is_success() {
            return Err(RelayError::Persistence(format!(
                "health query returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// Used when no persistence endpoint is configured.
#[derive(Debug, Default)]
pub struct LoggingRecordSink;

#[async_trait]
impl RecordSink for LoggingRecordSink {
    async fn insert(&self, record: &ProcessRecord) -> RelayResult<Value> {
        tracing::info!(
            process_id = %record.process_id,
            order_id = %record.order_id,
            filename = %record.filename,
            status = %record.status,
            "Persistence not configured, record not stored"
        );
        Ok(json!({}))
    }

    async fn ping(&self) -> RelayResult<()> {
        Ok(())
    }

    fn is_configured(&self) -> bool {
        false
    }
}
