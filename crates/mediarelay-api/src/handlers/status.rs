//! `GET /status`: quick liveness answer, plus dependency checks with `deep=true`.

use crate::state::AppState;
use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

pub const APP_NAME: &str = "Uploader → MP3 → Dropbox → Transkriptor → Supabase";

const CHECK_TIMEOUT: Duration = Duration::from_secs(10);
const CHECK_OK: &str = "ok";
const NOT_CONFIGURED: &str = "not configured";

#[derive(Debug, Default, Deserialize)]
pub struct StatusQuery {
    #[serde(default, deserialize_with = "flag")]
    pub deep: bool,
}

/// Accepts `true`/`false` as well as `1`/`0`, `yes`/`no`, `on`/`off`.
fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        other => Err(serde::de::Error::custom(format!("invalid boolean: {}", other))),
    }
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub app: &'static str,
    pub time_utc: String,
    pub status: &'static str,
    pub deep_checks: BTreeMap<&'static str, String>,
}

/// Run one check under [`CHECK_TIMEOUT`]. The error string is reported as is.
async fn run_check<F, T, E>(name: &str, f: F) -> Result<String, String>
where
    F: Future<Output = Result<T, E>>,
    E: Display,
{
    match tokio::time::timeout(CHECK_TIMEOUT, f).await {
        Ok(Ok(_)) => Ok(CHECK_OK.to_string()),
        Ok(Err(e)) => {
            tracing::warn!(check = name, error = %e, "Health check failed");
            Err(format!("error: {}", e))
        }
        Err(_) => {
            tracing::warn!(check = name, "Health check timed out");
            Err("error: timed out".to_string())
        }
    }
}

pub async fn status(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StatusQuery>,
) -> Json<StatusResponse> {
    let mut response = StatusResponse {
        app: APP_NAME,
        time_utc: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
        status: "ok",
        deep_checks: BTreeMap::new(),
    };

    if query.deep {
        let checks = [
            ("ffmpeg", run_check("ffmpeg", state.transcoder.probe()).await),
            (
                "dropbox",
                run_check("dropbox", state.credentials.verify(state.store.as_ref())).await,
            ),
            (
                "supabase",
                if state.records.is_configured() {
                    run_check("supabase", state.records.ping()).await
                } else {
                    Ok(NOT_CONFIGURED.to_string())
                },
            ),
        ];

        for (name, outcome) in checks {
            let value = match outcome {
                Ok(value) => value,
                Err(message) => {
                    response.status = "degraded";
                    message
                }
            };
            response.deep_checks.insert(name, value);
        }
    }

    Json(response)
}
