//! `POST /upload`: one relay run per request.

use crate::error::HttpRelayError;
use crate::state::AppState;
use axum::{
    extract::{
        multipart::{Field, MultipartRejection},
        rejection::QueryRejection,
        Multipart, Query, State,
    },
    Json,
};
use mediarelay_core::naming::{generate_reference, guess_mimetype};
use mediarelay_core::{MediaAsset, ProcessRecord, RelayError, RelayResult, SubmissionRequest};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempPath;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

pub const UPLOAD_ACCEPTED_MESSAGE: &str = "Arquivo processado e enviado ao Transkriptor.";

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub processo_id: String,
    pub language: Option<String>,
    pub service: Option<String>,
    pub reference: Option<String>,
    pub callback_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub dropbox_url: String,
    pub order_id: String,
    pub supabase_row: Value,
    pub target_kbps: u32,
}

/// Inbound file written to the working directory. Removed on drop until it is
/// handed to the pipeline.
struct SavedUpload {
    path: TempPath,
    filename: Option<String>,
    content_type: Option<String>,
    size_bytes: u64,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Content types that say nothing about the media inside.
fn is_generic(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .is_some_and(|t| t.trim().eq_ignore_ascii_case("application/octet-stream"))
}

/// `.ext` of `filename`, restricted to alphanumerics.
fn safe_extension(filename: Option<&str>) -> String {
    filename
        .and_then(|name| Path::new(name).extension())
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| format!(".{}", e))
        .unwrap_or_default()
}

async fn save_field(mut field: Field<'_>, work_dir: &Path) -> RelayResult<SavedUpload> {
    let filename = non_empty(field.file_name().map(str::to_string));
    let content_type = non_empty(field.content_type().map(str::to_string));

    let local = work_dir.join(format!(
        "orig-{}{}",
        Uuid::new_v4().simple(),
        safe_extension(filename.as_deref())
    ));
    let mut file = tokio::fs::File::create(&local).await?;
    let path = TempPath::from_path(local);

    let mut size_bytes = 0u64;
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| RelayError::InvalidInput(format!("Failed to read file data: {}", e)))?
    {
        file.write_all(&chunk).await?;
        size_bytes += chunk.len() as u64;
    }
    file.flush().await?;

    Ok(SavedUpload {
        path,
        filename,
        content_type,
        size_bytes,
    })
}

/// Read the `file` and `tipo_transcricao` fields. Exactly one file is accepted.
async fn read_form(
    mut multipart: Multipart,
    work_dir: &Path,
) -> RelayResult<(SavedUpload, Option<String>)> {
    let mut upload: Option<SavedUpload> = None;
    let mut transcription_type: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| RelayError::InvalidInput(format!("Failed to read multipart: {}", e)))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                if upload.is_some() {
                    return Err(RelayError::InvalidInput(
                        "Multiple file fields are not allowed; send exactly one field named 'file'"
                            .to_string(),
                    ));
                }
                upload = Some(save_field(field, work_dir).await?);
            }
            Some("tipo_transcricao") => {
                let text = field.text().await.map_err(|e| {
                    RelayError::InvalidInput(format!("Failed to read tipo_transcricao: {}", e))
                })?;
                transcription_type = non_empty(Some(text));
            }
            _ => {}
        }
    }

    let upload = upload.ok_or_else(|| RelayError::InvalidInput("No file provided".to_string()))?;
    Ok((upload, transcription_type))
}

#[tracing::instrument(
    skip(state, query, multipart),
    fields(process_id = tracing::field::Empty, operation = "upload")
)]
pub async fn upload(
    State(state): State<Arc<AppState>>,
    query: Result<Query<UploadQuery>, QueryRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, HttpRelayError> {
    let Query(query) = query?;
    let multipart = multipart?;
    tracing::Span::current().record("process_id", query.processo_id.as_str());

    let defaults = &state.config.transcription;
    let request = SubmissionRequest {
        language: non_empty(query.language).unwrap_or_else(|| defaults.default_language.clone()),
        service: non_empty(query.service).unwrap_or_else(|| defaults.default_service.clone()),
        callback_url: non_empty(query.callback_url)
            .unwrap_or_else(|| defaults.callback_url.clone()),
        reference: non_empty(query.reference)
            .unwrap_or_else(|| generate_reference(&defaults.reference_prefix)),
    };

    let (saved, transcription_type) = read_form(multipart, &state.config.work_dir).await?;

    let mimetype = saved
        .content_type
        .clone()
        .filter(|ct| !is_generic(ct))
        .or_else(|| {
            saved
                .filename
                .as_deref()
                .and_then(guess_mimetype)
                .map(str::to_string)
        })
        .unwrap_or_default();

    tracing::info!(
        filename = ?saved.filename,
        mimetype = %mimetype,
        size_bytes = saved.size_bytes,
        "Upload received"
    );

    let local_path = saved
        .path
        .keep()
        .map_err(|e| RelayError::Io(e.error))?;
    let asset = MediaAsset::new(local_path, mimetype, saved.size_bytes, saved.filename);

    let record = state.pipeline.run(asset, request).await?;

    let process_record =
        ProcessRecord::from_submission(query.processo_id, &record, transcription_type);
    let row = match state.records.insert(&process_record).await {
        Ok(row) => row,
        Err(e) => {
            // The provider already holds the order; make sure it is traceable.
            tracing::error!(
                error = %e,
                order_id = %record.order_id,
                process_id = %process_record.process_id,
                "Submission accepted but record was not stored"
            );
            return Err(e.into());
        }
    };

    Ok(Json(UploadResponse {
        message: UPLOAD_ACCEPTED_MESSAGE.to_string(),
        dropbox_url: record.destination_url,
        order_id: record.order_id,
        supabase_row: row,
        target_kbps: record.bitrate_kbps,
    }))
}
