//! Collaborator construction and credential bootstrap

use crate::state::AppState;
use anyhow::{Context, Result};
use mediarelay_core::{RelayConfig, TranscodeSpec};
use mediarelay_processing::{FfmpegTranscoder, Transcoder};
use mediarelay_services::{
    LoggingRecordSink, PostgrestRecordSink, RecordSink, RelayPipeline, TranscriptionProvider,
    TranskriptorClient,
};
use mediarelay_storage::{BlobStore, CredentialManager, DropboxClient, OAuthRenewer, Publisher};
use std::sync::Arc;
use std::time::Duration;

pub async fn initialize_services(config: &RelayConfig) -> Result<Arc<AppState>> {
    tokio::fs::create_dir_all(&config.work_dir)
        .await
        .with_context(|| format!("Failed to create work dir {}", config.work_dir.display()))?;

    let timeout = Duration::from_secs(config.base.http_timeout_secs);

    let store: Arc<dyn BlobStore> = Arc::new(DropboxClient::new(
        &config.dropbox.api_url,
        &config.dropbox.content_url,
        timeout,
    )?);

    let renewer = OAuthRenewer::new(
        &config.dropbox.oauth_url,
        config.dropbox.refresh_token.clone(),
        config.dropbox.app_key.clone(),
        config.dropbox.app_secret.clone(),
        timeout,
    )?;
    let credentials = Arc::new(CredentialManager::new(
        config.dropbox.access_token.clone(),
        Arc::new(renewer),
    ));

    // UNKNOWN -> VALID before the first request; a revoked refresh token stops startup.
    credentials
        .ensure_valid(store.as_ref())
        .await
        .context("Blob store credential bootstrap failed")?;
    tracing::info!("Blob store credentials validated");

    let ffmpeg = FfmpegTranscoder::new(config.ffmpeg_path.clone(), config.work_dir.clone())?
        .with_timeout(Duration::from_secs(config.ffmpeg_timeout_secs));
    if let Err(e) = ffmpeg.probe().await {
        tracing::warn!(
            error = %e,
            ffmpeg_path = %config.ffmpeg_path,
            "ffmpeg not available; uploads will fail until it is installed"
        );
    }
    let transcoder: Arc<dyn Transcoder> = Arc::new(ffmpeg);

    let provider: Arc<dyn TranscriptionProvider> =
        Arc::new(TranskriptorClient::from_config(&config.transcription, timeout)?);

    let records: Arc<dyn RecordSink> =
        match PostgrestRecordSink::from_config(&config.persistence, timeout)? {
            Some(sink) => Arc::new(sink),
            None => {
                tracing::warn!("SUPABASE_URL/SUPABASE_ANON_KEY not set, records will only be logged");
                Arc::new(LoggingRecordSink)
            }
        };

    let publisher = Arc::new(Publisher::new(store.clone(), credentials.clone()));
    let pipeline = Arc::new(RelayPipeline::new(
        transcoder.clone(),
        publisher,
        provider,
        TranscodeSpec::new(config.target_kbps)?,
        config.destination_dir.clone(),
    ));

    Ok(Arc::new(AppState {
        config: config.clone(),
        pipeline,
        records,
        transcoder,
        store,
        credentials,
    }))
}
