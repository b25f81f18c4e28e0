//! Relay Orchestrator
//!
//! One run: classify → transcode → name → publish → submit. Stages run
//! strictly in order and the first failure ends the run. The original upload
//! and the transcoded file are owned by [`TempPath`] guards, so both are
//! removed from the working directory however the run ends.

use mediarelay_core::naming::{destination_path, output_filename, safe_stem};
use mediarelay_core::{
    MediaAsset, MediaKind, RelayError, RelayResult, SubmissionRecord, SubmissionRequest,
    TranscodeSpec,
};
use mediarelay_processing::Transcoder;
use mediarelay_storage::Publisher;
use std::sync::Arc;
use std::time::Instant;
use tempfile::TempPath;

use crate::transcription::TranscriptionProvider;

pub struct RelayPipeline {
    transcoder: Arc<dyn Transcoder>,
    publisher: Arc<Publisher>,
    provider: Arc<dyn TranscriptionProvider>,
    spec: TranscodeSpec,
    destination_dir: String,
}

impl RelayPipeline {
    pub fn new(
        transcoder: Arc<dyn Transcoder>,
        publisher: Arc<Publisher>,
        provider: Arc<dyn TranscriptionProvider>,
        spec: TranscodeSpec,
        destination_dir: impl Into<String>,
    ) -> Self {
        Self {
            transcoder,
            publisher,
            provider,
            spec,
            destination_dir: destination_dir.into(),
        }
    }

    /// Run the pipeline for `asset`. The asset's file is deleted before this
    /// returns, on success and on every error.
    #[tracing::instrument(
        skip(self, asset, request),
        fields(
            mimetype = %asset.mimetype(),
            size_bytes = asset.size_bytes(),
            reference = %request.reference
        )
    )]
    pub async fn run(
        &self,
        asset: MediaAsset,
        request: SubmissionRequest,
    ) -> RelayResult<SubmissionRecord> {
        let started = Instant::now();
        let original = TempPath::from_path(asset.path());

        let kind = MediaKind::classify(asset.mimetype()).ok_or_else(|| {
            RelayError::UnsupportedMedia {
                mimetype: asset.mimetype().to_string(),
            }
        })?;
        tracing::debug!(kind = kind.as_str(), "Input classified");

        let transcoded = self
            .transcoder
            .transcode(&original, asset.mimetype(), self.spec)
            .await?;
        let transcoded = TempPath::from_path(transcoded);
        tracing::info!(
            bitrate_kbps = self.spec.bitrate_kbps(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Transcode finished"
        );

        let filename = output_filename(&safe_stem(asset.original_filename()));
        let destination = destination_path(&self.destination_dir, &filename);

        let artifact = self.publisher.publish(&transcoded, &destination).await?;

        let order_id = self.provider.submit(&artifact.shared_url, &request).await?;

        tracing::info!(
            order_id = %order_id,
            destination = %artifact.path,
            duration_ms = started.elapsed().as_millis() as u64,
            "Relay run completed"
        );

        drop(transcoded);
        drop(original);

        Ok(SubmissionRecord {
            destination_url: artifact.shared_url,
            destination_path: artifact.path,
            language: request.language,
            service: request.service,
            callback_url: request.callback_url,
            reference: request.reference,
            order_id,
            bitrate_kbps: self.spec.bitrate_kbps(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mediarelay_processing::TranscodeError;
    use mediarelay_storage::memory::{BlobCall, Fault, InMemoryBlobStore, Operation, ScriptedRenewer};
    use mediarelay_storage::{CredentialManager, UploadLimits};
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Writes `output_len` bytes to `final-{n}.mp3` in the work dir, or fails
    /// without output.
    struct FakeTranscoder {
        work_dir: PathBuf,
        output_len: usize,
        fail: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Transcoder for FakeTranscoder {
        async fn transcode(
            &self,
            input: &Path,
            declared_mimetype: &str,
            _spec: TranscodeSpec,
        ) -> Result<PathBuf, TranscodeError> {
            if MediaKind::classify(declared_mimetype).is_none() {
                return Err(TranscodeError::UnsupportedMedia(declared_mimetype.to_string()));
            }
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            assert!(input.exists());
            if self.fail {
                return Err(TranscodeError::Failed {
                    status: "exit status: 1".to_string(),
                    stderr: "Invalid data found when processing input".to_string(),
                });
            }
            let output = self.work_dir.join(format!("final-{}.mp3", n));
            tokio::fs::write(&output, vec![7u8; self.output_len]).await?;
            Ok(output)
        }

        async fn probe(&self) -> Result<(), TranscodeError> {
            Ok(())
        }
    }

    struct FakeProvider {
        reject: bool,
        submitted: Mutex<Vec<(String, SubmissionRequest)>>,
    }

    #[async_trait]
    impl TranscriptionProvider for FakeProvider {
        async fn submit(
            &self,
            public_url: &str,
            request: &SubmissionRequest,
        ) -> RelayResult<String> {
            self.submitted
                .lock()
                .unwrap()
                .push((public_url.to_string(), request.clone()));
            if self.reject {
                return Err(RelayError::Submission {
                    status: Some(500),
                    message: "provider down".to_string(),
                });
            }
            Ok("ord-42".to_string())
        }
    }

    struct Harness {
        dir: TempDir,
        store: Arc<InMemoryBlobStore>,
        renewer: Arc<ScriptedRenewer>,
        provider: Arc<FakeProvider>,
        pipeline: RelayPipeline,
    }

    fn harness(output_len: usize, limits: UploadLimits, fail_transcode: bool, reject: bool) -> Harness {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(InMemoryBlobStore::new());
        let renewer = Arc::new(ScriptedRenewer::new());
        let credentials = Arc::new(CredentialManager::new(
            Some("initial".to_string()),
            renewer.clone(),
        ));
        let publisher = Arc::new(Publisher::new(store.clone(), credentials).with_limits(limits));
        let transcoder = Arc::new(FakeTranscoder {
            work_dir: dir.path().to_path_buf(),
            output_len,
            fail: fail_transcode,
            calls: AtomicUsize::new(0),
        });
        let provider = Arc::new(FakeProvider {
            reject,
            submitted: Mutex::new(Vec::new()),
        });
        let pipeline = RelayPipeline::new(
            transcoder,
            publisher,
            provider.clone(),
            TranscodeSpec::new(64).unwrap(),
            "/",
        );
        Harness {
            dir,
            store,
            renewer,
            provider,
            pipeline,
        }
    }

    async fn ingest(dir: &Path, name: &str, mimetype: &str) -> MediaAsset {
        let path = dir.join(format!("orig-{}", name));
        tokio::fs::write(&path, b"original bytes").await.unwrap();
        MediaAsset::from_path(path, mimetype, Some(name.to_string()))
            .await
            .unwrap()
    }

    fn request() -> SubmissionRequest {
        SubmissionRequest {
            language: "pt-BR".to_string(),
            service: "Standard".to_string(),
            callback_url: String::new(),
            reference: "dropbox-1a2b3c4d".to_string(),
        }
    }

    fn work_dir_is_empty(dir: &Path) -> bool {
        std::fs::read_dir(dir).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn test_end_to_end_large_video() {
        // 200 units against a 150 unit threshold and 8 unit chunks
        let limits = UploadLimits {
            single_upload_max: 150,
            chunk_size: 8,
        };
        let h = harness(200, limits, false, false);
        let asset = ingest(h.dir.path(), "Reunião final.mp4", "video/mp4").await;

        let record = h.pipeline.run(asset, request()).await.unwrap();

        // ceil(200 / 8) = 25 chunks: one start and 24 appends
        assert_eq!(h.store.count(Operation::StartSession), 1);
        assert_eq!(h.store.count(Operation::Append), 24);
        assert_eq!(h.store.count(Operation::Upload), 0);
        assert!(h.store.calls().iter().any(|c| matches!(
            c,
            BlobCall::Finish { offset: 200, path, .. } if path == "/Reuniãofinal.mp3"
        )));

        let submitted = h.provider.submitted.lock().unwrap().clone();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].0, record.destination_url);

        assert_eq!(record.order_id, "ord-42");
        assert_eq!(record.bitrate_kbps, 64);
        assert_eq!(record.destination_path, "/Reuniãofinal.mp3");
        assert_eq!(record.reference, "dropbox-1a2b3c4d");
        assert!(work_dir_is_empty(h.dir.path()));
    }

    #[tokio::test]
    async fn test_small_audio_uses_single_upload() {
        let h = harness(100, UploadLimits::default(), false, false);
        let asset = ingest(h.dir.path(), "voice.mp3", "audio/mpeg").await;

        let record = h.pipeline.run(asset, request()).await.unwrap();

        assert_eq!(h.store.count(Operation::Upload), 1);
        assert_eq!(h.store.count(Operation::StartSession), 0);
        assert_eq!(record.destination_path, "/voice.mp3");
        assert!(work_dir_is_empty(h.dir.path()));
    }

    #[tokio::test]
    async fn test_unsupported_media_cleans_up() {
        let h = harness(10, UploadLimits::default(), false, false);
        let asset = ingest(h.dir.path(), "notes.pdf", "application/pdf").await;

        let err = h.pipeline.run(asset, request()).await.unwrap_err();

        assert!(matches!(err, RelayError::UnsupportedMedia { .. }));
        assert!(h.store.calls().is_empty());
        assert!(work_dir_is_empty(h.dir.path()));
    }

    #[tokio::test]
    async fn test_transcode_failure_cleans_up() {
        let h = harness(10, UploadLimits::default(), true, false);
        let asset = ingest(h.dir.path(), "clip.mov", "video/quicktime").await;

        let err = h.pipeline.run(asset, request()).await.unwrap_err();

        assert_eq!(err.stage(), mediarelay_core::Stage::Transcode);
        assert!(matches!(err, RelayError::Transcode(ref m) if m.contains("Invalid data")));
        assert!(h.store.calls().is_empty());
        assert!(work_dir_is_empty(h.dir.path()));
    }

    #[tokio::test]
    async fn test_upload_failure_cleans_up() {
        let h = harness(10, UploadLimits::default(), false, false);
        h.store.inject(Operation::Upload, Fault::Status(500));
        let asset = ingest(h.dir.path(), "voice.wav", "audio/wav").await;

        let err = h.pipeline.run(asset, request()).await.unwrap_err();

        assert!(matches!(err, RelayError::Upload { status: Some(500), .. }));
        assert!(h.provider.submitted.lock().unwrap().is_empty());
        assert!(work_dir_is_empty(h.dir.path()));
    }

    #[tokio::test]
    async fn test_submission_failure_cleans_up() {
        let h = harness(10, UploadLimits::default(), false, true);
        let asset = ingest(h.dir.path(), "voice.wav", "audio/wav").await;

        let err = h.pipeline.run(asset, request()).await.unwrap_err();

        assert_eq!(err.error_type(), "SubmissionError");
        assert!(err.detailed_message().starts_with("[submission]"));
        assert!(work_dir_is_empty(h.dir.path()));
    }

    #[tokio::test]
    async fn test_auth_failure_mid_run_is_transparent() {
        let h = harness(10, UploadLimits::default(), false, false);
        h.store.inject(Operation::Upload, Fault::Unauthorized);
        let asset = ingest(h.dir.path(), "voice.wav", "audio/wav").await;

        let record = h.pipeline.run(asset, request()).await.unwrap();

        assert_eq!(h.renewer.calls(), 1);
        assert_eq!(h.store.count(Operation::Upload), 2);
        assert_eq!(record.order_id, "ord-42");
        assert!(work_dir_is_empty(h.dir.path()));
    }

    #[tokio::test]
    async fn test_missing_filename_uses_fallback_name() {
        let h = harness(10, UploadLimits::default(), false, false);
        let path = h.dir.path().join("orig-upload");
        tokio::fs::write(&path, b"x").await.unwrap();
        let asset = MediaAsset::from_path(path, "audio/ogg", None).await.unwrap();

        let record = h.pipeline.run(asset, request()).await.unwrap();

        assert_eq!(record.destination_path, "/audio.mp3");
        assert_eq!(record.filename(), "audio.mp3");
    }
}
