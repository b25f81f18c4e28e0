//! Test application wiring: in-memory blob store, scripted renewer, fake
//! transcoder, recording sink, and a mockito transcription endpoint.

#![allow(dead_code)]

use async_trait::async_trait;
use axum_test::TestServer;
use mediarelay_api::setup::routes::setup_routes;
use mediarelay_api::AppState;
use mediarelay_core::{
    BaseConfig, DropboxConfig, MediaKind, PersistenceConfig, ProcessRecord, RelayConfig,
    RelayError, RelayResult, TranscodeSpec, TranscriptionConfig,
};
use mediarelay_processing::{TranscodeError, Transcoder};
use mediarelay_services::{RecordSink, RelayPipeline, TranskriptorClient};
use mediarelay_storage::memory::{InMemoryBlobStore, ScriptedRenewer};
use mediarelay_storage::{CredentialManager, Publisher, UploadLimits};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

pub const SUBMISSION_PATH: &str = "/developer/transcription/url";

/// Writes a fixed-size MP3 stand-in next to the input.
pub struct FakeTranscoder {
    work_dir: PathBuf,
    output_len: usize,
    available: bool,
    pub calls: AtomicUsize,
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
        let output = self.work_dir.join(format!("final-{}.mp3", n));
        tokio::fs::write(&output, vec![3u8; self.output_len]).await?;
        Ok(output)
    }

    async fn probe(&self) -> Result<(), TranscodeError> {
        if self.available {
            Ok(())
        } else {
            Err(TranscodeError::ToolUnavailable {
                tool: "ffmpeg".to_string(),
                message: "No such file or directory (os error 2)".to_string(),
            })
        }
    }
}

pub struct RecordingSink {
    pub records: Mutex<Vec<ProcessRecord>>,
    pub fail: bool,
    pub configured: bool,
}

#[async_trait]
impl RecordSink for RecordingSink {
    async fn insert(&self, record: &ProcessRecord) -> RelayResult<Value> {
        if self.fail {
            return Err(RelayError::Persistence("503 - unavailable".to_string()));
        }
        self.records.lock().unwrap().push(record.clone());
        Ok(json!({"id": 1, "processo_id": record.process_id}))
    }

    async fn ping(&self) -> RelayResult<()> {
        if self.fail {
            Err(RelayError::Persistence("503 - unavailable".to_string()))
        } else {
            Ok(())
        }
    }

    fn is_configured(&self) -> bool {
        self.configured
    }
}

pub struct TestOptions {
    pub initial_token: Option<String>,
    pub valid_token: Option<String>,
    pub ffmpeg_available: bool,
    pub sink_fails: bool,
    pub persistence_configured: bool,
    pub environment: &'static str,
    pub output_len: usize,
    pub limits: UploadLimits,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            initial_token: None,
            valid_token: None,
            ffmpeg_available: true,
            sink_fails: false,
            persistence_configured: true,
            environment: "test",
            output_len: 64,
            limits: UploadLimits::default(),
        }
    }
}

pub struct TestApp {
    pub server: TestServer,
    pub store: Arc<InMemoryBlobStore>,
    pub renewer: Arc<ScriptedRenewer>,
    pub records: Arc<RecordingSink>,
    pub transcoder: Arc<FakeTranscoder>,
    pub credentials: Arc<CredentialManager>,
    pub provider: mockito::ServerGuard,
    pub work_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    pub fn credentials(&self) -> &CredentialManager {
        &self.credentials
    }

    /// Files left behind in the working directory.
    pub fn leftover_files(&self) -> Vec<PathBuf> {
        std::fs::read_dir(self.work_dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect()
    }

    pub fn stored_records(&self) -> Vec<ProcessRecord> {
        self.records.records.lock().unwrap().clone()
    }
}

pub fn test_config(work_dir: &Path, submission_url: String) -> RelayConfig {
    RelayConfig {
        base: BaseConfig {
            server_port: 0,
            environment: "test".to_string(),
            max_upload_size_bytes: 16 * 1024 * 1024,
            http_timeout_secs: 5,
        },
        target_kbps: 64,
        ffmpeg_path: "ffmpeg".to_string(),
        ffmpeg_timeout_secs: 60,
        work_dir: work_dir.to_path_buf(),
        destination_dir: "/".to_string(),
        dropbox: DropboxConfig {
            access_token: None,
            refresh_token: "refresh".to_string(),
            app_key: "app-key".to_string(),
            app_secret: "app-secret".to_string(),
            api_url: "http://127.0.0.1:1".to_string(),
            content_url: "http://127.0.0.1:1".to_string(),
            oauth_url: "http://127.0.0.1:1".to_string(),
        },
        transcription: TranscriptionConfig {
            api_url: submission_url,
            api_key: "tk-key".to_string(),
            default_language: "pt-BR".to_string(),
            default_service: "Standard".to_string(),
            callback_url: "https://hooks.example.com/done".to_string(),
            reference_prefix: "dropbox".to_string(),
        },
        persistence: PersistenceConfig {
            url: None,
            anon_key: None,
            table: "transcricoes".to_string(),
        },
    }
}

pub async fn setup_test_app(options: TestOptions) -> TestApp {
    let work_dir = TempDir::new().unwrap();
    let provider = mockito::Server::new_async().await;
    let mut config = test_config(
        work_dir.path(),
        format!("{}{}", provider.url(), SUBMISSION_PATH),
    );
    config.base.environment = options.environment.to_string();

    let store = Arc::new(InMemoryBlobStore::new());
    if let Some(token) = options.valid_token.as_deref() {
        store.set_valid_token(token);
    }
    let renewer = Arc::new(ScriptedRenewer::new());
    let credentials = Arc::new(CredentialManager::new(
        options.initial_token.clone(),
        renewer.clone(),
    ));

    let transcoder = Arc::new(FakeTranscoder {
        work_dir: work_dir.path().to_path_buf(),
        output_len: options.output_len,
        available: options.ffmpeg_available,
        calls: AtomicUsize::new(0),
    });
    let records = Arc::new(RecordingSink {
        records: Mutex::new(Vec::new()),
        fail: options.sink_fails,
        configured: options.persistence_configured,
    });

    let provider_client =
        TranskriptorClient::from_config(&config.transcription, Duration::from_secs(5)).unwrap();
    let publisher = Arc::new(
        Publisher::new(store.clone(), credentials.clone()).with_limits(options.limits),
    );
    let pipeline = Arc::new(RelayPipeline::new(
        transcoder.clone(),
        publisher,
        Arc::new(provider_client),
        TranscodeSpec::new(config.target_kbps).unwrap(),
        config.destination_dir.clone(),
    ));

    let state = Arc::new(AppState {
        config: config.clone(),
        pipeline,
        records: records.clone(),
        transcoder: transcoder.clone(),
        store: store.clone(),
        credentials: credentials.clone(),
    });

    let server = TestServer::new(setup_routes(&config, state)).expect("Failed to create test server");

    TestApp {
        server,
        store,
        renewer,
        records,
        transcoder,
        credentials,
        provider,
        work_dir,
    }
}

/// Provider accepts every submission with `order_id`.
pub async fn accept_submissions(app: &mut TestApp, order_id: &str) -> mockito::Mock {
    app.provider
        .mock("POST", SUBMISSION_PATH)
        .with_status(200)
        .with_body(json!({"order_id": order_id}).to_string())
        .create_async()
        .await
}
