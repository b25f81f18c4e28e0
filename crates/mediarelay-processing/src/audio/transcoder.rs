//! ffmpeg-backed transcoder

use crate::audio::strategy::TranscodeStrategy;
use crate::traits::{TranscodeError, Transcoder};
use async_trait::async_trait;
use mediarelay_core::constants::OUTPUT_EXTENSION;
use mediarelay_core::{MediaKind, TranscodeSpec};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use uuid::Uuid;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Reject executable paths carrying shell metacharacters.
fn validate_tool_path(path: &str) -> Result<(), TranscodeError> {
    let dangerous_chars = [';', '|', '&', '$', '`', '(', ')', '<', '>', '\n', '\r'];
    if path.trim().is_empty() || path.chars().any(|c| dangerous_chars.contains(&c)) {
        return Err(TranscodeError::InvalidToolPath(path.to_string()));
    }
    Ok(())
}

pub struct FfmpegTranscoder {
    ffmpeg_path: String,
    work_dir: PathBuf,
    timeout: Duration,
}

impl FfmpegTranscoder {
    pub fn new(ffmpeg_path: String, work_dir: PathBuf) -> Result<Self, TranscodeError> {
        validate_tool_path(&ffmpeg_path)?;
        Ok(Self {
            ffmpeg_path,
            work_dir,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn output_path(&self) -> PathBuf {
        self.work_dir
            .join(format!("final-{}.{}", Uuid::new_v4().simple(), OUTPUT_EXTENSION))
    }

    async fn run(&self, args: &[String]) -> Result<(), TranscodeError> {
        let child = Command::new(&self.ffmpeg_path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, child).await {
            Ok(result) => result.map_err(|e| TranscodeError::ToolUnavailable {
                tool: self.ffmpeg_path.clone(),
                message: e.to_string(),
            })?,
            Err(_) => return Err(TranscodeError::TimedOut(self.timeout.as_secs())),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TranscodeError::Failed {
                status: output.status.to_string(),
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    #[tracing::instrument(skip(self), fields(strategy = tracing::field::Empty))]
    async fn transcode(
        &self,
        input: &Path,
        declared_mimetype: &str,
        spec: TranscodeSpec,
    ) -> Result<PathBuf, TranscodeError> {
        let kind = MediaKind::classify(declared_mimetype)
            .ok_or_else(|| TranscodeError::UnsupportedMedia(declared_mimetype.to_string()))?;
        let strategy = TranscodeStrategy::for_kind(kind);
        tracing::Span::current().record("strategy", strategy.name());

        self.probe().await?;

        tokio::fs::create_dir_all(&self.work_dir).await?;
        let output_path = self.output_path();
        let args = strategy.ffmpeg_args(input, &output_path, spec);

        tracing::debug!(
            input = %input.display(),
            output = %output_path.display(),
            bitrate = %spec.ffmpeg_bitrate(),
            "Running ffmpeg"
        );

        if let Err(e) = self.run(&args).await {
            // Partial output from a failed run is never handed back
            if let Err(remove_err) = tokio::fs::remove_file(&output_path).await {
                if remove_err.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(
                        error = %remove_err,
                        path = %output_path.display(),
                        "Failed to remove partial transcode output"
                    );
                }
            }
            tracing::error!(error = %e, "Transcode failed");
            return Err(e);
        }

        let size = tokio::fs::metadata(&output_path).await?.len();
        tracing::info!(
            output = %output_path.display(),
            size_bytes = size,
            "Transcode completed"
        );

        Ok(output_path)
    }

    /// Run `ffmpeg -version`. Any spawn failure or non-zero exit means the
    /// tool cannot be used.
    async fn probe(&self) -> Result<(), TranscodeError> {
        let output = Command::new(&self.ffmpeg_path)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| TranscodeError::ToolUnavailable {
                tool: self.ffmpeg_path.clone(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(TranscodeError::ToolUnavailable {
                tool: self.ffmpeg_path.clone(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(())
    }
}
