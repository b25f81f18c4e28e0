use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Media classification derived from a declared mimetype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Audio,
}

impl MediaKind {
    /// Classify by mimetype prefix. Anything that is neither `video/*` nor
    /// `audio/*` yields `None` and must be rejected before processing.
    pub fn classify(mimetype: &str) -> Option<Self> {
        let normalized = mimetype.trim().to_ascii_lowercase();
        if normalized.starts_with("video/") {
            Some(MediaKind::Video)
        } else if normalized.starts_with("audio/") {
            Some(MediaKind::Audio)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
        }
    }
}

/// An ingested media file on local disk.
///
/// Immutable once read. The relay owns the file for the duration of a run and
/// removes it on every exit path.
#[derive(Debug, Clone)]
pub struct MediaAsset {
    path: PathBuf,
    mimetype: String,
    size_bytes: u64,
    original_filename: Option<String>,
}

impl MediaAsset {
    pub fn new(
        path: impl Into<PathBuf>,
        mimetype: impl Into<String>,
        size_bytes: u64,
        original_filename: Option<String>,
    ) -> Self {
        Self {
            path: path.into(),
            mimetype: mimetype.into(),
            size_bytes,
            original_filename,
        }
    }

    /// Build an asset from a file already written to disk, reading its size.
    pub async fn from_path(
        path: impl Into<PathBuf>,
        mimetype: impl Into<String>,
        original_filename: Option<String>,
    ) -> std::io::Result<Self> {
        let path = path.into();
        let size_bytes = tokio::fs::metadata(&path).await?.len();
        Ok(Self::new(path, mimetype, size_bytes, original_filename))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mimetype(&self) -> &str {
        &self.mimetype
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn original_filename(&self) -> Option<&str> {
        self.original_filename.as_deref()
    }

    pub fn kind(&self) -> Option<MediaKind> {
        MediaKind::classify(&self.mimetype)
    }
}
