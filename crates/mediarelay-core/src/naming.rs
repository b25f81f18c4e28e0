//! Destination names, caller references, and mimetype fallback.
//!
//! Destination paths are derived deterministically from the original filename
//! so that re-running the same upload overwrites the same remote object.

use crate::constants::{FALLBACK_STEM, OUTPUT_EXTENSION};
use std::path::Path;
use uuid::Uuid;

/// Filesystem-safe stem of `filename`: alphanumerics, `-` and `_` only.
///
/// Falls back to [`FALLBACK_STEM`] when the filename is missing or nothing
/// safe remains.
pub fn safe_stem(filename: Option<&str>) -> String {
    let stem = filename
        .and_then(|name| Path::new(name).file_stem())
        .and_then(|s| s.to_str())
        .unwrap_or("");

    let safe: String = stem
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '_')
        .collect();

    if safe.is_empty() {
        FALLBACK_STEM.to_string()
    } else {
        safe
    }
}

/// `{stem}.mp3`
pub fn output_filename(stem: &str) -> String {
    format!("{}.{}", stem, OUTPUT_EXTENSION)
}

/// Join the fixed destination directory and a published filename.
///
/// `("/", "a.mp3")` → `/a.mp3`, `("/relay/", "a.mp3")` → `/relay/a.mp3`.
pub fn destination_path(destination_dir: &str, filename: &str) -> String {
    let dir = destination_dir.trim().trim_end_matches('/');
    if dir.is_empty() {
        format!("/{}", filename)
    } else if dir.starts_with('/') {
        format!("{}/{}", dir, filename)
    } else {
        format!("/{}/{}", dir, filename)
    }
}

/// Caller reference used when none is supplied: `{prefix}-{8 hex chars}`.
pub fn generate_reference(prefix: &str) -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{}-{}", prefix, &id[..8])
}

/// Guess an audio/video mimetype from a filename's extension.
///
/// Only used when the inbound request declares no content type; anything
/// that is not a known audio or video extension yields `None`.
pub fn guess_mimetype(filename: &str) -> Option<&'static str> {
    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())?;

    let mimetype = match extension.as_str() {
        // Videos
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "mkv" => "video/x-matroska",
        "m4v" => "video/x-m4v",
        "mpeg" | "mpg" => "video/mpeg",
        "3gp" => "video/3gpp",
        // Audio
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" | "oga" => "audio/ogg",
        "opus" => "audio/opus",
        "m4a" => "audio/mp4",
        "flac" => "audio/flac",
        "aac" => "audio/aac",
        "wma" => "audio/x-ms-wma",
        "amr" => "audio/amr",
        _ => return None,
    };
    Some(mimetype)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_stem_strips_unsafe_characters() {
        assert_eq!(safe_stem(Some("Reunião de equipe (1).mp4")), "Reuniãodeequipe1");
        assert_eq!(safe_stem(Some("call_2024-05-01.wav")), "call_2024-05-01");
        assert_eq!(safe_stem(Some("../../etc/passwd")), "passwd");
    }

    #[test]
    fn test_safe_stem_fallback() {
        assert_eq!(safe_stem(None), "audio");
        assert_eq!(safe_stem(Some("")), "audio");
        assert_eq!(safe_stem(Some("!!!.mp3")), "audio");
        assert_eq!(safe_stem(Some("   .wav")), "audio");
    }

    #[test]
    fn test_destination_path() {
        assert_eq!(destination_path("/", "a.mp3"), "/a.mp3");
        assert_eq!(destination_path("", "a.mp3"), "/a.mp3");
        assert_eq!(destination_path("/relay/", "a.mp3"), "/relay/a.mp3");
        assert_eq!(destination_path("relay", "a.mp3"), "/relay/a.mp3");
    }

    #[test]
    fn test_generate_reference() {
        let reference = generate_reference("dropbox");
        assert!(reference.starts_with("dropbox-"));
        assert_eq!(reference.len(), "dropbox-".len() + 8);
        assert!(reference["dropbox-".len()..]
            .chars()
            .all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_guess_mimetype() {
        assert_eq!(guess_mimetype("clip.MP4"), Some("video/mp4"));
        assert_eq!(guess_mimetype("voice.m4a"), Some("audio/mp4"));
        assert_eq!(guess_mimetype("notes.pdf"), None);
        assert_eq!(guess_mimetype("no_extension"), None);
    }
}
