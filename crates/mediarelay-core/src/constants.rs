//! Application-wide constants.

/// Default constant bitrate for transcoded MP3 output, in kbps.
pub const DEFAULT_TARGET_KBPS: u32 = 64;

/// Output sample rate. Fixed for every transcode.
pub const SAMPLE_RATE_HZ: u32 = 44_100;

/// Output channel count. Fixed for every transcode.
pub const CHANNELS: u8 = 2;

/// Largest file sent through the single-request upload path (150 MiB).
/// Files strictly larger go through a chunked upload session.
pub const SINGLE_UPLOAD_LIMIT_BYTES: u64 = 150 * 1024 * 1024;

/// Chunk size used by upload sessions (8 MiB).
pub const UPLOAD_CHUNK_SIZE: usize = 8 * 1024 * 1024;

/// Stem used when no safe characters remain in the original filename.
pub const FALLBACK_STEM: &str = "audio";

/// Status written to the processing record once a submission is accepted.
pub const STATUS_IN_PROGRESS: &str = "Em Andamento";

/// Extension of every published artifact.
pub const OUTPUT_EXTENSION: &str = "mp3";
