//! Mediarelay Media Processing Library
//!
//! Normalizes arbitrary audio or video input into a constant-bitrate MP3
//! using ffmpeg.

pub mod audio;
pub mod traits;

// Re-export commonly used types
pub use audio::{FfmpegTranscoder, TranscodeStrategy};
pub use traits::{TranscodeError, Transcoder};
