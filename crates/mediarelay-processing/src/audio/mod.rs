//! Audio normalization module

pub mod strategy;
pub mod transcoder;

pub use strategy::TranscodeStrategy;
pub use transcoder::FfmpegTranscoder;
