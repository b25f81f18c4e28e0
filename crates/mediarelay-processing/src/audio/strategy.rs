//! ffmpeg argument construction per input classification.

use mediarelay_core::{MediaKind, TranscodeSpec};
use std::path::Path;

/// How an input container is turned into MP3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscodeStrategy {
    /// Video containers: drop every non-audio stream and encode the audio
    /// track straight to MP3.
    ExtractAudio,
    /// Audio inputs, MP3 included: always decode and re-encode so the output
    /// size depends only on duration and the target bitrate.
    Reencode,
}

impl TranscodeStrategy {
    pub fn for_kind(kind: MediaKind) -> Self {
        match kind {
            MediaKind::Video => TranscodeStrategy::ExtractAudio,
            MediaKind::Audio => TranscodeStrategy::Reencode,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TranscodeStrategy::ExtractAudio => "extract_audio",
            TranscodeStrategy::Reencode => "reencode",
        }
    }

    /// Full ffmpeg argument list (without the program name).
    pub fn ffmpeg_args(&self, input: &Path, output: &Path, spec: TranscodeSpec) -> Vec<String> {
        let mut args = vec![
            "-hide_banner".to_string(),
            "-nostdin".to_string(),
            "-y".to_string(),
            "-i".to_string(),
            input.to_string_lossy().to_string(),
        ];

        match self {
            TranscodeStrategy::ExtractAudio => {
                // No video, subtitle or data streams in the output
                args.extend_from_slice(&["-vn".to_string(), "-sn".to_string(), "-dn".to_string()]);
            }
            TranscodeStrategy::Reencode => {
                // First audio stream only; embedded cover art is a video stream
                args.extend_from_slice(&[
                    "-map".to_string(),
                    "0:a:0".to_string(),
                    "-vn".to_string(),
                ]);
            }
        }

        args.extend_from_slice(&[
            "-acodec".to_string(),
            "libmp3lame".to_string(),
            "-ar".to_string(),
            spec.sample_rate_hz().to_string(),
            "-ac".to_string(),
            spec.channels().to_string(),
            "-b:a".to_string(),
            spec.ffmpeg_bitrate(),
            "-f".to_string(),
            "mp3".to_string(),
            output.to_string_lossy().to_string(),
        ]);

        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn test_strategy_selection() {
        assert_eq!(
            TranscodeStrategy::for_kind(MediaKind::Video),
            TranscodeStrategy::ExtractAudio
        );
        assert_eq!(
            TranscodeStrategy::for_kind(MediaKind::Audio),
            TranscodeStrategy::Reencode
        );
    }

    #[test]
    fn test_video_args_strip_video_and_set_bitrate() {
        let spec = TranscodeSpec::new(64).unwrap();
        let args = TranscodeStrategy::ExtractAudio.ffmpeg_args(
            &PathBuf::from("/work/orig.mp4"),
            &PathBuf::from("/work/final.mp3"),
            spec,
        );

        assert!(args.contains(&"-vn".to_string()));
        assert!(!args.iter().any(|a| a == "-c:v" || a == "-vcodec"));
        assert_eq!(value_after(&args, "-b:a"), Some("64k"));
        assert_eq!(value_after(&args, "-ar"), Some("44100"));
        assert_eq!(value_after(&args, "-ac"), Some("2"));
        assert_eq!(value_after(&args, "-acodec"), Some("libmp3lame"));
        assert_eq!(value_after(&args, "-i"), Some("/work/orig.mp4"));
        assert_eq!(args.last().map(String::as_str), Some("/work/final.mp3"));
    }

    #[test]
    fn test_mp3_input_is_still_reencoded() {
        let spec = TranscodeSpec::new(128).unwrap();
        let args = TranscodeStrategy::Reencode.ffmpeg_args(
            &PathBuf::from("/work/orig.mp3"),
            &PathBuf::from("/work/final.mp3"),
            spec,
        );

        // Never a stream copy, always an explicit encoder at the target bitrate
        assert!(!args.iter().any(|a| a == "copy"));
        assert_eq!(value_after(&args, "-acodec"), Some("libmp3lame"));
        assert_eq!(value_after(&args, "-b:a"), Some("128k"));
        assert_eq!(value_after(&args, "-map"), Some("0:a:0"));
        assert!(args.contains(&"-vn".to_string()));
    }

    #[test]
    fn test_output_is_overwritten_not_appended() {
        let spec = TranscodeSpec::new(64).unwrap();
        let args = TranscodeStrategy::Reencode.ffmpeg_args(
            &PathBuf::from("in.wav"),
            &PathBuf::from("out.mp3"),
            spec,
        );
        assert!(args.contains(&"-y".to_string()));
        assert!(args.contains(&"-nostdin".to_string()));
    }
}
