use crate::constants::{CHANNELS, SAMPLE_RATE_HZ};
use crate::error::{RelayError, RelayResult};
use serde::Serialize;

/// Output parameters for every transcode. Only the bitrate is configurable;
/// sample rate and channel count are fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TranscodeSpec {
    bitrate_kbps: u32,
}

impl TranscodeSpec {
    pub fn new(bitrate_kbps: u32) -> RelayResult<Self> {
        if bitrate_kbps == 0 {
            return Err(RelayError::Config(
                "target bitrate must be greater than 0 kbps".to_string(),
            ));
        }
        Ok(Self { bitrate_kbps })
    }

    pub fn bitrate_kbps(&self) -> u32 {
        self.bitrate_kbps
    }

    pub fn sample_rate_hz(&self) -> u32 {
        SAMPLE_RATE_HZ
    }

    pub fn channels(&self) -> u8 {
        CHANNELS
    }

    /// Bitrate formatted for ffmpeg's `-b:a` flag, e.g. `64k`.
    pub fn ffmpeg_bitrate(&self) -> String {
        format!("{}k", self.bitrate_kbps)
    }
}
