use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::capture::CaptureSource;

/// Configuration for a capture/transcription session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Unique session identifier (e.g. "capture-2025-11-02-standup")
    pub session_id: String,

    /// Where the audio comes from (OS device or WAV file)
    pub source: CaptureSource,

    /// Duration of each transcribed segment
    /// Default: 15 seconds
    pub chunk_duration: Duration,

    /// Preferred capture sample rate (the device's native rate is used when
    /// it cannot provide this one)
    pub sample_rate: u32,

    /// Preferred number of audio channels
    pub channels: u16,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: format!("capture-{}", uuid::Uuid::new_v4()),
            source: CaptureSource::Device(None),
            chunk_duration: Duration::from_secs(15),
            sample_rate: 16000, // Whisper expects 16kHz
            channels: 1,        // Mono
        }
    }
}
