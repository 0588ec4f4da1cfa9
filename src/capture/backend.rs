use std::fmt;
use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Audio sample data (16-bit PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

/// Kind of a granted media track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Audio,
    Video,
}

/// Errors raised while acquiring a capture surface
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureError {
    /// The user refused the capture prompt, or no capture surface could be opened
    Denied(String),
    /// The granted surface carries no audio track
    NoAudioTrack,
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::Denied(reason) => write!(f, "Capture denied: {}", reason),
            CaptureError::NoAudioTrack => write!(f, "No audio track available"),
        }
    }
}

impl std::error::Error for CaptureError {}

/// Configuration for capture backends
#[derive(Debug, Clone)]
pub struct CaptureBackendConfig {
    /// Preferred sample rate (used if the device supports it natively; no resampling)
    pub sample_rate: u32,
    /// Preferred channel count
    pub channels: u16,
    /// Frame batching size in milliseconds
    pub frame_duration_ms: u64,
}

impl Default for CaptureBackendConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000, // 16kHz preferred for Whisper
            channels: 1,        // Mono
            frame_duration_ms: 100,
        }
    }
}

/// What the platform granted: the constituent media tracks plus the live
/// audio frame channel. Video tracks may be bundled in even though only
/// audio is wanted; the capture session stops them immediately.
#[derive(Debug)]
pub struct CaptureGrant {
    pub tracks: Vec<super::session::MediaTrack>,
    pub frames: mpsc::Receiver<AudioFrame>,
}

/// Capture surface backend trait
///
/// Implementations:
/// - Device: OS audio device via cpal (loopback/monitor source for display audio)
/// - File: WAV file source (for testing/batch processing)
#[async_trait::async_trait]
pub trait CaptureBackend: Send {
    /// Request a capture grant from the platform.
    ///
    /// This is the interactive/fallible step: it fails with `Denied` when the
    /// surface cannot be opened and `NoAudioTrack` when the surface exposes
    /// no usable audio input.
    async fn request(&mut self) -> Result<CaptureGrant, CaptureError>;

    /// Backend name for logging
    fn name(&self) -> &str;
}

/// Capture source type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CaptureSource {
    /// OS audio device by name, or the platform default when `None`
    Device(Option<String>),
    /// WAV file input (for testing/batch processing)
    File(PathBuf),
}

/// Capture backend factory
pub struct CaptureBackendFactory;

impl CaptureBackendFactory {
    /// Create a capture backend for the given source
    pub fn create(
        source: &CaptureSource,
        config: CaptureBackendConfig,
    ) -> Result<Box<dyn CaptureBackend>> {
        match source {
            CaptureSource::Device(name) => {
                let backend = super::device::DeviceBackend::new(name.clone(), config);
                Ok(Box::new(backend))
            }
            CaptureSource::File(path) => {
                // Batch semantics: stream the file as fast as the pipeline
                // accepts it. Demos wanting live pacing construct
                // `FileBackend::paced` directly.
                let backend = super::file::FileBackend::unpaced(path.clone(), config);
                Ok(Box::new(backend))
            }
        }
    }
}
