// WAV file capture backend, for tests, demos, and batch transcription.

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::time::Duration;

use hound::WavReader;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::backend::{
    AudioFrame, CaptureBackend, CaptureBackendConfig, CaptureError, CaptureGrant, TrackKind,
};
use super::session::MediaTrack;

/// Capture backend that streams frames out of a WAV file
pub struct FileBackend {
    path: PathBuf,
    config: CaptureBackendConfig,
    /// Pace frame delivery at real time (live-pipeline behavior) instead of
    /// streaming as fast as the consumer accepts (tests/batch)
    paced: bool,
}

impl FileBackend {
    pub fn paced(path: PathBuf, config: CaptureBackendConfig) -> Self {
        Self {
            path,
            config,
            paced: true,
        }
    }

    pub fn unpaced(path: PathBuf, config: CaptureBackendConfig) -> Self {
        Self {
            path,
            config,
            paced: false,
        }
    }
}

#[async_trait::async_trait]
impl CaptureBackend for FileBackend {
    async fn request(&mut self) -> Result<CaptureGrant, CaptureError> {
        info!("Opening capture file: {}", self.path.display());

        let reader = WavReader::open(&self.path)
            .map_err(|e| CaptureError::Denied(format!("Failed to open WAV file: {}", e)))?;

        let spec = reader.spec();
        if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
            return Err(CaptureError::Denied(format!(
                "Unsupported WAV format: {:?} {}-bit (expected 16-bit int PCM)",
                spec.sample_format, spec.bits_per_sample
            )));
        }

        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| CaptureError::Denied(format!("Failed to read WAV samples: {}", e)))?;

        debug!(
            "Capture file loaded: {} samples, {}Hz, {} channels",
            samples.len(),
            spec.sample_rate,
            spec.channels
        );

        let track = MediaTrack::new(TrackKind::Audio, self.path.display().to_string());
        let stop = track.stop_flag();

        let (tx, rx) = mpsc::channel(100);

        let samples_per_frame = (spec.sample_rate as u64
            * spec.channels as u64
            * self.config.frame_duration_ms
            / 1000)
            .max(1) as usize;
        let frame_duration = Duration::from_millis(self.config.frame_duration_ms);
        let paced = self.paced;
        let sample_rate = spec.sample_rate;
        let channels = spec.channels;

        tokio::spawn(async move {
            let mut timestamp_ms = 0u64;

            for chunk in samples.chunks(samples_per_frame) {
                if stop.load(Ordering::SeqCst) {
                    break;
                }

                let frame = AudioFrame {
                    samples: chunk.to_vec(),
                    sample_rate,
                    channels,
                    timestamp_ms,
                };
                timestamp_ms +=
                    chunk.len() as u64 * 1000 / (sample_rate as u64 * channels as u64);

                if tx.send(frame).await.is_err() {
                    break; // consumer gone
                }

                if paced {
                    tokio::time::sleep(frame_duration).await;
                }
            }

            debug!("Capture file drained");
            // tx drops here, closing the frame channel
        });

        Ok(CaptureGrant {
            tracks: vec![track],
            frames: rx,
        })
    }

    fn name(&self) -> &str {
        "WAV file"
    }
}
