// OS audio device capture via cpal.
//
// Display/tab audio is captured from a loopback or monitor input device
// (e.g. PulseAudio "Monitor of ..." sources, virtual loopback drivers).
// The cpal stream is not Send, so it lives on a dedicated thread that feeds
// frames into a tokio channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleRate;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use super::backend::{
    AudioFrame, CaptureBackend, CaptureBackendConfig, CaptureError, CaptureGrant, TrackKind,
};
use super::session::MediaTrack;

/// How often the capture thread checks its stop flag
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// cpal-backed capture backend
pub struct DeviceBackend {
    device_name: Option<String>,
    config: CaptureBackendConfig,
}

impl DeviceBackend {
    pub fn new(device_name: Option<String>, config: CaptureBackendConfig) -> Self {
        Self {
            device_name,
            config,
        }
    }
}

#[async_trait::async_trait]
impl CaptureBackend for DeviceBackend {
    async fn request(&mut self) -> Result<CaptureGrant, CaptureError> {
        let label = self
            .device_name
            .clone()
            .unwrap_or_else(|| "default input".to_string());

        info!("Opening capture device: {}", label);

        let track = MediaTrack::new(TrackKind::Audio, label);
        let stop = track.stop_flag();

        let (frame_tx, frame_rx) = mpsc::channel(100);
        let (ready_tx, ready_rx) = oneshot::channel();

        let device_name = self.device_name.clone();
        let config = self.config.clone();

        std::thread::Builder::new()
            .name("tabscribe-capture".to_string())
            .spawn(move || capture_thread(device_name, config, frame_tx, stop, ready_tx))
            .map_err(|e| CaptureError::Denied(format!("Failed to spawn capture thread: {}", e)))?;

        // The thread reports back once the stream is playing (or refused)
        match ready_rx.await {
            Ok(Ok(())) => Ok(CaptureGrant {
                tracks: vec![track],
                frames: frame_rx,
            }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(CaptureError::Denied(
                "Capture thread exited before the stream started".to_string(),
            )),
        }
    }

    fn name(&self) -> &str {
        "cpal device"
    }
}

/// Find an audio input device by name
fn find_device_by_name(host: &cpal::Host, name: &str) -> Option<cpal::Device> {
    host.input_devices()
        .ok()?
        .find(|d| d.name().map(|n| n == name).unwrap_or(false))
}

/// Try to find a supported config with the preferred sample rate
fn find_config_with_sample_rate(
    device: &cpal::Device,
    target_rate: u32,
) -> Option<cpal::SupportedStreamConfig> {
    if let Ok(configs) = device.supported_input_configs() {
        for config_range in configs {
            let min_rate = config_range.min_sample_rate().0;
            let max_rate = config_range.max_sample_rate().0;
            if min_rate <= target_rate && target_rate <= max_rate {
                return Some(config_range.with_sample_rate(SampleRate(target_rate)));
            }
        }
    }
    None
}

/// Shared state for the stream callbacks: batches converted samples into
/// fixed-duration frames and hands them to the pipeline.
struct FrameBatcher {
    frame_tx: mpsc::Sender<AudioFrame>,
    pending: Mutex<Vec<i16>>,
    samples_per_frame: usize,
    sample_rate: u32,
    channels: u16,
    /// Total samples emitted so far, drives frame timestamps
    emitted: Mutex<u64>,
}

impl FrameBatcher {
    fn push(&self, samples: &[i16]) {
        let mut pending = match self.pending.lock() {
            Ok(p) => p,
            Err(_) => return,
        };
        pending.extend_from_slice(samples);

        while pending.len() >= self.samples_per_frame {
            let frame_samples: Vec<i16> = pending.drain(..self.samples_per_frame).collect();

            let timestamp_ms = {
                let mut emitted = match self.emitted.lock() {
                    Ok(e) => e,
                    Err(_) => return,
                };
                let ts = *emitted * 1000 / (self.sample_rate as u64 * self.channels as u64);
                *emitted += frame_samples.len() as u64;
                ts
            };

            let frame = AudioFrame {
                samples: frame_samples,
                sample_rate: self.sample_rate,
                channels: self.channels,
                timestamp_ms,
            };

            // The pipeline consumes frames continuously; a full channel means
            // it has stalled badly and dropping is the only option here.
            match self.frame_tx.try_send(frame) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!("Dropping audio frame, pipeline not keeping up");
                }
                // Consumer gone during teardown
                Err(mpsc::error::TrySendError::Closed(_)) => {}
            }
        }
    }
}

/// Dedicated capture thread: owns the cpal stream for its whole lifetime.
fn capture_thread(
    device_name: Option<String>,
    config: CaptureBackendConfig,
    frame_tx: mpsc::Sender<AudioFrame>,
    stop: Arc<AtomicBool>,
    ready_tx: oneshot::Sender<Result<(), CaptureError>>,
) {
    let host = cpal::default_host();
    debug!("Audio host: {:?}", host.id());

    let device = match &device_name {
        Some(name) => match find_device_by_name(&host, name) {
            Some(d) => d,
            None => {
                let _ = ready_tx.send(Err(CaptureError::Denied(format!(
                    "Capture device '{}' not found",
                    name
                ))));
                return;
            }
        },
        None => match host.default_input_device() {
            Some(d) => d,
            None => {
                let _ = ready_tx.send(Err(CaptureError::Denied(
                    "No capture device available".to_string(),
                )));
                return;
            }
        },
    };

    debug!(
        "Capture device: {}",
        device.name().unwrap_or_else(|_| "unknown".to_string())
    );

    // Prefer the configured rate when the device supports it natively,
    // otherwise capture at the device default (no resampling).
    let stream_config = match find_config_with_sample_rate(&device, config.sample_rate) {
        Some(c) => c,
        None => match device.default_input_config() {
            Ok(c) => {
                info!(
                    "Device does not support {}Hz, capturing at {}Hz",
                    config.sample_rate,
                    c.sample_rate().0
                );
                c
            }
            Err(e) => {
                let _ = ready_tx.send(Err(CaptureError::NoAudioTrack));
                error!("No usable input config: {}", e);
                return;
            }
        },
    };

    if stream_config.channels() == 0 {
        let _ = ready_tx.send(Err(CaptureError::NoAudioTrack));
        return;
    }

    let sample_rate = stream_config.sample_rate().0;
    let channels = stream_config.channels();
    let samples_per_frame =
        (sample_rate as u64 * channels as u64 * config.frame_duration_ms / 1000) as usize;

    let batcher = Arc::new(FrameBatcher {
        frame_tx,
        pending: Mutex::new(Vec::new()),
        samples_per_frame: samples_per_frame.max(1),
        sample_rate,
        channels,
        emitted: Mutex::new(0),
    });

    // A stream error ends the capture; the stop flag doubles as the signal
    let err_stop = Arc::clone(&stop);
    let err_fn = move |err: cpal::StreamError| {
        error!("Audio stream error: {}", err);
        err_stop.store(true, Ordering::SeqCst);
    };

    let stream = match stream_config.sample_format() {
        cpal::SampleFormat::F32 => {
            let batcher = Arc::clone(&batcher);
            device.build_input_stream(
                &stream_config.into(),
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let samples: Vec<i16> = data
                        .iter()
                        .map(|&s| (s * i16::MAX as f32).clamp(i16::MIN as f32, i16::MAX as f32) as i16)
                        .collect();
                    batcher.push(&samples);
                },
                err_fn,
                None,
            )
        }
        cpal::SampleFormat::I16 => {
            let batcher = Arc::clone(&batcher);
            device.build_input_stream(
                &stream_config.into(),
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    batcher.push(data);
                },
                err_fn,
                None,
            )
        }
        cpal::SampleFormat::U16 => {
            let batcher = Arc::clone(&batcher);
            device.build_input_stream(
                &stream_config.into(),
                move |data: &[u16], _: &cpal::InputCallbackInfo| {
                    let samples: Vec<i16> =
                        data.iter().map(|&s| (s as i32 - 32768) as i16).collect();
                    batcher.push(&samples);
                },
                err_fn,
                None,
            )
        }
        other => {
            let _ = ready_tx.send(Err(CaptureError::Denied(format!(
                "Unsupported sample format: {:?}",
                other
            ))));
            return;
        }
    };

    let stream = match stream {
        Ok(s) => s,
        Err(e) => {
            let _ = ready_tx.send(Err(CaptureError::Denied(format!(
                "Failed to open capture stream: {}",
                e
            ))));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready_tx.send(Err(CaptureError::Denied(format!(
            "Failed to start capture stream: {}",
            e
        ))));
        return;
    }

    info!(
        "Capture stream started ({}Hz, {} channels)",
        sample_rate, channels
    );
    let _ = ready_tx.send(Ok(()));

    while !stop.load(Ordering::SeqCst) {
        std::thread::sleep(STOP_POLL_INTERVAL);
    }

    // Dropping the stream releases the device; dropping the batcher (and with
    // it the frame sender) closes the pipeline's frame channel.
    drop(stream);
    info!("Capture stream stopped");
}
