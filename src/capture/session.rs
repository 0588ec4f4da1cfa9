use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::backend::{AudioFrame, CaptureBackend, CaptureError, TrackKind};

/// Handle to one constituent track of a capture grant.
///
/// Stopping a track signals its producer to shut down and release the
/// underlying platform resource (and with it the OS capture indicator).
/// Dropping the handle alone does NOT stop the producer.
#[derive(Debug, Clone)]
pub struct MediaTrack {
    kind: TrackKind,
    label: String,
    stopped: Arc<AtomicBool>,
}

impl MediaTrack {
    pub fn new(kind: TrackKind, label: impl Into<String>) -> Self {
        Self {
            kind,
            label: label.into(),
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Stop flag shared with the track's producer
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stopped)
    }

    /// Signal the producer to stop. Idempotent.
    pub fn stop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            debug!("Track stopped: {} ({:?})", self.label, self.kind);
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// An acquired capture surface.
///
/// Owns every granted track for the session's lifetime. Exactly one of these
/// exists per recording session; ownership moves into the pipeline on start
/// and the pipeline releases it on stop or on fatal error.
#[derive(Debug)]
pub struct CaptureSession {
    tracks: Vec<MediaTrack>,
    frames: Option<mpsc::Receiver<AudioFrame>>,
}

impl CaptureSession {
    /// Acquire a capture surface from the backend.
    ///
    /// The platform may only expose display/tab audio bundled with a video
    /// track; any video track in the grant is stopped immediately. Fails with
    /// `NoAudioTrack` when no audio track remains after that.
    pub async fn acquire(backend: &mut dyn CaptureBackend) -> Result<Self, CaptureError> {
        info!("Requesting capture grant from backend: {}", backend.name());

        let grant = backend.request().await?;

        let mut audio_tracks = Vec::new();
        for track in grant.tracks {
            match track.kind() {
                TrackKind::Video => {
                    // Only audio is ever wanted
                    track.stop();
                }
                TrackKind::Audio => audio_tracks.push(track),
            }
        }

        if audio_tracks.is_empty() {
            warn!("Capture grant carried no audio track");
            return Err(CaptureError::NoAudioTrack);
        }

        info!(
            "Capture session acquired ({} audio track(s))",
            audio_tracks.len()
        );

        Ok(Self {
            tracks: audio_tracks,
            frames: Some(grant.frames),
        })
    }

    /// Take the live frame receiver. Yields `None` after the first call.
    pub fn take_frames(&mut self) -> Option<mpsc::Receiver<AudioFrame>> {
        self.frames.take()
    }

    /// Stop every constituent track, releasing the platform capture surface.
    pub fn release(&mut self) {
        for track in &self.tracks {
            track.stop();
        }
        info!("Capture session released ({} track(s) stopped)", self.tracks.len());
    }

    pub fn is_released(&self) -> bool {
        self.tracks.iter().all(|t| t.is_stopped())
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        for track in &self.tracks {
            if !track.is_stopped() {
                warn!("Capture track still live on drop, stopping: {}", track.label());
                track.stop();
            }
        }
    }
}
