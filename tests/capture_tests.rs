// Integration tests for capture acquisition and track ownership
//
// These tests verify that bundled video tracks are discarded on acquire,
// that grants without audio are rejected, and that releasing a session
// stops every constituent track.

use std::path::Path;

use anyhow::Result;
use tabscribe::{
    AudioFrame, CaptureBackend, CaptureBackendConfig, CaptureError, CaptureGrant, CaptureSession,
    FileBackend, MediaTrack, TrackKind,
};
use tempfile::TempDir;
use tokio::sync::mpsc;

/// Backend handing out a scripted set of tracks; keeps clones so tests can
/// observe their stop flags after the session takes ownership
struct ScriptedBackend {
    kinds: Vec<TrackKind>,
    granted: Vec<MediaTrack>,
}

impl ScriptedBackend {
    fn new(kinds: Vec<TrackKind>) -> Self {
        Self {
            kinds,
            granted: Vec::new(),
        }
    }
}

#[async_trait::async_trait]
impl CaptureBackend for ScriptedBackend {
    async fn request(&mut self) -> Result<CaptureGrant, CaptureError> {
        let tracks: Vec<MediaTrack> = self
            .kinds
            .iter()
            .map(|&kind| MediaTrack::new(kind, format!("{:?} track", kind)))
            .collect();

        self.granted = tracks.clone();

        let (_tx, rx) = mpsc::channel::<AudioFrame>(8);
        Ok(CaptureGrant { tracks, frames: rx })
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

fn write_fixture(path: &Path, millis: u64) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)?;
    for i in 0..(16 * millis) {
        writer.write_sample((i % 64) as i16)?;
    }
    writer.finalize()?;

    Ok(())
}

#[tokio::test]
async fn test_bundled_video_track_is_stopped_on_acquire() -> Result<()> {
    let mut backend = ScriptedBackend::new(vec![TrackKind::Video, TrackKind::Audio]);

    let session = CaptureSession::acquire(&mut backend).await?;

    let video = &backend.granted[0];
    let audio = &backend.granted[1];

    assert!(video.is_stopped(), "Video tracks are never wanted");
    assert!(!audio.is_stopped(), "The audio track stays live for the session");

    drop(session);
    Ok(())
}

#[tokio::test]
async fn test_grant_without_audio_is_rejected() {
    let mut backend = ScriptedBackend::new(vec![TrackKind::Video]);

    let err = CaptureSession::acquire(&mut backend)
        .await
        .expect_err("a video-only grant has no usable audio");

    assert_eq!(err, CaptureError::NoAudioTrack);
    assert!(
        backend.granted[0].is_stopped(),
        "Even a rejected grant must not leak its video track"
    );
}

#[tokio::test]
async fn test_empty_grant_is_rejected() {
    let mut backend = ScriptedBackend::new(vec![]);

    let err = CaptureSession::acquire(&mut backend)
        .await
        .expect_err("an empty grant has no audio");

    assert_eq!(err, CaptureError::NoAudioTrack);
}

#[tokio::test]
async fn test_release_stops_every_track() -> Result<()> {
    let mut backend = ScriptedBackend::new(vec![TrackKind::Audio, TrackKind::Audio]);

    let mut session = CaptureSession::acquire(&mut backend).await?;
    assert!(!session.is_released());

    session.release();

    assert!(session.is_released());
    for track in &backend.granted {
        assert!(track.is_stopped(), "Release must stop every constituent track");
    }

    Ok(())
}

#[tokio::test]
async fn test_dropping_a_session_stops_its_tracks() -> Result<()> {
    let mut backend = ScriptedBackend::new(vec![TrackKind::Audio]);

    {
        let _session = CaptureSession::acquire(&mut backend).await?;
    }

    assert!(backend.granted[0].is_stopped());
    Ok(())
}

#[tokio::test]
async fn test_frames_can_only_be_taken_once() -> Result<()> {
    let mut backend = ScriptedBackend::new(vec![TrackKind::Audio]);

    let mut session = CaptureSession::acquire(&mut backend).await?;
    assert!(session.take_frames().is_some());
    assert!(session.take_frames().is_none(), "The frame channel has one consumer");

    Ok(())
}

#[test]
fn test_track_stop_is_idempotent() {
    let track = MediaTrack::new(TrackKind::Audio, "loopback");

    assert!(!track.is_stopped());
    track.stop();
    track.stop();
    assert!(track.is_stopped());
}

#[tokio::test]
async fn test_file_backend_missing_file_is_denied() {
    let temp_dir = TempDir::new().expect("temp dir");
    let missing = temp_dir.path().join("missing.wav");

    let mut backend = FileBackend::unpaced(missing, CaptureBackendConfig::default());

    let err = backend.request().await.expect_err("missing file cannot be captured");
    assert!(matches!(err, CaptureError::Denied(_)));
}

#[tokio::test]
async fn test_file_backend_streams_the_whole_file() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let fixture = temp_dir.path().join("capture.wav");
    write_fixture(&fixture, 2000)?;

    let mut backend = FileBackend::unpaced(fixture, CaptureBackendConfig::default());
    let mut grant = backend.request().await?;

    assert_eq!(grant.tracks.len(), 1);
    assert_eq!(grant.tracks[0].kind(), TrackKind::Audio);

    let mut total_samples = 0usize;
    let mut last_timestamp = 0u64;
    while let Some(frame) = grant.frames.recv().await {
        assert_eq!(frame.sample_rate, 16000);
        assert_eq!(frame.channels, 1);
        assert!(frame.timestamp_ms >= last_timestamp, "Timestamps must not run backwards");
        last_timestamp = frame.timestamp_ms;
        total_samples += frame.samples.len();
    }

    assert_eq!(total_samples, 16000 * 2, "Every sample in the file is delivered");

    Ok(())
}

#[tokio::test]
async fn test_stopping_the_track_halts_file_streaming() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let fixture = temp_dir.path().join("capture.wav");
    // Longer than the frame channel can buffer, so the producer is still
    // running when the track is stopped
    write_fixture(&fixture, 15000)?;

    let mut backend = FileBackend::unpaced(fixture, CaptureBackendConfig::default());
    let mut grant = backend.request().await?;

    grant.tracks[0].stop();

    let mut frames = 0usize;
    while grant.frames.recv().await.is_some() {
        frames += 1;
    }

    assert!(
        frames < 150,
        "Producer must stop early once the track is stopped, got {} frames",
        frames
    );

    Ok(())
}

#[test]
fn test_capture_backend_config_default() {
    let config = CaptureBackendConfig::default();

    assert_eq!(config.sample_rate, 16000, "Default should be 16kHz for Whisper");
    assert_eq!(config.channels, 1, "Default should be mono");
    assert_eq!(config.frame_duration_ms, 100, "Default frame should be 100ms");
}

#[test]
fn test_capture_error_messages() {
    assert_eq!(
        CaptureError::Denied("user canceled".to_string()).to_string(),
        "Capture denied: user canceled"
    );
    assert_eq!(CaptureError::NoAudioTrack.to_string(), "No audio track available");
}
