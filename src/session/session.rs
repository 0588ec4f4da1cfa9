use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::config::SessionConfig;
use super::events::{SessionEvent, SessionStatus};
use super::stats::SessionStats;
use crate::capture::{
    CaptureBackendConfig, CaptureBackendFactory, CaptureError, CaptureSession,
};
use crate::recorder::{ChunkRecorder, Segment};
use crate::transcribe::Transcriber;
use crate::transcript::TranscriptAssembler;

/// Errors raised by session start/stop operations
#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    /// A capture session is already active; it must be stopped first
    AlreadyActive,
    /// No capture session is active
    NotActive,
    /// The capture surface could not be acquired
    Capture(CaptureError),
    Internal(String),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::AlreadyActive => write!(f, "A capture session is already active"),
            SessionError::NotActive => write!(f, "No capture session is active"),
            SessionError::Capture(e) => write!(f, "{}", e),
            SessionError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<CaptureError> for SessionError {
    fn from(err: CaptureError) -> Self {
        SessionError::Capture(err)
    }
}

/// A capture/transcription session.
///
/// Owns the capture surface for its whole lifetime and drives the pipeline:
/// recorder task slicing frames into segments, dispatch task submitting each
/// segment and applying the result to the transcript. Dispatch is strictly
/// sequential: the dispatch task awaits every transcription to completion
/// before receiving the next segment, so entries land in exact
/// segment-emission order regardless of per-segment network latency.
pub struct TranscriptionSession {
    config: SessionConfig,

    transcriber: Arc<dyn Transcriber>,

    /// Shared transcript assembler (outlives the session)
    assembler: Arc<Mutex<TranscriptAssembler>>,

    /// Event fanout to the UI surface
    events: broadcast::Sender<SessionEvent>,

    /// When the session started
    started_at: chrono::DateTime<chrono::Utc>,

    /// Whether recording is currently active
    is_recording: Arc<AtomicBool>,

    /// Number of segments handed to the dispatcher
    segments_dispatched: Arc<AtomicUsize>,

    /// Number of transcript entries appended by this session
    entries_appended: Arc<AtomicUsize>,

    /// The acquired capture surface, released on stop
    capture: Mutex<Option<CaptureSession>>,

    /// Final-stop trigger for the recorder
    stop_tx: Mutex<Option<oneshot::Sender<()>>>,

    /// Handle for the recorder task
    recorder_task: Mutex<Option<JoinHandle<()>>>,

    /// Handle for the dispatch task
    dispatch_task: Mutex<Option<JoinHandle<()>>>,
}

impl TranscriptionSession {
    pub fn new(
        config: SessionConfig,
        transcriber: Arc<dyn Transcriber>,
        assembler: Arc<Mutex<TranscriptAssembler>>,
        events: broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self {
            config,
            transcriber,
            assembler,
            events,
            started_at: Utc::now(),
            is_recording: Arc::new(AtomicBool::new(false)),
            segments_dispatched: Arc::new(AtomicUsize::new(0)),
            entries_appended: Arc::new(AtomicUsize::new(0)),
            capture: Mutex::new(None),
            stop_tx: Mutex::new(None),
            recorder_task: Mutex::new(None),
            dispatch_task: Mutex::new(None),
        }
    }

    pub fn is_recording(&self) -> bool {
        self.is_recording.load(Ordering::SeqCst)
    }

    /// Acquire the capture surface and start the pipeline.
    ///
    /// Capture failures (`CaptureDenied`, `NoAudioTrack`) abort the start
    /// entirely: no task is spawned and every already-granted track is
    /// stopped.
    pub async fn start(&self) -> Result<(), SessionError> {
        if self.is_recording.swap(true, Ordering::SeqCst) {
            warn!("Session {} already recording", self.config.session_id);
            return Err(SessionError::AlreadyActive);
        }

        info!("Starting capture session: {}", self.config.session_id);

        // Elapsed-time base for transcript labels: wall clock from the start
        // request, not from the first chunk
        let started = Instant::now();

        self.emit_status(SessionStatus::SelectingSource);

        let backend_config = CaptureBackendConfig {
            sample_rate: self.config.sample_rate,
            channels: self.config.channels,
            ..CaptureBackendConfig::default()
        };

        let mut backend = CaptureBackendFactory::create(&self.config.source, backend_config)
            .map_err(|e| {
                self.is_recording.store(false, Ordering::SeqCst);
                SessionError::Internal(format!("Failed to create capture backend: {}", e))
            })?;

        let mut capture = match CaptureSession::acquire(backend.as_mut()).await {
            Ok(capture) => capture,
            Err(e) => {
                self.is_recording.store(false, Ordering::SeqCst);
                self.emit_error(format!("Capture error: {}", e));
                self.emit_status(SessionStatus::FailedToStart);
                return Err(e.into());
            }
        };

        self.emit_status(SessionStatus::Starting);

        let frames = capture.take_frames().ok_or_else(|| {
            self.is_recording.store(false, Ordering::SeqCst);
            SessionError::Internal("Capture session yielded no frame channel".to_string())
        })?;

        {
            let mut slot = self.capture.lock().await;
            *slot = Some(capture);
        }

        // Capacity 1: the recorder hands over a finalized segment only once
        // the previous one has been consumed by the dispatcher
        let (segment_tx, mut segment_rx) = mpsc::channel::<Segment>(1);
        let (stop_tx, stop_rx) = oneshot::channel();

        {
            let mut slot = self.stop_tx.lock().await;
            *slot = Some(stop_tx);
        }

        // Recorder task: frames in, finalized segments out
        let recorder = ChunkRecorder::new(self.config.chunk_duration);
        let session_id = self.config.session_id.clone();

        let recorder_task = tokio::spawn(async move {
            if let Err(e) = recorder.run(frames, segment_tx, stop_rx).await {
                error!("Recorder failed for session {}: {}", session_id, e);
            }
        });

        // Dispatch task: one segment in flight at a time, results applied
        // in emission order
        let transcriber = Arc::clone(&self.transcriber);
        let assembler = Arc::clone(&self.assembler);
        let events = self.events.clone();
        let is_recording = Arc::clone(&self.is_recording);
        let segments_dispatched = Arc::clone(&self.segments_dispatched);
        let entries_appended = Arc::clone(&self.entries_appended);

        let dispatch_task = tokio::spawn(async move {
            info!("Dispatch task started");

            while let Some(segment) = segment_rx.recv().await {
                let is_final = segment.is_final;

                let _ = events.send(SessionEvent::StatusChanged {
                    status: SessionStatus::Transcribing,
                });

                segments_dispatched.fetch_add(1, Ordering::SeqCst);

                match transcriber.transcribe(segment).await {
                    Ok(text) => {
                        let elapsed_secs = started.elapsed().as_secs();
                        let entry = {
                            let mut assembler = assembler.lock().await;
                            assembler.append(elapsed_secs, &text)
                        };
                        entries_appended.fetch_add(1, Ordering::SeqCst);
                        let _ = events.send(SessionEvent::EntryAppended { entry });
                    }
                    Err(e) => {
                        // A single failed chunk never halts the session
                        warn!("Segment dispatch failed: {}", e);
                        let _ = events.send(SessionEvent::ErrorOccurred {
                            message: format!("Transcription error: {}", e),
                        });
                    }
                }

                if !is_final && is_recording.load(Ordering::SeqCst) {
                    let _ = events.send(SessionEvent::StatusChanged {
                        status: SessionStatus::Recording,
                    });
                }
            }

            info!("Dispatch task stopped");
        });

        {
            let mut slot = self.recorder_task.lock().await;
            *slot = Some(recorder_task);
        }
        {
            let mut slot = self.dispatch_task.lock().await;
            *slot = Some(dispatch_task);
        }

        self.emit_status(SessionStatus::Recording);
        info!("Capture session started: {}", self.config.session_id);

        Ok(())
    }

    /// Request the final stop and tear the session down.
    ///
    /// Waits for the recorder's final flush and for the dispatcher to drain
    /// every emitted segment (an in-flight dispatch still lands in the
    /// transcript), then stops every capture track and persists the
    /// transcript.
    pub async fn stop(&self) -> Result<SessionStats, SessionError> {
        if !self.is_recording.swap(false, Ordering::SeqCst) {
            warn!("Session {} not recording", self.config.session_id);
            return Ok(self.stats());
        }

        info!("Stopping capture session: {}", self.config.session_id);

        if let Some(stop_tx) = self.stop_tx.lock().await.take() {
            let _ = stop_tx.send(());
        }

        // Recorder finishes its final flush first; the dispatcher then drains
        // the remaining segments before its channel closes
        if let Some(task) = self.recorder_task.lock().await.take() {
            if let Err(e) = task.await {
                error!("Recorder task panicked: {}", e);
            }
        }
        if let Some(task) = self.dispatch_task.lock().await.take() {
            if let Err(e) = task.await {
                error!("Dispatch task panicked: {}", e);
            }
        }

        // Every constituent track must be stopped before the session counts
        // as torn down
        if let Some(mut capture) = self.capture.lock().await.take() {
            capture.release();
        }

        {
            let assembler = self.assembler.lock().await;
            if let Err(e) = assembler.persist() {
                error!("Failed to persist transcript: {}", e);
                self.emit_error(format!("Persistence error: {}", e));
            }
        }

        self.emit_status(SessionStatus::Stopped);
        info!("Capture session stopped: {}", self.config.session_id);

        Ok(self.stats())
    }

    /// Current session statistics
    pub fn stats(&self) -> SessionStats {
        let duration = Utc::now().signed_duration_since(self.started_at);

        SessionStats {
            session_id: self.config.session_id.clone(),
            is_recording: self.is_recording.load(Ordering::SeqCst),
            started_at: self.started_at,
            duration_secs: duration.num_milliseconds() as f64 / 1000.0,
            segments_dispatched: self.segments_dispatched.load(Ordering::SeqCst),
            entries_appended: self.entries_appended.load(Ordering::SeqCst),
        }
    }

    fn emit_status(&self, status: SessionStatus) {
        let _ = self.events.send(SessionEvent::StatusChanged { status });
    }

    fn emit_error(&self, message: String) {
        let _ = self.events.send(SessionEvent::ErrorOccurred { message });
    }
}
