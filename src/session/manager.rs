use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{broadcast, Mutex};
use tracing::info;

use super::config::SessionConfig;
use super::events::SessionEvent;
use super::session::{SessionError, TranscriptionSession};
use super::stats::SessionStats;
use crate::transcribe::Transcriber;
use crate::transcript::TranscriptAssembler;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Owns the single active session and the transcript that outlives it.
///
/// Exactly one capture session may be active at a time; starting another
/// while one is live is rejected with `AlreadyActive`.
pub struct SessionManager {
    /// Template for new sessions; each start gets a fresh session id
    defaults: SessionConfig,
    transcriber: Arc<dyn Transcriber>,
    assembler: Arc<Mutex<TranscriptAssembler>>,
    active: Mutex<Option<Arc<TranscriptionSession>>>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionManager {
    pub fn new(
        defaults: SessionConfig,
        transcriber: Arc<dyn Transcriber>,
        assembler: TranscriptAssembler,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            defaults,
            transcriber,
            assembler: Arc::new(Mutex::new(assembler)),
            active: Mutex::new(None),
            events,
        }
    }

    /// Subscribe to session events (status changes, errors, new entries)
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Start a new capture session. Returns the new session's id.
    pub async fn start(&self) -> Result<String, SessionError> {
        let mut active = self.active.lock().await;

        if let Some(session) = active.as_ref() {
            if session.is_recording() {
                return Err(SessionError::AlreadyActive);
            }
        }

        let config = SessionConfig {
            session_id: format!("capture-{}", uuid::Uuid::new_v4()),
            ..self.defaults.clone()
        };
        let session_id = config.session_id.clone();

        info!("Creating capture session: {}", session_id);

        let session = Arc::new(TranscriptionSession::new(
            config,
            Arc::clone(&self.transcriber),
            Arc::clone(&self.assembler),
            self.events.clone(),
        ));

        session.start().await?;
        *active = Some(session);

        Ok(session_id)
    }

    /// Stop the active capture session and return its final stats
    pub async fn stop(&self) -> Result<SessionStats, SessionError> {
        let session = {
            let mut active = self.active.lock().await;
            active.take().ok_or(SessionError::NotActive)?
        };

        session.stop().await
    }

    /// Stats of the active session, if any
    pub async fn stats(&self) -> Option<SessionStats> {
        let active = self.active.lock().await;
        active.as_ref().map(|session| session.stats())
    }

    /// The current transcript, flattened for display
    pub async fn transcript(&self) -> String {
        let assembler = self.assembler.lock().await;
        assembler.snapshot()
    }

    /// Clear the transcript view (persisted storage is untouched until the
    /// next persist)
    pub async fn clear_transcript(&self) {
        let mut assembler = self.assembler.lock().await;
        assembler.clear();
    }

    /// Restore the previously persisted transcript into the assembler
    pub async fn restore_transcript(&self) -> Result<Option<String>> {
        let mut assembler = self.assembler.lock().await;
        assembler.restore()
    }

    /// Persist the current transcript (sessions also persist on stop; this
    /// covers service shutdown with no active session)
    pub async fn persist_transcript(&self) -> Result<()> {
        let assembler = self.assembler.lock().await;
        assembler.persist()
    }
}
