use serde::Serialize;

use crate::transcript::TranscriptEntry;

/// UI-facing session status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Idle,
    /// Waiting for the capture surface to be granted
    SelectingSource,
    Starting,
    Recording,
    Transcribing,
    Stopped,
    FailedToStart,
}

/// State-change events the UI surface subscribes to
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    StatusChanged { status: SessionStatus },
    ErrorOccurred { message: String },
    EntryAppended { entry: TranscriptEntry },
}
