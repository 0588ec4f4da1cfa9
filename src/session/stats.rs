use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Statistics about a capture/transcription session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    /// Session identifier
    pub session_id: String,

    /// Whether recording is currently active
    pub is_recording: bool,

    /// When the session started
    pub started_at: DateTime<Utc>,

    /// Total duration in seconds
    pub duration_secs: f64,

    /// Number of segments handed to the transcription dispatcher
    pub segments_dispatched: usize,

    /// Number of transcript entries appended
    pub entries_appended: usize,
}
