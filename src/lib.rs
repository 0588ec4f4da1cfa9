pub mod capture;
pub mod config;
pub mod http;
pub mod recorder;
pub mod session;
pub mod transcribe;
pub mod transcript;

pub use capture::{
    AudioFrame, CaptureBackend, CaptureBackendConfig, CaptureBackendFactory, CaptureError,
    CaptureGrant, CaptureSession, CaptureSource, FileBackend, MediaTrack, TrackKind,
};
pub use config::Config;
pub use http::{create_router, AppState};
pub use recorder::{ChunkRecorder, RecorderState, Segment};
pub use session::{
    SessionConfig, SessionError, SessionEvent, SessionManager, SessionStats, SessionStatus,
    TranscriptionSession,
};
pub use transcribe::{DispatchError, Transcriber, WhisperClient};
pub use transcript::{
    FileStore, MemoryStore, TranscriptAssembler, TranscriptEntry, TranscriptStore, TRANSCRIPT_KEY,
};
