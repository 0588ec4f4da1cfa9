pub mod backend;
pub mod device;
pub mod file;
pub mod session;

pub use backend::{
    AudioFrame, CaptureBackend, CaptureBackendConfig, CaptureBackendFactory, CaptureError,
    CaptureGrant, CaptureSource, TrackKind,
};
pub use file::FileBackend;
pub use session::{CaptureSession, MediaTrack};
