//! HTTP control API (the UI surface)
//!
//! This module provides a REST API for controlling the capture pipeline:
//! - POST /capture/start - Start a capture session
//! - POST /capture/stop - Stop the active session
//! - GET /status - Query session status
//! - GET /transcript - Get the accumulated transcript
//! - POST /transcript/clear - Clear the transcript view
//! - GET /events - Server-sent session events
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
