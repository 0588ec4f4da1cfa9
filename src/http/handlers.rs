use std::convert::Infallible;

use axum::{
    extract::State,
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    response::{IntoResponse, Json},
};
use serde::Serialize;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{error, info};

use super::state::AppState;
use crate::session::{SessionError, SessionStats};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct StartCaptureResponse {
    pub session_id: String,
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct StopCaptureResponse {
    pub status: String,
    pub message: String,
    pub stats: SessionStats,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub recording: bool,
    pub stats: Option<SessionStats>,
}

#[derive(Debug, Serialize)]
pub struct TranscriptResponse {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(err: &SessionError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match err {
        SessionError::AlreadyActive | SessionError::NotActive => StatusCode::CONFLICT,
        SessionError::Capture(_) => StatusCode::BAD_GATEWAY,
        SessionError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /capture/start
/// Start a new capture session
pub async fn start_capture(State(state): State<AppState>) -> impl IntoResponse {
    match state.manager.start().await {
        Ok(session_id) => {
            info!("Capture started: {}", session_id);
            (
                StatusCode::OK,
                Json(StartCaptureResponse {
                    session_id: session_id.clone(),
                    status: "recording".to_string(),
                    message: format!("Capture started for session {}", session_id),
                }),
            )
                .into_response()
        }
        Err(e) => {
            error!("Failed to start capture: {}", e);
            error_response(&e).into_response()
        }
    }
}

/// POST /capture/stop
/// Stop the active capture session
pub async fn stop_capture(State(state): State<AppState>) -> impl IntoResponse {
    match state.manager.stop().await {
        Ok(stats) => {
            info!("Capture stopped: {}", stats.session_id);
            (
                StatusCode::OK,
                Json(StopCaptureResponse {
                    status: "stopped".to_string(),
                    message: "Capture stopped".to_string(),
                    stats,
                }),
            )
                .into_response()
        }
        Err(e) => {
            error!("Failed to stop capture: {}", e);
            error_response(&e).into_response()
        }
    }
}

/// GET /status
/// Status of the active session, if any
pub async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    let stats = state.manager.stats().await;

    Json(StatusResponse {
        recording: stats.as_ref().map(|s| s.is_recording).unwrap_or(false),
        stats,
    })
}

/// GET /transcript
/// The accumulated transcript, flattened for display
pub async fn get_transcript(State(state): State<AppState>) -> impl IntoResponse {
    Json(TranscriptResponse {
        text: state.manager.transcript().await,
    })
}

/// POST /transcript/clear
/// Clear the transcript view
pub async fn clear_transcript(State(state): State<AppState>) -> impl IntoResponse {
    state.manager.clear_transcript().await;
    StatusCode::OK
}

/// GET /events
/// Server-sent events stream of session status/error/entry events
pub async fn events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = state.manager.subscribe();

    let stream = BroadcastStream::new(receiver).filter_map(|result| match result {
        Ok(event) => Event::default().json_data(&event).ok().map(Ok),
        // Lagged subscribers skip missed events rather than erroring out
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
