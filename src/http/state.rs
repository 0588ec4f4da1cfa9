use std::sync::Arc;

use crate::session::SessionManager;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Session manager owning the single active session and the transcript
    pub manager: Arc<SessionManager>,
}

impl AppState {
    pub fn new(manager: Arc<SessionManager>) -> Self {
        Self { manager }
    }
}
