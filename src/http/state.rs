use crate::session::SessionManager;
use std::sync::Arc;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// The one session manager of this process
    pub manager: Arc<SessionManager>,
}

impl AppState {
    pub fn new(manager: Arc<SessionManager>) -> Self {
        Self { manager }
    }
}
