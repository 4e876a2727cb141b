use crate::session::Copilot;
use std::sync::Arc;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// The running pipeline (sessions, answers, listeners)
    pub copilot: Arc<Copilot>,
}

impl AppState {
    pub fn new(copilot: Arc<Copilot>) -> Self {
        Self { copilot }
    }
}
