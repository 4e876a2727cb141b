use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use super::config::SessionConfig;
use super::session::CopilotSession;
use crate::ended::{EndedIds, ENDED_SESSION_CAPACITY};
use crate::error::{CopilotError, Result};

pub type SharedSession = Arc<Mutex<CopilotSession>>;

/// Session-keyed store of live detection state.
///
/// Each session sits behind its own lock, so sessions never contend with
/// each other. Ended ids are remembered and cannot be reopened, up to a
/// bounded number of most recent ones; an id forgotten after that may be
/// opened again as a new session.
pub struct SessionRegistry {
    /// Template for new sessions; only the id changes
    template: SessionConfig,
    sessions: RwLock<HashMap<String, SharedSession>>,
    closed: RwLock<EndedIds>,
}

impl SessionRegistry {
    pub fn new(template: SessionConfig) -> Self {
        Self::with_closed_capacity(template, ENDED_SESSION_CAPACITY)
    }

    pub fn with_closed_capacity(template: SessionConfig, capacity: usize) -> Self {
        Self {
            template,
            sessions: RwLock::new(HashMap::new()),
            closed: RwLock::new(EndedIds::new(capacity)),
        }
    }

    /// Open a session (generating an id if none is given). Opening a live
    /// session again is a no-op.
    pub async fn open(&self, session_id: Option<String>) -> Result<String> {
        let session_id = session_id.unwrap_or_else(|| format!("session-{}", uuid::Uuid::new_v4()));
        self.get_or_open(&session_id).await?;
        Ok(session_id)
    }

    /// Live session for `session_id`, opening it on first use
    pub async fn get_or_open(&self, session_id: &str) -> Result<SharedSession> {
        if let Some(session) = self.get(session_id).await {
            return Ok(session);
        }

        let mut sessions = self.sessions.write().await;
        if self.is_closed(session_id).await {
            return Err(CopilotError::SessionClosed(session_id.to_string()));
        }

        let session = sessions.entry(session_id.to_string()).or_insert_with(|| {
            info!("Opening session {}", session_id);
            Arc::new(Mutex::new(CopilotSession::new(
                self.template.clone().with_id(session_id),
            )))
        });
        Ok(Arc::clone(session))
    }

    pub async fn get(&self, session_id: &str) -> Option<SharedSession> {
        self.sessions.read().await.get(session_id).cloned()
    }

    /// Remove a live session and remember its id as ended
    pub async fn end(&self, session_id: &str) -> Result<SharedSession> {
        // Lock order: sessions, then closed
        let mut sessions = self.sessions.write().await;

        let Some(session) = sessions.remove(session_id) else {
            return Err(if self.is_closed(session_id).await {
                CopilotError::SessionClosed(session_id.to_string())
            } else {
                CopilotError::UnknownSession(session_id.to_string())
            });
        };

        if let Some(forgotten) = self.closed.write().await.insert(session_id) {
            debug!("Forgetting ended session {}", forgotten);
        }
        info!("Session {} ended", session_id);
        Ok(session)
    }

    pub async fn is_closed(&self, session_id: &str) -> bool {
        self.closed.read().await.contains(session_id)
    }

    /// Ids of live sessions, sorted
    pub async fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }
}
