use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::flow::FlowState;

/// Statistics about a copilot session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub session_id: String,

    /// When the session was opened
    pub started_at: DateTime<Utc>,

    /// Wall-clock age in seconds
    pub duration_secs: f64,

    /// Current interview flow state
    pub flow_state: FlowState,

    /// Sticky role assignment, once known
    pub interviewer_id: Option<String>,
    pub candidate_id: Option<String>,

    /// Distinct speakers observed
    pub speakers: usize,

    /// Transcript segments produced by the boundary detector
    pub segments: usize,

    /// Questions that reached `response_pending`
    pub questions_detected: usize,

    /// Answers published for this session
    pub answers_delivered: usize,

    /// Open question text while the flow is `question_active`
    pub pending_question: Option<String>,
}
