use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CopilotError, Result};
use crate::transcript::TranscriptSegment;

/// A detected question waiting to be answered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerJob {
    /// Unique job identifier
    pub id: String,

    /// Session the question belongs to
    pub session_id: String,

    /// Transcript segment that completed the question
    pub segment_id: String,

    /// Full question text (may be empty; the service then uses the latest segment)
    pub question_text: String,

    /// Session-clock time the question completed
    pub timestamp_ms: u64,

    /// Wall-clock creation time, used for answer latency
    pub enqueued_at: DateTime<Utc>,

    /// The completing segment itself, which may not have reached the store yet
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segment: Option<TranscriptSegment>,
}

impl AnswerJob {
    pub fn new(
        session_id: impl Into<String>,
        segment_id: impl Into<String>,
        question_text: impl Into<String>,
        timestamp_ms: u64,
    ) -> Self {
        Self {
            id: format!("job-{}", uuid::Uuid::new_v4()),
            session_id: session_id.into(),
            segment_id: segment_id.into(),
            question_text: question_text.into(),
            timestamp_ms,
            enqueued_at: Utc::now(),
            segment: None,
        }
    }

    pub fn with_segment(mut self, segment: TranscriptSegment) -> Self {
        self.segment = Some(segment);
        self
    }

    /// Reject jobs that cannot be processed
    pub fn validate(&self) -> Result<()> {
        if self.session_id.trim().is_empty() {
            return Err(CopilotError::MalformedJob("missing session id".to_string()));
        }
        if self.question_text.trim().is_empty() && self.segment_id.trim().is_empty() {
            return Err(CopilotError::MalformedJob(format!(
                "job {} has neither question text nor segment",
                self.id
            )));
        }
        Ok(())
    }
}
