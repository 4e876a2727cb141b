use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Structured pointer grounding part of an answer in retrievable evidence.
/// `source` and `uri` are both mandatory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub source: String,
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl Citation {
    pub fn new(source: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            uri: uri.into(),
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// A generated (or fallback) answer for one detected question.
///
/// Non-empty `answer_text` always carries at least one citation and
/// `confidence` is always within 0.0 - 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionAnswer {
    pub id: String,
    pub session_id: String,
    pub answer_text: String,
    pub citations: Vec<Citation>,
    pub confidence: f32,
    pub token_count: usize,
    pub latency_ms: u64,
    pub created_at: DateTime<Utc>,
}
