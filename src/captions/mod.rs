//! Caption stream input
//!
//! Captions arrive as small per-speaker text tokens from the STT service.
//! They are never persisted; the boundary detector folds them into
//! completed utterances which become transcript segments.

mod detector;

pub(crate) use detector::terminal_mark;
pub use detector::{BoundaryReason, DetectorConfig, QuestionBoundaryDetector, Utterance};

use serde::{Deserialize, Serialize};

/// One token (or short run of tokens) emitted by the STT service for a speaker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionChunk {
    /// Speaker label assigned by the STT service (e.g., "spk_0")
    pub speaker: String,

    /// Caption text
    pub text: String,

    /// Arrival time in milliseconds on the session clock
    pub timestamp_ms: u64,
}

impl CaptionChunk {
    pub fn new(speaker: impl Into<String>, text: impl Into<String>, timestamp_ms: u64) -> Self {
        Self {
            speaker: speaker.into(),
            text: text.into(),
            timestamp_ms,
        }
    }
}
