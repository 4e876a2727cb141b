use serde::{Deserialize, Serialize};

use crate::captions::CaptionChunk;

/// Caption message received from the STT service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionMessage {
    pub session_id: String,
    /// STT speaker label
    pub speaker: String,
    pub text: String,
    /// Milliseconds on the session clock
    pub timestamp_ms: u64,
    /// Interim hypothesis; superseded by a later final caption
    #[serde(default)]
    pub partial: bool,
}

impl CaptionMessage {
    pub fn to_chunk(&self) -> CaptionChunk {
        CaptionChunk::new(self.speaker.clone(), self.text.clone(), self.timestamp_ms)
    }
}
