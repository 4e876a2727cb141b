//! Transcript segments: completed utterances attributed to one speaker.

use serde::{Deserialize, Serialize};

use crate::captions::Utterance;

/// A time-bounded span of transcript text from one speaker.
/// Append-only per session, ordered by `ts_start_ms`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub id: String,
    pub speaker: String,
    pub text: String,
    pub ts_start_ms: u64,
    pub ts_end_ms: u64,
}

impl TranscriptSegment {
    pub fn new(speaker: impl Into<String>, text: impl Into<String>, ts_start_ms: u64, ts_end_ms: u64) -> Self {
        Self {
            id: format!("seg-{}", uuid::Uuid::new_v4()),
            speaker: speaker.into(),
            text: text.into(),
            ts_start_ms,
            ts_end_ms,
        }
    }

    pub fn from_utterance(speaker: &str, utterance: &Utterance) -> Self {
        Self::new(
            speaker,
            utterance.text.clone(),
            utterance.started_at_ms,
            utterance.ended_at_ms,
        )
    }
}

/// Keep only segments inside the last `window_ms` ending at the newest segment.
/// Input must be ordered by `ts_start_ms`.
pub fn window_segments(segments: &[TranscriptSegment], window_ms: u64) -> Vec<TranscriptSegment> {
    let Some(newest_end) = segments.iter().map(|s| s.ts_end_ms).max() else {
        return Vec::new();
    };
    let cutoff = newest_end.saturating_sub(window_ms);

    segments
        .iter()
        .filter(|s| s.ts_end_ms >= cutoff)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_ends_at_newest_segment() {
        let segments = vec![
            TranscriptSegment::new("a", "old", 0, 1_000),
            TranscriptSegment::new("b", "middle", 50_000, 52_000),
            TranscriptSegment::new("a", "newest", 100_000, 101_000),
        ];

        let windowed = window_segments(&segments, 60_000);
        let texts: Vec<_> = windowed.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["middle", "newest"]);
    }

    #[test]
    fn test_window_of_empty_input() {
        assert!(window_segments(&[], 1_000).is_empty());
    }
}
