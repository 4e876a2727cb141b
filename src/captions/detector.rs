// Question boundary detection
//
// Buffers caption tokens for one speaker stream and decides when the
// buffered text forms a complete utterance. Three triggers, checked after
// the incoming token is appended:
// - the buffer reached the max-character backstop
// - the token ends with terminal punctuation
// - the gap since the previous token fell in the natural-pause window,
//   or exceeded its upper bound
//
// A gap below the window's lower bound never fires on its own, so fast
// dictation is not fragmented.

use serde::{Deserialize, Serialize};

/// Terminal punctuation across the locales the STT service emits
const TERMINAL_PUNCTUATION: &[char] = &[
    '.', '?', '!', '…', // Latin
    '。', '？', '！', // CJK full-width
    '؟', // Arabic question mark
    '।', '॥', // Devanagari danda
];

/// Closing quotes/brackets that may trail the terminal mark
const TRAILING_CLOSERS: &[char] = &['"', '\'', ')', ']', '”', '’', '」', '』', '»'];

/// Configuration for the boundary detector
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Buffered length (in characters) that forces a flush
    pub max_chars: usize,

    /// Lower bound of the natural-pause window in milliseconds
    pub min_pause_ms: u64,

    /// Upper bound of the natural-pause window in milliseconds
    pub max_pause_ms: u64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            max_chars: 280,
            min_pause_ms: 700,
            max_pause_ms: 2000,
        }
    }
}

/// Why the detector fired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryReason {
    /// Max-character backstop; the speaker is probably still mid-sentence
    MaxLength,
    /// Token ended with terminal punctuation
    TerminalPunctuation,
    /// Gap fell inside the natural-pause window
    Pause,
    /// Gap exceeded the natural-pause window
    LongSilence,
    /// Explicit flush (session end, question timeout)
    Forced,
}

impl BoundaryReason {
    /// Whether this boundary marks the end of what the speaker meant to say.
    /// Backstop flushes only cap buffer size.
    pub fn ends_thought(&self) -> bool {
        !matches!(self, BoundaryReason::MaxLength)
    }
}

/// A completed utterance
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    pub started_at_ms: u64,
    pub ended_at_ms: u64,
    pub reason: BoundaryReason,
}

/// Turns a token stream into discrete utterances.
///
/// Deterministic for a fixed `(text, arrival_time)` sequence; the buffer is
/// the only state.
#[derive(Debug, Clone)]
pub struct QuestionBoundaryDetector {
    config: DetectorConfig,
    buffer: String,
    started_at_ms: Option<u64>,
    last_token_ms: Option<u64>,
}

impl QuestionBoundaryDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            buffer: String::new(),
            started_at_ms: None,
            last_token_ms: None,
        }
    }

    /// Feed one token. Returns the completed utterance if this token closed one.
    pub fn add_token(&mut self, text: &str, arrival_time_ms: u64) -> Option<Utterance> {
        let token = text.trim();
        if token.is_empty() {
            return None;
        }

        let gap_ms = self
            .last_token_ms
            .map(|last| arrival_time_ms.saturating_sub(last));

        if !self.buffer.is_empty() {
            self.buffer.push(' ');
        }
        self.buffer.push_str(token);
        self.started_at_ms.get_or_insert(arrival_time_ms);
        self.last_token_ms = Some(arrival_time_ms);

        let reason = if ends_with_terminal(token) {
            Some(BoundaryReason::TerminalPunctuation)
        } else if self.buffer.chars().count() >= self.config.max_chars {
            Some(BoundaryReason::MaxLength)
        } else {
            gap_ms.and_then(|gap| self.classify_gap(gap))
        };

        reason.map(|reason| self.take(reason))
    }

    /// Flush whatever is buffered, if anything
    pub fn flush(&mut self) -> Option<Utterance> {
        if self.buffer.is_empty() {
            return None;
        }
        Some(self.take(BoundaryReason::Forced))
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Buffered text not yet emitted
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    fn classify_gap(&self, gap_ms: u64) -> Option<BoundaryReason> {
        if gap_ms > self.config.max_pause_ms {
            Some(BoundaryReason::LongSilence)
        } else if gap_ms >= self.config.min_pause_ms {
            Some(BoundaryReason::Pause)
        } else {
            None
        }
    }

    fn take(&mut self, reason: BoundaryReason) -> Utterance {
        let started_at_ms = self.started_at_ms.take().unwrap_or_default();
        let ended_at_ms = self.last_token_ms.take().unwrap_or(started_at_ms);

        Utterance {
            text: std::mem::take(&mut self.buffer),
            started_at_ms,
            ended_at_ms,
            reason,
        }
    }
}

/// The terminal punctuation mark `text` ends with, ignoring trailing closers
pub(crate) fn terminal_mark(text: &str) -> Option<char> {
    text.trim_end()
        .trim_end_matches(TRAILING_CLOSERS)
        .chars()
        .last()
        .filter(|c| TERMINAL_PUNCTUATION.contains(c))
}

fn ends_with_terminal(text: &str) -> bool {
    terminal_mark(text).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> QuestionBoundaryDetector {
        QuestionBoundaryDetector::new(DetectorConfig::default())
    }

    #[test]
    fn test_question_fires_once_on_question_mark() {
        let mut det = detector();
        let tokens = ["Tell", "me", "about", "yourself?"];
        let mut fired = Vec::new();

        for (i, token) in tokens.iter().enumerate() {
            if let Some(utt) = det.add_token(token, i as u64 * 200) {
                fired.push(utt);
            }
        }

        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].text, "Tell me about yourself?");
        assert_eq!(fired[0].reason, BoundaryReason::TerminalPunctuation);
        assert_eq!(fired[0].started_at_ms, 0);
        assert_eq!(fired[0].ended_at_ms, 600);
        assert!(det.is_empty());
    }

    #[test]
    fn test_terminal_punctuation_always_empties_buffer() {
        let sequences: &[&[&str]] = &[
            &["Why", "Rust."],
            &["Really!"],
            &["你好吗？"],
            &["Is", "it", "\"done?\""],
            &["क्या", "आप", "तैयार", "हैं।"],
            &["Well…"],
        ];

        for seq in sequences {
            let mut det = detector();
            let mut last = None;
            for (i, token) in seq.iter().enumerate() {
                last = det.add_token(token, i as u64 * 50);
            }
            assert!(last.is_some(), "expected boundary for {:?}", seq);
            assert!(det.is_empty(), "buffer not empty after {:?}", seq);
        }
    }

    #[test]
    fn test_terminal_mark_skips_closers() {
        assert_eq!(terminal_mark("\"done?\" "), Some('?'));
        assert_eq!(terminal_mark("(see above)."), Some('.'));
        assert_eq!(terminal_mark("so the plan was"), None);
        assert!(ends_with_terminal("हैं।"));
        assert!(!ends_with_terminal("\")"));
    }

    #[test]
    fn test_fast_dictation_does_not_fragment() {
        let mut det = detector();
        for (i, token) in ["so", "the", "plan", "was", "to"].iter().enumerate() {
            assert!(det.add_token(token, i as u64 * 100).is_none());
        }
        assert_eq!(det.pending(), "so the plan was to");
    }

    #[test]
    fn test_natural_pause_fires() {
        let mut det = detector();
        assert!(det.add_token("walk", 0).is_none());
        assert!(det.add_token("me", 150).is_none());
        let utt = det.add_token("through", 1150).unwrap();
        assert_eq!(utt.text, "walk me through");
        assert_eq!(utt.reason, BoundaryReason::Pause);
    }

    #[test]
    fn test_long_silence_fires() {
        let mut det = detector();
        det.add_token("okay", 0);
        let utt = det.add_token("so", 5000).unwrap();
        assert_eq!(utt.reason, BoundaryReason::LongSilence);
        assert!(utt.reason.ends_thought());
    }

    #[test]
    fn test_max_chars_backstop() {
        let mut det = QuestionBoundaryDetector::new(DetectorConfig {
            max_chars: 12,
            ..DetectorConfig::default()
        });
        assert!(det.add_token("abcdef", 0).is_none());
        let utt = det.add_token("ghijkl", 10).unwrap();
        assert_eq!(utt.reason, BoundaryReason::MaxLength);
        assert!(!utt.reason.ends_thought());
    }

    #[test]
    fn test_blank_tokens_ignored() {
        let mut det = detector();
        assert!(det.add_token("   ", 0).is_none());
        assert!(det.is_empty());
        assert!(det.flush().is_none());
    }

    #[test]
    fn test_deterministic_replay() {
        let tokens = [("what", 0), ("is", 100), ("ownership", 900), ("in", 1000), ("Rust?", 1100)];
        let run = || {
            let mut det = detector();
            tokens
                .iter()
                .filter_map(|(t, ts)| det.add_token(t, *ts))
                .collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }
}
