//! Speaker / role diarization
//!
//! One contract, two strategies:
//! - `AcousticDiarizer`: coarse voice-activity segmentation over PCM energy
//!   (used when audio is available)
//! - `LexicalDiarizer`: interviewer phrase scoring over utterance text
//!   (captions only), with sticky role assignment
//!
//! Downstream components only see `SpeakerIdentifier`, so a stronger model
//! can be dropped in later.

mod acoustic;
mod lexical;
pub mod patterns;

pub use acoustic::AcousticDiarizer;
pub use lexical::{LexicalDiarizer, RoleAssignment};

use serde::{Deserialize, Serialize};

use crate::transcript::TranscriptSegment;

/// Diarization tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiarizationConfig {
    /// Lexical score an utterance needs before its speaker becomes the interviewer
    pub interviewer_threshold: f32,

    /// Normalized RMS energy (0.0 - 1.0) above which a window counts as speech
    pub energy_threshold: f32,

    /// Energy window length in milliseconds
    pub window_ms: u32,
}

impl Default for DiarizationConfig {
    fn default() -> Self {
        Self {
            interviewer_threshold: 1.0,
            energy_threshold: 0.02,
            window_ms: 100,
        }
    }
}

/// Conversation role of a speaker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Interviewer,
    Candidate,
    Unknown,
}

/// One speaker per session; created on first observation, updated per utterance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeakerProfile {
    pub speaker_id: String,
    pub is_interviewer: bool,
    /// Running mean of the speaker's normalized interviewer score
    pub confidence: f32,
    /// Matched catalogue patterns, for analytics only
    pub speaking_patterns: Vec<String>,
    /// Session-clock time of the speaker's latest utterance
    pub last_seen: u64,
    #[serde(skip)]
    utterances: u32,
}

impl SpeakerProfile {
    pub fn new(speaker_id: impl Into<String>, seen_at_ms: u64) -> Self {
        Self {
            speaker_id: speaker_id.into(),
            is_interviewer: false,
            confidence: 0.0,
            speaking_patterns: Vec::new(),
            last_seen: seen_at_ms,
            utterances: 0,
        }
    }

    fn record(&mut self, normalized_score: f32, patterns: &[&str], seen_at_ms: u64) {
        self.utterances += 1;
        self.confidence += (normalized_score - self.confidence) / self.utterances as f32;
        self.last_seen = self.last_seen.max(seen_at_ms);
        self.speaking_patterns
            .extend(patterns.iter().map(|p| p.to_string()));
    }
}

/// A span attributed to one speaker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeakerSegment {
    pub start_ms: u64,
    pub end_ms: u64,
    pub speaker_id: String,
    pub role: Role,
    pub confidence: f32,
}

/// What a diarizer can work from
#[derive(Debug, Clone, Copy)]
pub enum DiarizationSource<'a> {
    /// Mono 16-bit PCM
    Audio { samples: &'a [i16], sample_rate: u32 },
    /// Already-transcribed utterances with STT speaker labels
    Transcript(&'a [TranscriptSegment]),
}

/// Speaker identification contract
pub trait SpeakerIdentifier: Send {
    /// Attribute the source to speakers. Strategies return nothing for
    /// sources they cannot interpret.
    fn identify_speakers(&mut self, source: DiarizationSource<'_>) -> Vec<SpeakerSegment>;

    /// Strategy name for logging
    fn name(&self) -> &str;
}
