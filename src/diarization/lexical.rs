use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

use super::patterns::score_interviewer;
use super::{DiarizationConfig, DiarizationSource, Role, SpeakerIdentifier, SpeakerProfile, SpeakerSegment};

/// Session-scoped role assignment. Each id is set at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub interviewer_id: Option<String>,
    pub candidate_id: Option<String>,
}

impl RoleAssignment {
    pub fn role_of(&self, speaker: &str) -> Role {
        if self.interviewer_id.as_deref() == Some(speaker) {
            Role::Interviewer
        } else if self.candidate_id.as_deref() == Some(speaker) {
            Role::Candidate
        } else {
            Role::Unknown
        }
    }
}

/// Text-only diarizer: scores utterances against the interviewer catalogue.
///
/// The first speaker whose utterance clears the threshold becomes the
/// interviewer for the rest of the session; the first other speaker becomes
/// the candidate. Later evidence only feeds the profiles, never the roles.
#[derive(Debug, Clone)]
pub struct LexicalDiarizer {
    config: DiarizationConfig,
    roles: RoleAssignment,
    profiles: HashMap<String, SpeakerProfile>,
}

impl LexicalDiarizer {
    pub fn new(config: DiarizationConfig) -> Self {
        Self {
            config,
            roles: RoleAssignment::default(),
            profiles: HashMap::new(),
        }
    }

    /// Record one utterance and return the speaker's (possibly new) role
    pub fn observe(&mut self, speaker: &str, text: &str, seen_at_ms: u64) -> Role {
        let (score, patterns) = score_interviewer(text);
        let normalized = self.normalize(score);

        self.profiles
            .entry(speaker.to_string())
            .or_insert_with(|| SpeakerProfile::new(speaker, seen_at_ms))
            .record(normalized, &patterns, seen_at_ms);

        if self.roles.interviewer_id.is_none()
            && score >= self.config.interviewer_threshold
            && self.roles.candidate_id.as_deref() != Some(speaker)
        {
            info!("Speaker {} assigned interviewer role (score {:.2})", speaker, score);
            self.roles.interviewer_id = Some(speaker.to_string());
            if let Some(profile) = self.profiles.get_mut(speaker) {
                profile.is_interviewer = true;
            }
        }

        if self.roles.interviewer_id.is_some()
            && self.roles.candidate_id.is_none()
            && self.roles.interviewer_id.as_deref() != Some(speaker)
        {
            info!("Speaker {} assigned candidate role", speaker);
            self.roles.candidate_id = Some(speaker.to_string());
        }

        let role = self.roles.role_of(speaker);
        debug!("Utterance from {} scored {:.2} -> {:?}", speaker, score, role);
        role
    }

    pub fn role_of(&self, speaker: &str) -> Role {
        self.roles.role_of(speaker)
    }

    pub fn roles(&self) -> &RoleAssignment {
        &self.roles
    }

    pub fn profile(&self, speaker: &str) -> Option<&SpeakerProfile> {
        self.profiles.get(speaker)
    }

    pub fn profiles(&self) -> impl Iterator<Item = &SpeakerProfile> {
        self.profiles.values()
    }

    fn normalize(&self, score: f32) -> f32 {
        let scale = (self.config.interviewer_threshold * 2.0).max(f32::EPSILON);
        (score / scale).clamp(0.0, 1.0)
    }
}

impl SpeakerIdentifier for LexicalDiarizer {
    fn identify_speakers(&mut self, source: DiarizationSource<'_>) -> Vec<SpeakerSegment> {
        let DiarizationSource::Transcript(segments) = source else {
            return Vec::new();
        };

        segments
            .iter()
            .map(|segment| {
                let role = self.observe(&segment.speaker, &segment.text, segment.ts_end_ms);
                let confidence = self
                    .profiles
                    .get(&segment.speaker)
                    .map(|p| match role {
                        Role::Interviewer => p.confidence,
                        _ => 1.0 - p.confidence,
                    })
                    .unwrap_or_default();

                SpeakerSegment {
                    start_ms: segment.ts_start_ms,
                    end_ms: segment.ts_end_ms,
                    speaker_id: segment.speaker.clone(),
                    role,
                    confidence,
                }
            })
            .collect()
    }

    fn name(&self) -> &str {
        "lexical"
    }
}
