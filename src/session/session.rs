use super::config::SessionConfig;
use super::stats::SessionStats;
use crate::captions::{CaptionChunk, QuestionBoundaryDetector, Utterance};
use crate::diarization::{LexicalDiarizer, SpeakerProfile};
use crate::flow::{FlowEvent, InterviewFlow};
use crate::queue::AnswerJob;
use crate::transcript::TranscriptSegment;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::{debug, info};

/// What one caption chunk produced
#[derive(Debug, Clone, Default)]
pub struct IngestOutcome {
    /// Completed transcript segments, in completion order
    pub segments: Vec<TranscriptSegment>,

    /// Answer job for a question that just completed
    pub job: Option<AnswerJob>,
}

/// Per-session detection state: one boundary detector per speaker stream,
/// the session's role assignment and its interview flow.
///
/// Everything here is synchronous and in-memory; the caller owns I/O.
pub struct CopilotSession {
    /// Session configuration
    config: SessionConfig,

    /// When the session was opened
    started_at: DateTime<Utc>,

    /// Boundary detector per STT speaker label
    detectors: HashMap<String, QuestionBoundaryDetector>,

    /// Speaker of the previous chunk; a turn change closes the old speaker's buffer
    last_speaker: Option<String>,

    /// Sticky interviewer / candidate assignment
    diarizer: LexicalDiarizer,

    /// Question flow state machine
    flow: InterviewFlow,

    segments: usize,
    questions_detected: usize,
    answers_delivered: usize,

    /// Set by session end; a closed session accepts no more captions
    closed: bool,
}

impl CopilotSession {
    pub fn new(config: SessionConfig) -> Self {
        info!("Creating copilot session: {}", config.session_id);

        Self {
            diarizer: LexicalDiarizer::new(config.diarization.clone()),
            flow: InterviewFlow::new(config.flow.clone()),
            config,
            started_at: Utc::now(),
            detectors: HashMap::new(),
            last_speaker: None,
            segments: 0,
            questions_detected: 0,
            answers_delivered: 0,
            closed: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.config.session_id
    }

    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Feed one caption chunk through detection, diarization and flow
    pub fn ingest(&mut self, chunk: &CaptionChunk) -> IngestOutcome {
        let mut outcome = IngestOutcome::default();

        // Speaker turn: whatever the previous speaker left buffered is complete
        let turn_changed = self
            .last_speaker
            .as_deref()
            .is_some_and(|previous| previous != chunk.speaker);
        if turn_changed {
            if let Some(previous) = self.last_speaker.take() {
                let flushed = self
                    .detectors
                    .get_mut(&previous)
                    .and_then(QuestionBoundaryDetector::flush);
                if let Some(utterance) = flushed {
                    self.on_utterance(&previous, utterance, &mut outcome);
                }
            }
        }
        self.last_speaker = Some(chunk.speaker.clone());

        let detector_config = &self.config.detector;
        let completed = self
            .detectors
            .entry(chunk.speaker.clone())
            .or_insert_with(|| QuestionBoundaryDetector::new(detector_config.clone()))
            .add_token(&chunk.text, chunk.timestamp_ms);

        if let Some(utterance) = completed {
            self.on_utterance(&chunk.speaker, utterance, &mut outcome);
        }

        outcome
    }

    /// Flush every speaker's buffer (session end). Questions completed here
    /// are not turned into jobs.
    pub fn flush(&mut self) -> Vec<TranscriptSegment> {
        let mut outcome = IngestOutcome::default();

        let mut speakers: Vec<String> = self.detectors.keys().cloned().collect();
        speakers.sort();
        for speaker in speakers {
            let flushed = self
                .detectors
                .get_mut(&speaker)
                .and_then(QuestionBoundaryDetector::flush);
            if let Some(utterance) = flushed {
                self.on_utterance(&speaker, utterance, &mut outcome);
            }
        }

        if let Some(job) = outcome.job {
            debug!("Dropping question completed at session end: {}", job.question_text);
        }
        outcome.segments
    }

    /// The job for the pending question finished. `delivered` is false when
    /// it failed or could not be queued; either way the flow starts waiting
    /// for the next question.
    pub fn on_job_finished(&mut self, delivered: bool) {
        if delivered {
            self.answers_delivered += 1;
        }
        if !self.flow.on_answer_delivered() {
            debug!(
                "Session {} finished a job with no pending question",
                self.config.session_id
            );
        }
    }

    pub fn profiles(&self) -> Vec<SpeakerProfile> {
        let mut profiles: Vec<SpeakerProfile> = self.diarizer.profiles().cloned().collect();
        profiles.sort_by(|a, b| a.speaker_id.cmp(&b.speaker_id));
        profiles
    }

    /// Get current session statistics
    pub fn stats(&self) -> SessionStats {
        let duration = Utc::now().signed_duration_since(self.started_at);
        let roles = self.diarizer.roles();

        SessionStats {
            session_id: self.config.session_id.clone(),
            started_at: self.started_at,
            duration_secs: duration.num_milliseconds() as f64 / 1000.0,
            flow_state: self.flow.state(),
            interviewer_id: roles.interviewer_id.clone(),
            candidate_id: roles.candidate_id.clone(),
            speakers: self.diarizer.profiles().count(),
            segments: self.segments,
            questions_detected: self.questions_detected,
            answers_delivered: self.answers_delivered,
            pending_question: self.flow.pending_question(),
        }
    }

    fn on_utterance(&mut self, speaker: &str, utterance: Utterance, outcome: &mut IngestOutcome) {
        let segment = TranscriptSegment::from_utterance(speaker, &utterance);
        self.segments += 1;

        let role = self
            .diarizer
            .observe(speaker, &segment.text, segment.ts_end_ms);
        let event = self.flow.on_segment(role, &segment, utterance.reason);
        debug!(
            "Segment {} from {} ({:?}, {:?}): {:?}",
            segment.id, speaker, role, utterance.reason, event
        );

        if let FlowEvent::QuestionCompleted(question) = event {
            self.questions_detected += 1;
            outcome.job = Some(
                AnswerJob::new(
                    self.config.session_id.clone(),
                    question.segment_id,
                    question.text,
                    question.timestamp_ms,
                )
                .with_segment(segment.clone()),
            );
        }

        outcome.segments.push(segment);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::FlowState;

    fn feed(session: &mut CopilotSession, speaker: &str, words: &str, start_ms: u64) -> IngestOutcome {
        let mut combined = IngestOutcome::default();
        for (i, word) in words.split_whitespace().enumerate() {
            let outcome = session.ingest(&CaptionChunk::new(speaker, word, start_ms + i as u64 * 150));
            combined.segments.extend(outcome.segments);
            combined.job = combined.job.or(outcome.job);
        }
        combined
    }

    #[test]
    fn test_question_produces_job() {
        let mut session = CopilotSession::new(SessionConfig::default().with_id("s1"));

        let outcome = feed(&mut session, "spk_0", "Can you tell me about your last project?", 0);
        assert_eq!(outcome.segments.len(), 1);

        let job = outcome.job.expect("question should produce a job");
        assert_eq!(job.session_id, "s1");
        assert_eq!(job.question_text, "Can you tell me about your last project?");
        assert_eq!(job.segment_id, outcome.segments[0].id);

        let stats = session.stats();
        assert_eq!(stats.flow_state, FlowState::ResponsePending);
        assert_eq!(stats.interviewer_id.as_deref(), Some("spk_0"));
        assert_eq!(stats.questions_detected, 1);

        session.on_job_finished(true);
        assert_eq!(session.stats().flow_state, FlowState::Waiting);
        assert_eq!(session.stats().answers_delivered, 1);
    }

    #[test]
    fn test_candidate_speech_is_not_a_question() {
        let mut session = CopilotSession::new(SessionConfig::default().with_id("s1"));

        feed(&mut session, "spk_0", "Tell me about yourself?", 0);
        session.on_job_finished(true);

        let outcome = feed(&mut session, "spk_1", "Why did I pick Rust? Mostly for safety.", 2_000);
        assert!(outcome.job.is_none());
        assert_eq!(session.stats().candidate_id.as_deref(), Some("spk_1"));
    }

    #[test]
    fn test_turn_change_closes_previous_buffer() {
        let mut session = CopilotSession::new(SessionConfig::default().with_id("s1"));

        feed(&mut session, "spk_0", "Tell me about yourself?", 0);
        session.on_job_finished(true);

        // No punctuation; the candidate starting to talk ends the question
        feed(&mut session, "spk_0", "tell me about the hardest bug you fixed", 2_000);
        let outcome = session.ingest(&CaptionChunk::new("spk_1", "Sure", 3_300));

        assert_eq!(outcome.segments.len(), 1);
        assert_eq!(outcome.segments[0].speaker, "spk_0");
        let job = outcome.job.expect("turn change should complete the question");
        assert_eq!(job.question_text, "tell me about the hardest bug you fixed");
    }

    #[test]
    fn test_flush_returns_buffered_segments_without_job() {
        let mut session = CopilotSession::new(SessionConfig::default().with_id("s1"));

        feed(&mut session, "spk_0", "what would you change about", 0);
        let segments = session.flush();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "what would you change about");
        assert!(session.flush().is_empty());
    }

    #[test]
    fn test_follow_up_question_gets_its_own_job() {
        let mut session = CopilotSession::new(SessionConfig::default().with_id("s1"));

        let first = feed(&mut session, "spk_0", "Why did you pick Rust?", 0);
        let first = first.job.expect("first question should produce a job");

        // Asked before the first answer arrives
        let second = feed(&mut session, "spk_0", "How do you test it?", 1_500);
        let second = second.job.expect("follow-up should produce a job");
        assert_eq!(second.question_text, "How do you test it?");
        assert_ne!(first.segment_id, second.segment_id);
        assert_eq!(second.segment.as_ref().map(|s| s.text.as_str()), Some("How do you test it?"));

        assert_eq!(session.stats().questions_detected, 2);
        session.on_job_finished(true);
        assert_eq!(session.stats().flow_state, FlowState::ResponsePending);
        session.on_job_finished(true);
        assert_eq!(session.stats().flow_state, FlowState::Waiting);
        assert_eq!(session.stats().answers_delivered, 2);
    }
}
