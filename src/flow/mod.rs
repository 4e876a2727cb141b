//! Interview flow state machine
//!
//! Decides when a complete, answerable question exists:
//! `Waiting -> QuestionActive -> ResponsePending -> Waiting`.
//!
//! A follow-up question may start and complete while an earlier answer is
//! still pending; each completed question yields its own job and the flow
//! returns to `Waiting` once every outstanding answer is delivered.
//!
//! Without an ending signal the flow stays in `QuestionActive`, unless a
//! question timeout is configured.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::captions::BoundaryReason;
use crate::diarization::patterns::{has_closing_phrase, is_question};
use crate::diarization::Role;
use crate::transcript::TranscriptSegment;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Force-complete a question this long after it started (session clock).
    /// Unset keeps the question open until an ending signal arrives.
    pub question_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowState {
    Waiting,
    QuestionActive,
    ResponsePending,
}

/// A question ready to be answered
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedQuestion {
    pub text: String,
    /// Segment that completed the question
    pub segment_id: String,
    /// Session-clock time the question completed
    pub timestamp_ms: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FlowEvent {
    /// Segment did not change the flow
    Ignored,
    /// Interviewer started a question that is still open
    QuestionStarted,
    /// Another interviewer chunk was added to the open question
    QuestionExtended,
    /// The question is complete; an answer job should be queued
    QuestionCompleted(CompletedQuestion),
}

#[derive(Debug, Clone)]
pub struct InterviewFlow {
    config: FlowConfig,
    /// Chunks of the open question; empty when no question is open
    pending: Vec<String>,
    question_started_ms: u64,
    /// Completed questions whose answers have not been delivered yet
    outstanding: usize,
}

impl InterviewFlow {
    pub fn new(config: FlowConfig) -> Self {
        Self {
            config,
            pending: Vec::new(),
            question_started_ms: 0,
            outstanding: 0,
        }
    }

    pub fn state(&self) -> FlowState {
        if !self.pending.is_empty() {
            FlowState::QuestionActive
        } else if self.outstanding > 0 {
            FlowState::ResponsePending
        } else {
            FlowState::Waiting
        }
    }

    /// Text of the open question, if any
    pub fn pending_question(&self) -> Option<String> {
        (!self.pending.is_empty()).then(|| self.pending.join(" "))
    }

    /// Answers still owed for completed questions
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// Feed one attributed segment along with the boundary that produced it
    pub fn on_segment(
        &mut self,
        role: Role,
        segment: &TranscriptSegment,
        boundary: BoundaryReason,
    ) -> FlowEvent {
        if self.pending.is_empty() {
            if role != Role::Interviewer || !is_question(&segment.text) {
                return FlowEvent::Ignored;
            }

            debug!(
                "Question started ({} answers outstanding): {}",
                self.outstanding, segment.text
            );
            self.question_started_ms = segment.ts_start_ms;
            self.pending = vec![segment.text.clone()];

            return if ends_question(segment, boundary) {
                FlowEvent::QuestionCompleted(self.complete(segment))
            } else {
                FlowEvent::QuestionStarted
            };
        }

        if role == Role::Interviewer {
            self.pending.push(segment.text.clone());
            if ends_question(segment, boundary) {
                return FlowEvent::QuestionCompleted(self.complete(segment));
            }
            if !self.timed_out(segment.ts_end_ms) {
                return FlowEvent::QuestionExtended;
            }
        } else if !self.timed_out(segment.ts_end_ms) {
            return FlowEvent::Ignored;
        }

        info!(
            "Question open for over {:?}ms, forcing completion",
            self.config.question_timeout_ms
        );
        FlowEvent::QuestionCompleted(self.complete(segment))
    }

    /// The answer for the oldest outstanding question was delivered (or
    /// given up on). Returns false when no answer was owed.
    pub fn on_answer_delivered(&mut self) -> bool {
        if self.outstanding == 0 {
            return false;
        }
        self.outstanding -= 1;
        true
    }

    fn timed_out(&self, now_ms: u64) -> bool {
        self.config
            .question_timeout_ms
            .is_some_and(|timeout| now_ms.saturating_sub(self.question_started_ms) >= timeout)
    }

    fn complete(&mut self, segment: &TranscriptSegment) -> CompletedQuestion {
        self.outstanding += 1;
        let text = std::mem::take(&mut self.pending).join(" ");
        info!("Question complete: {}", text);

        CompletedQuestion {
            text,
            segment_id: segment.id.clone(),
            timestamp_ms: segment.ts_end_ms,
        }
    }
}

fn ends_question(segment: &TranscriptSegment, boundary: BoundaryReason) -> bool {
    boundary.ends_thought() || has_closing_phrase(&segment.text)
}
