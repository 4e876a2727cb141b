// Interviewer phrase catalogue
//
// Fixed lexical patterns used to score how "interviewer-like" an utterance
// is, plus the closing phrases an interviewer uses to hand the floor over.
// All matching is done on lowercased text.

use crate::captions::terminal_mark;

/// Weighted pattern family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    /// Utterance opens with a question stem ("how would you", "tell me about")
    QuestionStem,
    /// Topic transitions ("moving on", "next question")
    Transition,
    /// Interview management ("we have about", "any questions for me")
    Management,
    /// Utterance ends with a question mark
    QuestionMark,
}

impl PatternKind {
    pub fn weight(&self) -> f32 {
        match self {
            PatternKind::QuestionStem => 0.6,
            PatternKind::Transition => 0.5,
            PatternKind::Management => 0.4,
            PatternKind::QuestionMark => 0.5,
        }
    }
}

pub const QUESTION_STEMS: &[&str] = &[
    "tell me about",
    "tell me a time",
    "walk me through",
    "can you describe",
    "can you explain",
    "can you tell me",
    "could you describe",
    "could you explain",
    "could you walk",
    "how would you",
    "how do you",
    "how did you",
    "what would you",
    "what is your",
    "what's your",
    "what are",
    "what is",
    "why did you",
    "why would you",
    "describe a",
    "describe how",
    "explain how",
    "explain the",
    "have you ever",
    "give me an example",
    "do you have experience",
];

pub const TRANSITION_PHRASES: &[&str] = &[
    "moving on",
    "let's move on",
    "next question",
    "switching gears",
    "let's talk about",
    "i'd like to ask",
    "i want to ask",
    "my next question",
    "building on that",
    "let's dig into",
];

pub const MANAGEMENT_PHRASES: &[&str] = &[
    "we have about",
    "in the interest of time",
    "any questions for me",
    "thanks for joining",
    "thanks for your time",
    "let's get started",
    "we'll wrap up",
    "for this role",
    "on our team",
];

/// Phrases that hand the floor to the candidate; an explicit end of the question
pub const CLOSING_PHRASES: &[&str] = &[
    "go ahead",
    "take your time",
    "whenever you're ready",
    "when you're ready",
    "over to you",
    "the floor is yours",
    "curious to hear",
    "what do you think",
];

const QUESTION_MARKS: &[char] = &['?', '？', '؟'];

/// Score `text` against the catalogue. Returns the total weight and the
/// matched patterns (used to build up speaking patterns).
pub fn score_interviewer(text: &str) -> (f32, Vec<&'static str>) {
    let lower = text.trim().to_lowercase();
    let mut score = 0.0;
    let mut matched = Vec::new();

    if let Some(stem) = QUESTION_STEMS.iter().find(|stem| lower.starts_with(*stem)) {
        score += PatternKind::QuestionStem.weight();
        matched.push(*stem);
    }

    for (kind, phrases) in [
        (PatternKind::Transition, TRANSITION_PHRASES),
        (PatternKind::Management, MANAGEMENT_PHRASES),
    ] {
        for phrase in phrases.iter().filter(|p| lower.contains(*p)) {
            score += kind.weight();
            matched.push(*phrase);
        }
    }

    if ends_with_question_mark(&lower) {
        score += PatternKind::QuestionMark.weight();
        matched.push("?");
    }

    (score, matched)
}

/// Whether `text` reads as a question: a question mark or a question stem
pub fn is_question(text: &str) -> bool {
    let lower = text.trim().to_lowercase();
    ends_with_question_mark(&lower) || QUESTION_STEMS.iter().any(|stem| lower.starts_with(stem))
}

/// Whether `text` contains a floor-handing closing phrase
pub fn has_closing_phrase(text: &str) -> bool {
    let lower = text.to_lowercase();
    CLOSING_PHRASES.iter().any(|phrase| lower.contains(phrase))
}

fn ends_with_question_mark(text: &str) -> bool {
    terminal_mark(text).is_some_and(|mark| QUESTION_MARKS.contains(&mark))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_stem_and_mark_score() {
        let (score, matched) = score_interviewer("Tell me about a hard bug you fixed?");
        assert!((score - 1.1).abs() < 1e-6);
        assert_eq!(matched, vec!["tell me about", "?"]);
    }

    #[test]
    fn test_candidate_speech_scores_low() {
        let (score, matched) = score_interviewer("I mostly worked on the billing service.");
        assert_eq!(score, 0.0);
        assert!(matched.is_empty());
    }

    #[test]
    fn test_is_question() {
        assert!(is_question("Why did you pick Postgres"));
        assert!(is_question("And the rollout plan?"));
        assert!(is_question("是这样吗？"));
        assert!(is_question("Was it \"fast?\""));
        assert!(!is_question("I shipped it last week."));
    }

    #[test]
    fn test_closing_phrase() {
        assert!(has_closing_phrase("Take your time."));
        assert!(has_closing_phrase("Okay, go ahead"));
        assert!(!has_closing_phrase("I went ahead with it"));
    }
}
