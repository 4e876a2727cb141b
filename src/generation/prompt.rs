// Prompt profiles
//
// The profile is chosen once per request from what context is actually
// available, then rendered by an exhaustive match.

use std::collections::HashSet;
use std::fmt::Write;

use crate::retrieval::AdapterResults;
use crate::transcript::TranscriptSegment;

const TRANSCRIPT_SOURCE: &str = "transcript";

const INSTRUCTIONS: &str = "You are assisting a candidate during a live interview. \
Answer the interviewer's question concisely and accurately. \
Respond with JSON matching the provided schema. \
Every answer must cite at least one source: use the section name below as `source` \
and the listed URI as `uri`.";

#[derive(Debug, Clone, Copy)]
pub enum PromptProfile<'a> {
    /// Retrieval returned evidence; cite it (and/or the transcript)
    Grounded {
        question: &'a str,
        transcript: &'a [TranscriptSegment],
        retrieval: &'a [AdapterResults],
    },
    /// No retrieval evidence; answer from the conversation itself
    TranscriptOnly {
        question: &'a str,
        transcript: &'a [TranscriptSegment],
    },
    /// Nothing but the question
    QuestionOnly { question: &'a str },
}

impl<'a> PromptProfile<'a> {
    pub fn select(
        question: &'a str,
        transcript: &'a [TranscriptSegment],
        retrieval: &'a [AdapterResults],
    ) -> Self {
        let has_evidence = retrieval.iter().any(|r| !r.results.is_empty());

        match (has_evidence, transcript.is_empty()) {
            (true, _) => PromptProfile::Grounded {
                question,
                transcript,
                retrieval,
            },
            (false, false) => PromptProfile::TranscriptOnly { question, transcript },
            (false, true) => PromptProfile::QuestionOnly { question },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PromptProfile::Grounded { .. } => "grounded",
            PromptProfile::TranscriptOnly { .. } => "transcript_only",
            PromptProfile::QuestionOnly { .. } => "question_only",
        }
    }

    /// Lowercased citation sources this prompt offers the generator
    pub fn known_sources(&self) -> HashSet<String> {
        let mut sources = HashSet::new();
        match self {
            PromptProfile::Grounded {
                transcript,
                retrieval,
                ..
            } => {
                if !transcript.is_empty() {
                    sources.insert(TRANSCRIPT_SOURCE.to_string());
                }
                sources.extend(
                    retrieval
                        .iter()
                        .filter(|r| !r.results.is_empty())
                        .map(|r| r.adapter.to_lowercase()),
                );
            }
            PromptProfile::TranscriptOnly { .. } => {
                sources.insert(TRANSCRIPT_SOURCE.to_string());
            }
            PromptProfile::QuestionOnly { .. } => {}
        }
        sources
    }

    pub fn render(&self) -> String {
        let mut prompt = String::from(INSTRUCTIONS);

        match self {
            PromptProfile::Grounded {
                question,
                transcript,
                retrieval,
            } => {
                render_transcript(&mut prompt, transcript);
                render_retrieval(&mut prompt, retrieval);
                render_question(&mut prompt, question);
            }
            PromptProfile::TranscriptOnly { question, transcript } => {
                render_transcript(&mut prompt, transcript);
                prompt.push_str("\n\nNo external sources matched; cite the transcript.");
                render_question(&mut prompt, question);
            }
            PromptProfile::QuestionOnly { question } => {
                prompt.push_str(
                    "\n\nNo transcript or external sources are available yet. \
                     If you cannot answer with a citation, return an empty citations list.",
                );
                render_question(&mut prompt, question);
            }
        }

        prompt
    }
}

fn render_transcript(prompt: &mut String, transcript: &[TranscriptSegment]) {
    if transcript.is_empty() {
        return;
    }

    let _ = write!(prompt, "\n\n## {} (uri: transcript://recent)\n", TRANSCRIPT_SOURCE);
    for segment in transcript {
        let secs = segment.ts_start_ms / 1000;
        let _ = writeln!(
            prompt,
            "[{:02}:{:02}] {}: {}",
            secs / 60,
            secs % 60,
            segment.speaker,
            segment.text
        );
    }
}

fn render_retrieval(prompt: &mut String, retrieval: &[AdapterResults]) {
    for bundle in retrieval.iter().filter(|r| !r.results.is_empty()) {
        let _ = write!(prompt, "\n## {}\n", bundle.adapter);
        for result in &bundle.results {
            let _ = writeln!(prompt, "- {} (uri: {}): {}", result.title, result.uri, result.snippet);
        }
    }
}

fn render_question(prompt: &mut String, question: &str) {
    let _ = write!(prompt, "\n\n## Question\n{}\n", question);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::SearchResult;

    fn bundle(adapter: &str, titles: &[&str]) -> AdapterResults {
        AdapterResults {
            adapter: adapter.to_string(),
            results: titles
                .iter()
                .map(|t| SearchResult {
                    title: t.to_string(),
                    uri: format!("https://example.test/{}", t),
                    snippet: "snippet".to_string(),
                })
                .collect(),
            failed: titles.is_empty(),
        }
    }

    #[test]
    fn test_profile_selection() {
        let transcript = vec![TranscriptSegment::new("spk_0", "How did you scale it?", 65_000, 66_000)];
        let with_hits = vec![bundle("tickets", &["PROJ-1"]), bundle("code", &[])];
        let no_hits = vec![bundle("code", &[])];

        assert_eq!(PromptProfile::select("q", &transcript, &with_hits).name(), "grounded");
        assert_eq!(PromptProfile::select("q", &transcript, &no_hits).name(), "transcript_only");
        assert_eq!(PromptProfile::select("q", &[], &no_hits).name(), "question_only");
    }

    #[test]
    fn test_known_sources_exclude_failed_adapters() {
        let transcript = vec![TranscriptSegment::new("spk_0", "hi", 0, 10)];
        let retrieval = vec![bundle("Tickets", &["PROJ-1"]), bundle("code", &[])];
        let sources = PromptProfile::select("q", &transcript, &retrieval).known_sources();

        assert!(sources.contains("tickets"));
        assert!(sources.contains("transcript"));
        assert!(!sources.contains("code"));
    }

    #[test]
    fn test_grounded_render_includes_everything() {
        let transcript = vec![TranscriptSegment::new("spk_0", "How did you scale it?", 65_000, 66_000)];
        let retrieval = vec![bundle("tickets", &["PROJ-1"])];
        let prompt = PromptProfile::select("How did you scale it?", &transcript, &retrieval).render();

        assert!(prompt.contains("[01:05] spk_0: How did you scale it?"));
        assert!(prompt.contains("## tickets"));
        assert!(prompt.contains("PROJ-1 (uri: https://example.test/PROJ-1)"));
        assert!(prompt.ends_with("## Question\nHow did you scale it?\n"));
    }
}
