//! Grounded answer generation
//!
//! For each answer job: assemble context (cached or stored transcript window
//! plus retrieval results), build a prompt, call the external generator under
//! a strict schema, validate its citations, persist, and publish. Generator
//! failures of any kind are replaced by a fixed low-confidence fallback so
//! every detected question gets exactly one answer.

mod answer;
mod contract;
mod prompt;
mod service;

pub use answer::{Citation, SessionAnswer};
pub use contract::{
    answer_schema, clamp_confidence, fallback_answer, validate_response, ContractViolation,
    ValidatedAnswer, FALLBACK_CONFIDENCE, FALLBACK_TEXT,
};
pub use prompt::PromptProfile;
pub use service::AnswerService;

use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Transcript window (ending at the newest segment) sent with the question
    pub context_window_secs: u64,

    /// Results requested from each retrieval adapter
    pub top_k: usize,

    /// Per-adapter timeout
    pub adapter_timeout_ms: u64,

    /// Generator call timeout
    pub generator_timeout_ms: u64,

    /// Query used when no keywords can be extracted
    pub default_query: String,

    /// Reject citations whose source is neither a retrieval adapter that
    /// returned results nor the transcript
    pub strict_citations: bool,

    /// Optional JSON corpus for the history adapter
    pub history_corpus: Option<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            context_window_secs: 120,
            top_k: 3,
            adapter_timeout_ms: 2_000,
            generator_timeout_ms: 15_000,
            default_query: "interview context".to_string(),
            strict_citations: true,
            history_corpus: None,
        }
    }
}

/// Request handed to the external generator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorRequest {
    pub prompt: String,
    /// JSON schema the response must satisfy
    pub schema: serde_json::Value,
}

/// The external large-language-model call. Returns the raw response; the
/// service validates it against the schema.
#[async_trait::async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn generate(&self, request: &GeneratorRequest) -> Result<serde_json::Value>;

    fn name(&self) -> &str;
}
