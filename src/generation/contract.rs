// Generator response contract
//
// Expected shape: {answer: string, citations: [{source, uri, note?}], confidence: number}
// Anything else is a contract violation and routes to the fallback answer.

use serde_json::{json, Value};
use std::collections::HashSet;
use thiserror::Error;

use super::Citation;

pub const FALLBACK_TEXT: &str = "Context is still loading for this question. \
     A grounded answer will follow once transcript and sources are available.";
pub const FALLBACK_CONFIDENCE: f32 = 0.1;
const FALLBACK_SOURCE: &str = "system";
const FALLBACK_URI: &str = "context://pending";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ContractViolation {
    #[error("generator call failed: {0}")]
    Generator(String),

    #[error("generator timed out after {0}ms")]
    Timeout(u64),

    #[error("response is not a JSON object")]
    NotAnObject,

    #[error("missing or non-string 'answer'")]
    MissingAnswer,

    #[error("empty answer")]
    EmptyAnswer,

    #[error("missing or non-array 'citations'")]
    MissingCitations,

    #[error("citation {index} invalid: {reason}")]
    InvalidCitation { index: usize, reason: &'static str },

    #[error("non-empty answer without citations")]
    NoCitations,

    #[error("no citation refers to a known source")]
    UngroundedCitations,
}

/// A response that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedAnswer {
    pub answer: String,
    pub citations: Vec<Citation>,
    pub confidence: f32,
}

/// JSON schema sent with every generator request
pub fn answer_schema() -> Value {
    json!({
        "type": "object",
        "required": ["answer", "citations", "confidence"],
        "additionalProperties": false,
        "properties": {
            "answer": { "type": "string" },
            "citations": {
                "type": "array",
                "minItems": 1,
                "items": {
                    "type": "object",
                    "required": ["source", "uri"],
                    "properties": {
                        "source": { "type": "string" },
                        "uri": { "type": "string" },
                        "note": { "type": "string" }
                    }
                }
            },
            "confidence": { "type": "number", "minimum": 0, "maximum": 1 }
        }
    })
}

/// Clamp any real into 0.0 - 1.0; NaN becomes 0.0
pub fn clamp_confidence(raw: f64) -> f32 {
    if raw.is_nan() {
        return 0.0;
    }
    raw.clamp(0.0, 1.0) as f32
}

fn parse_confidence(raw: Option<&Value>) -> f32 {
    let parsed = match raw {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.map(clamp_confidence).unwrap_or(0.0)
}

/// Validate a raw generator response.
///
/// `known_sources`, when given, restricts citations to those sources
/// (case-insensitive); citations to other sources are dropped and at least
/// one must remain.
pub fn validate_response(
    raw: &Value,
    known_sources: Option<&HashSet<String>>,
) -> Result<ValidatedAnswer, ContractViolation> {
    // Some generators return the JSON document as a string
    let reparsed;
    let raw = match raw {
        Value::String(text) => {
            reparsed = serde_json::from_str::<Value>(text).map_err(|_| ContractViolation::NotAnObject)?;
            &reparsed
        }
        other => other,
    };

    let object = raw.as_object().ok_or(ContractViolation::NotAnObject)?;

    let answer = object
        .get("answer")
        .and_then(Value::as_str)
        .ok_or(ContractViolation::MissingAnswer)?
        .trim()
        .to_string();
    if answer.is_empty() {
        return Err(ContractViolation::EmptyAnswer);
    }

    let raw_citations = object
        .get("citations")
        .and_then(Value::as_array)
        .ok_or(ContractViolation::MissingCitations)?;
    if raw_citations.is_empty() {
        return Err(ContractViolation::NoCitations);
    }

    let mut citations = Vec::with_capacity(raw_citations.len());
    for (index, entry) in raw_citations.iter().enumerate() {
        citations.push(parse_citation(index, entry)?);
    }

    if let Some(known) = known_sources {
        citations.retain(|c| known.contains(&c.source.to_lowercase()));
        if citations.is_empty() {
            return Err(ContractViolation::UngroundedCitations);
        }
    }

    Ok(ValidatedAnswer {
        answer,
        citations,
        confidence: parse_confidence(object.get("confidence")),
    })
}

fn parse_citation(index: usize, entry: &Value) -> Result<Citation, ContractViolation> {
    let field = |name: &str| {
        entry
            .get(name)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    };

    let source = field("source").ok_or(ContractViolation::InvalidCitation {
        index,
        reason: "missing source",
    })?;
    let uri = field("uri").ok_or(ContractViolation::InvalidCitation {
        index,
        reason: "missing uri",
    })?;

    Ok(Citation {
        source: source.to_string(),
        uri: uri.to_string(),
        note: field("note").map(str::to_string),
    })
}

/// Deterministic low-confidence answer used whenever the contract fails
pub fn fallback_answer() -> ValidatedAnswer {
    ValidatedAnswer {
        answer: FALLBACK_TEXT.to_string(),
        citations: vec![Citation::new(FALLBACK_SOURCE, FALLBACK_URI)
            .with_note("generator output unavailable or invalid")],
        confidence: FALLBACK_CONFIDENCE,
    }
}
