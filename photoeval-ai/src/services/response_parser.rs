//! Tolerant extraction of `{score, comment}` from model text
//!
//! Models wrap their JSON in markdown fences, surround it with prose, or break
//! lines inside string literals. Extraction tries, in order:
//! 1. Strip a leading fence (with optional language tag) and a trailing fence
//! 2. Decode the cleaned text directly
//! 3. Decode the span from the first `{` to the last `}` with whitespace runs
//!    collapsed to single spaces
//!
//! Every failure path resolves to `None`; nothing here panics or errors.

use serde_json::{Map, Value};

use crate::models::{EvalValue, Evaluation, UNPARSEABLE_COMMENT};

const FENCE: &str = "```";

/// Fields pulled out of a decoded model answer
///
/// Either field may be missing; defaults are applied by [`into_evaluation`].
///
/// [`into_evaluation`]: ParsedEvaluation::into_evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedEvaluation {
    pub score: Option<Value>,
    pub comment: Option<Value>,
}

impl ParsedEvaluation {
    fn from_object(mut object: Map<String, Value>) -> Self {
        Self {
            score: object.remove("score"),
            comment: object.remove("comment"),
        }
    }

    /// Apply defaults: score 0.0, comment [`UNPARSEABLE_COMMENT`]
    pub fn into_evaluation(self) -> Evaluation {
        Evaluation::new(
            self.score
                .map(EvalValue::from)
                .unwrap_or_else(|| EvalValue::from_f64(0.0)),
            self.comment
                .map(EvalValue::from)
                .unwrap_or_else(|| EvalValue::Text(UNPARSEABLE_COMMENT.to_string())),
        )
    }
}

/// Extract a `{score, comment}` object from raw model text
///
/// Returns `None` when no JSON object can be recovered.
pub fn extract_result(raw_text: &str) -> Option<ParsedEvaluation> {
    let cleaned = strip_code_fence(raw_text);

    if let Some(object) = decode_object(cleaned) {
        return Some(ParsedEvaluation::from_object(object));
    }

    let span = object_span(cleaned)?;
    let collapsed = collapse_whitespace(span);
    match decode_object(&collapsed) {
        Some(object) => Some(ParsedEvaluation::from_object(object)),
        None => {
            tracing::debug!("No JSON object recoverable from model text");
            None
        }
    }
}

/// Turn raw model text into an evaluation, never failing
///
/// Unrecoverable text becomes score 0 with the raw text as comment.
pub fn evaluation_from_text(raw_text: &str) -> Evaluation {
    match extract_result(raw_text) {
        Some(parsed) => parsed.into_evaluation(),
        None => Evaluation::unparsed(raw_text),
    }
}

/// Remove a leading ```` ```lang ```` marker and a trailing ```` ``` ````, then trim
fn strip_code_fence(text: &str) -> &str {
    let mut cleaned = text.trim();

    if let Some(rest) = cleaned.strip_prefix(FENCE) {
        let tag_len = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+')))
            .unwrap_or(rest.len());
        cleaned = rest[tag_len..].trim_start();
    }

    if let Some(rest) = cleaned.trim_end().strip_suffix(FENCE) {
        cleaned = rest;
    }

    cleaned.trim()
}

fn decode_object(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(object)) => Some(object),
        _ => None,
    }
}

/// Greedy span from the first `{` to the last `}`
fn object_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
