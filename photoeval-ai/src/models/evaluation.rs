//! Evaluation values, records and API shapes
//!
//! The model is asked for a numeric score and a text comment but nothing
//! guarantees it complies, so both fields are carried as [`EvalValue`] and
//! stored as JSON text.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Number, Value};
use std::fmt;
use std::path::Path;

/// Comment used when the model answered with an object lacking a comment
pub const UNPARSEABLE_COMMENT: &str = "Could not parse evaluation";

/// Prefix of every degraded-result comment
pub const DEGRADED_COMMENT_PREFIX: &str = "Error during evaluation: ";

/// Loosely typed score/comment value
///
/// Serializes as the bare JSON value. Anything that is not a number, string
/// or null is kept as its compact JSON text.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalValue {
    Number(Number),
    Text(String),
    Null,
}

impl EvalValue {
    /// Numeric value; non-finite input becomes `Null`
    pub fn from_f64(value: f64) -> Self {
        Number::from_f64(value)
            .map(EvalValue::Number)
            .unwrap_or(EvalValue::Null)
    }

    pub fn to_json(&self) -> Value {
        match self {
            EvalValue::Number(n) => Value::Number(n.clone()),
            EvalValue::Text(s) => Value::String(s.clone()),
            EvalValue::Null => Value::Null,
        }
    }

    /// Encoded form stored in the database
    pub fn encode(&self) -> String {
        self.to_json().to_string()
    }

    /// Decode the stored form
    ///
    /// Text that is not valid JSON is returned verbatim as `Text`.
    pub fn decode(stored: &str) -> Self {
        match serde_json::from_str::<Value>(stored) {
            Ok(value) => EvalValue::from(value),
            Err(_) => EvalValue::Text(stored.to_string()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            EvalValue::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            EvalValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<Value> for EvalValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Number(n) => EvalValue::Number(n),
            Value::String(s) => EvalValue::Text(s),
            Value::Null => EvalValue::Null,
            other => EvalValue::Text(other.to_string()),
        }
    }
}

impl From<&str> for EvalValue {
    fn from(value: &str) -> Self {
        EvalValue::Text(value.to_string())
    }
}

impl From<String> for EvalValue {
    fn from(value: String) -> Self {
        EvalValue::Text(value)
    }
}

impl fmt::Display for EvalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalValue::Number(n) => write!(f, "{}", n),
            EvalValue::Text(s) => f.write_str(s),
            EvalValue::Null => f.write_str("null"),
        }
    }
}

impl Serialize for EvalValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for EvalValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(EvalValue::from)
    }
}

/// Outcome of judging one image: `{score, comment}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub score: EvalValue,
    pub comment: EvalValue,
    /// Set only by [`Evaluation::degraded`]; never serialized
    #[serde(skip)]
    degraded: bool,
}

impl Evaluation {
    pub fn new(score: impl Into<EvalValue>, comment: impl Into<EvalValue>) -> Self {
        Self {
            score: score.into(),
            comment: comment.into(),
            degraded: false,
        }
    }

    /// Safe fallback substituted whenever evaluation cannot complete cleanly
    pub fn degraded(diagnostic: impl fmt::Display) -> Self {
        Self {
            score: EvalValue::from_f64(0.0),
            comment: EvalValue::Text(format!("{}{}", DEGRADED_COMMENT_PREFIX, diagnostic)),
            degraded: true,
        }
    }

    /// Score 0 with the raw model text as comment, used when no object could be extracted
    pub fn unparsed(raw_text: impl Into<String>) -> Self {
        Self {
            score: EvalValue::from_f64(0.0),
            comment: EvalValue::Text(raw_text.into()),
            degraded: false,
        }
    }

    /// True only for fallbacks built by [`Evaluation::degraded`]
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }
}

/// Summary entry returned by a batch run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub file_path: String,
    pub score: EvalValue,
    pub comment: EvalValue,
}

/// Record staged for persistence, one per unique file path
#[derive(Debug, Clone)]
pub struct EvaluationRecord {
    pub file_path: String,
    /// Basename, derived from `file_path`
    pub file_name: String,
    pub score: EvalValue,
    pub comment: EvalValue,
    pub evaluated_at: DateTime<Utc>,
}

impl EvaluationRecord {
    pub fn new(file_path: impl Into<String>, evaluation: Evaluation) -> Self {
        let file_path = file_path.into();
        let file_name = Path::new(&file_path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_path.clone());

        Self {
            file_path,
            file_name,
            score: evaluation.score,
            comment: evaluation.comment,
            evaluated_at: Utc::now(),
        }
    }

    pub fn summary(&self) -> EvaluationResult {
        EvaluationResult {
            file_path: self.file_path.clone(),
            score: self.score.clone(),
            comment: self.comment.clone(),
        }
    }
}

/// Stored photo as exposed by the listing endpoint
#[derive(Debug, Clone, Serialize)]
pub struct StoredPhoto {
    pub id: i64,
    pub file_path: String,
    pub file_name: String,
    pub evaluation_score: EvalValue,
    pub evaluation_comment: EvalValue,
    /// ISO-8601 timestamp, null if absent
    pub evaluated_at: Option<String>,
}

/// One row of a photo's evaluation history
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationHistoryEntry {
    pub id: i64,
    pub photo_id: i64,
    pub score: EvalValue,
    pub comment: EvalValue,
    pub evaluated_at: Option<String>,
}

/// Result of one batch run
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub evaluated: Vec<EvaluationResult>,
    pub skipped_count: usize,
}

impl BatchOutcome {
    pub fn message(&self) -> String {
        format!(
            "Evaluated {} photos, skipped {} duplicates",
            self.evaluated.len(),
            self.skipped_count
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_eval_value_from_json_shapes() {
        assert_eq!(EvalValue::from(json!(8)), EvalValue::Number(8.into()));
        assert_eq!(EvalValue::from(json!("great")), EvalValue::Text("great".into()));
        assert_eq!(EvalValue::from(Value::Null), EvalValue::Null);
        assert_eq!(EvalValue::from(json!(true)), EvalValue::Text("true".into()));
        assert_eq!(
            EvalValue::from(json!({"a": 1})),
            EvalValue::Text("{\"a\":1}".into())
        );
    }

    #[test]
    fn test_integer_score_serializes_without_fraction() {
        let value = EvalValue::from(json!(8));
        assert_eq!(serde_json::to_string(&value).unwrap(), "8");
    }

    #[test]
    fn test_decode_tolerates_legacy_plain_text() {
        assert_eq!(EvalValue::decode("7.5"), EvalValue::from(json!(7.5)));
        assert_eq!(EvalValue::decode("\"nice\""), EvalValue::Text("nice".into()));
        assert_eq!(EvalValue::decode("not json"), EvalValue::Text("not json".into()));
    }

    #[test]
    fn test_non_finite_score_becomes_null() {
        assert_eq!(EvalValue::from_f64(f64::NAN), EvalValue::Null);
    }

    #[test]
    fn test_degraded_evaluation() {
        let eval = Evaluation::degraded("connection refused");
        assert_eq!(eval.score.as_f64(), Some(0.0));
        assert_eq!(
            eval.comment.as_str(),
            Some("Error during evaluation: connection refused")
        );
        assert!(eval.is_degraded());
        assert!(!Evaluation::new(EvalValue::from_f64(5.0), "ok").is_degraded());
    }

    #[test]
    fn test_model_comment_with_error_prefix_is_not_degraded() {
        let from_model = Evaluation::new(json!(3), "Error during evaluation: the horizon is tilted");
        assert!(!from_model.is_degraded());

        let unparsed = Evaluation::unparsed("Error during evaluation: none");
        assert!(!unparsed.is_degraded());
    }

    #[test]
    fn test_degraded_flag_not_serialized() {
        let body = serde_json::to_value(Evaluation::degraded("timed out")).unwrap();
        assert_eq!(
            body,
            json!({"score": 0.0, "comment": "Error during evaluation: timed out"})
        );
    }

    #[test]
    fn test_record_derives_file_name() {
        let record = EvaluationRecord::new("/photos/2024/beach.jpg", Evaluation::new(json!(9), "sunny"));
        assert_eq!(record.file_name, "beach.jpg");
        assert_eq!(record.summary().file_path, "/photos/2024/beach.jpg");
    }

    #[test]
    fn test_batch_message() {
        let outcome = BatchOutcome {
            evaluated: vec![],
            skipped_count: 3,
        };
        assert_eq!(outcome.message(), "Evaluated 0 photos, skipped 3 duplicates");
    }
}
