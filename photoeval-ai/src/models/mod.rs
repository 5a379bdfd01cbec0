//! Data models for photoeval-ai
//!
//! - Evaluation values as returned by the model (loosely typed)
//! - Persisted evaluation records and their API shapes

pub mod evaluation;

pub use evaluation::{
    BatchOutcome, EvalValue, Evaluation, EvaluationHistoryEntry, EvaluationRecord,
    EvaluationResult, StoredPhoto, DEGRADED_COMMENT_PREFIX, UNPARSEABLE_COMMENT,
};
