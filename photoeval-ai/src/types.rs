//! Core trait definitions for photoeval-ai
//!
//! The batch evaluator is written against [`ImageEvaluator`] rather than a
//! concrete model client, so any vision backend (or a test stub) can drive it.

use std::path::Path;

use crate::models::Evaluation;

/// Judges one image and returns `{score, comment}`
///
/// Implementations must never fail: every error is converted into a degraded
/// [`Evaluation`] (score 0, diagnostic comment) so a single bad image cannot
/// abort a batch.
///
/// # Example
/// ```rust,ignore
/// use photoeval_ai::models::Evaluation;
/// use photoeval_ai::types::ImageEvaluator;
///
/// struct FixedEvaluator;
///
/// #[async_trait::async_trait]
/// impl ImageEvaluator for FixedEvaluator {
///     fn name(&self) -> &str { "fixed" }
///
///     async fn evaluate_image(&self, _path: &Path) -> Evaluation {
///         Evaluation::new(serde_json::json!(8), "nice")
///     }
/// }
/// ```
#[async_trait::async_trait]
pub trait ImageEvaluator: Send + Sync {
    /// Evaluator name for logging
    fn name(&self) -> &str;

    /// Evaluate the image at `path`
    async fn evaluate_image(&self, path: &Path) -> Evaluation;
}
