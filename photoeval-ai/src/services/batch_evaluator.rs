//! Batch evaluation
//!
//! Computes the not-yet-evaluated subset of a candidate set, evaluates it with
//! bounded concurrency and commits every result in one transaction.

use futures::stream::{self, StreamExt};
use photoeval_common::Result;
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::db::photos;
use crate::models::{BatchOutcome, EvaluationRecord};
use crate::types::ImageEvaluator;

/// Default number of in-flight model requests
pub const DEFAULT_MAX_CONCURRENT: usize = 4;

/// Fans evaluation out over an [`ImageEvaluator`]
pub struct BatchEvaluator {
    evaluator: Arc<dyn ImageEvaluator>,
    max_concurrent: usize,
}

impl BatchEvaluator {
    pub fn new(evaluator: Arc<dyn ImageEvaluator>, max_concurrent: usize) -> Self {
        Self {
            evaluator,
            max_concurrent: max_concurrent.max(1),
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Evaluate every candidate not in `known` and persist the results
    ///
    /// Per-image failures are already degraded by the evaluator. A task that
    /// panics is logged and left out of the result. A storage failure fails the
    /// whole batch and nothing is committed.
    pub async fn run_batch(
        &self,
        pool: &SqlitePool,
        candidates: HashSet<String>,
        known: &HashSet<String>,
    ) -> Result<BatchOutcome> {
        let candidate_count = candidates.len();
        let mut pending = new_paths(candidates, known);
        // Stable launch order; completion order is what gets reported
        pending.sort();
        let skipped_count = candidate_count - pending.len();

        info!(
            evaluator = self.evaluator.name(),
            candidates = candidate_count,
            new = pending.len(),
            skipped = skipped_count,
            max_concurrent = self.max_concurrent,
            "Starting evaluation batch"
        );

        let records: Vec<EvaluationRecord> = stream::iter(pending)
            .map(|file_path| {
                let evaluator = Arc::clone(&self.evaluator);
                async move {
                    // Own task per image so a panic stays contained
                    let path = PathBuf::from(&file_path);
                    let joined =
                        tokio::spawn(async move { evaluator.evaluate_image(&path).await }).await;
                    (file_path, joined)
                }
            })
            .buffer_unordered(self.max_concurrent)
            .filter_map(|(file_path, joined)| async move {
                match joined {
                    Ok(evaluation) => {
                        if evaluation.is_degraded() {
                            warn!(file = %file_path, comment = %evaluation.comment, "Degraded evaluation");
                        }
                        Some(EvaluationRecord::new(file_path, evaluation))
                    }
                    Err(e) => {
                        error!(file = %file_path, error = %e, "Evaluation task failed, omitting");
                        None
                    }
                }
            })
            .collect()
            .await;

        photos::save_batch(pool, &records).await?;

        let outcome = BatchOutcome {
            evaluated: records.iter().map(EvaluationRecord::summary).collect(),
            skipped_count,
        };

        info!(
            evaluated = outcome.evaluated.len(),
            skipped = outcome.skipped_count,
            "Evaluation batch committed"
        );

        Ok(outcome)
    }
}

/// Candidates not already known
pub fn new_paths(candidates: HashSet<String>, known: &HashSet<String>) -> Vec<String> {
    candidates
        .into_iter()
        .filter(|path| !known.contains(path))
        .collect()
}
