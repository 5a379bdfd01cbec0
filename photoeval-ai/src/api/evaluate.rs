//! Evaluation trigger
//!
//! POST /api/evaluate-photos: scan a directory, evaluate files not seen
//! before, persist and report.

use axum::{
    body::Bytes,
    extract::{Query, State},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

use crate::db::photos;
use crate::error::{ApiError, ApiResult};
use crate::models::EvaluationResult;
use crate::services::FileScanner;
use crate::AppState;

/// Directory to evaluate, as query string or JSON body
#[derive(Debug, Default, Deserialize)]
pub struct EvaluateRequest {
    pub directory: Option<String>,
}

/// POST /api/evaluate-photos response
#[derive(Debug, Serialize, Deserialize)]
pub struct EvaluateResponse {
    pub message: String,
    pub evaluations: Vec<EvaluationResult>,
    pub skipped: usize,
}

/// Query parameter wins over the body
fn requested_directory(query: EvaluateRequest, body: &[u8]) -> ApiResult<String> {
    if let Some(directory) = query.directory {
        return Ok(directory);
    }

    if !body.iter().all(u8::is_ascii_whitespace) {
        let request: EvaluateRequest = serde_json::from_slice(body)
            .map_err(|e| ApiError::BadRequest(format!("Invalid request body: {}", e)))?;
        if let Some(directory) = request.directory {
            return Ok(directory);
        }
    }

    Err(ApiError::BadRequest(
        "Missing required parameter: directory".to_string(),
    ))
}

/// POST /api/evaluate-photos?directory=<path>
pub async fn evaluate_photos(
    State(state): State<AppState>,
    Query(query): Query<EvaluateRequest>,
    body: Bytes,
) -> ApiResult<Json<EvaluateResponse>> {
    let directory = requested_directory(query, &body)?;

    // One batch at a time against the store
    let _batch_guard = state.batch_lock.lock().await;

    let root = PathBuf::from(&directory);
    let files = tokio::task::spawn_blocking(move || FileScanner::new().scan(&root))
        .await
        .map_err(|e| ApiError::Internal(format!("Directory scan task failed: {}", e)))??;

    let candidates: HashSet<String> = files
        .iter()
        .map(|path| path.to_string_lossy().into_owned())
        .collect();

    tracing::info!(directory = %directory, files = candidates.len(), "Evaluation requested");

    let known = photos::known_paths(&state.db).await?;
    let outcome = state.batch.run_batch(&state.db, candidates, &known).await?;

    Ok(Json(EvaluateResponse {
        message: outcome.message(),
        skipped: outcome.skipped_count,
        evaluations: outcome.evaluated,
    }))
}

/// Build evaluation routes
pub fn evaluate_routes() -> Router<AppState> {
    Router::new().route("/api/evaluate-photos", post(evaluate_photos))
}
