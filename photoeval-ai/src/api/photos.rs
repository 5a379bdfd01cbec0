//! Stored evaluation listing
//!
//! GET /api/photos, GET /api/photos/:id, GET /api/photos/:id/evaluations

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::db::photos;
use crate::error::{ApiError, ApiResult};
use crate::models::{EvaluationHistoryEntry, StoredPhoto};
use crate::AppState;

/// Largest page the listing will return
pub const MAX_PAGE_SIZE: i64 = 100;

/// Query parameters for photo listing
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    20
}

/// GET /api/photos?skip=0&limit=20
///
/// Newest first. Negative values are treated as zero.
pub async fn list_photos(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<StoredPhoto>>> {
    let skip = query.skip.max(0);
    let limit = query.limit.clamp(0, MAX_PAGE_SIZE);

    let stored = photos::list_photos(&state.db, skip, limit).await?;
    Ok(Json(stored))
}

/// GET /api/photos/:id
pub async fn get_photo(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<StoredPhoto>> {
    photos::load_photo(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Photo {}", id)))
}

/// GET /api/photos/:id/evaluations
pub async fn get_photo_history(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vec<EvaluationHistoryEntry>>> {
    if photos::load_photo(&state.db, id).await?.is_none() {
        return Err(ApiError::NotFound(format!("Photo {}", id)));
    }

    let history = photos::list_history(&state.db, id).await?;
    Ok(Json(history))
}

/// Build photo listing routes
pub fn photo_routes() -> Router<AppState> {
    Router::new()
        .route("/api/photos", get(list_photos))
        .route("/api/photos/:id", get(get_photo))
        .route("/api/photos/:id/evaluations", get(get_photo_history))
}
