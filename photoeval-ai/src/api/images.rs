//! Raw image retrieval
//!
//! GET /api/image/*path serves the bytes of an image file on disk. The path
//! arrives percent-decoded; clients commonly join `/api/image/` with an
//! absolute path, so runs of leading separators are collapsed to one.

use axum::{
    extract::Path,
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::path::PathBuf;

use crate::error::{ApiError, ApiResult};
use crate::services::file_scanner::is_image_extension;
use crate::AppState;

/// Collapse duplicated leading separators (`//a/b.jpg` -> `/a/b.jpg`)
pub fn normalize_request_path(raw: &str) -> PathBuf {
    let trimmed = raw.trim_start_matches(['/', '\\']);
    if trimmed.len() == raw.len() {
        PathBuf::from(raw)
    } else {
        PathBuf::from(format!("/{}", trimmed))
    }
}

/// Content type for an accepted image extension
pub fn content_type_for(ext: &str) -> Option<&'static str> {
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

/// GET /api/image/*path
pub async fn get_image(Path(raw_path): Path<String>) -> ApiResult<Response> {
    let path = normalize_request_path(&raw_path);

    let is_file = tokio::fs::metadata(&path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false);
    if !is_file {
        return Err(ApiError::NotFound(format!("Image not found: {}", path.display())));
    }

    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default();
    let content_type = match content_type_for(&ext) {
        Some(ct) if is_image_extension(&ext) => ct,
        _ => {
            return Err(ApiError::BadRequest(format!(
                "Unsupported file type: {}",
                path.display()
            )))
        }
    };

    let bytes = tokio::fs::read(&path).await?;
    tracing::debug!(file = %path.display(), bytes = bytes.len(), "Serving image");

    Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
}

/// Build image routes
pub fn image_routes() -> Router<AppState> {
    Router::new().route("/api/image/*path", get(get_image))
}
