//! Error types for photoeval-ai
//!
//! Handler errors render as `{"error": {"code", "message"}}` with a matching
//! status code.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::services::ScanError;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Store or configuration failure from photoeval-common
    #[error(transparent)]
    Common(#[from] photoeval_common::Error),
}

impl From<ScanError> for ApiError {
    fn from(err: ScanError) -> Self {
        match err {
            ScanError::PathNotFound(_) => ApiError::NotFound(err.to_string()),
            ScanError::NotADirectory(_) => ApiError::BadRequest(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::Io(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "IO_ERROR",
                err.to_string(),
            ),
            ApiError::Common(ref err) => {
                let code = match err {
                    photoeval_common::Error::Database(_) => "DATABASE_ERROR",
                    photoeval_common::Error::Io(_) => "IO_ERROR",
                    photoeval_common::Error::Config(_) => "CONFIG_ERROR",
                };
                (StatusCode::INTERNAL_SERVER_ERROR, code, err.to_string())
            }
        };

        if status.is_server_error() {
            tracing::error!(code = error_code, "{}", message);
        }

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use std::path::PathBuf;

    #[test]
    fn test_scan_errors_map_to_client_statuses() {
        let missing = ApiError::from(ScanError::PathNotFound(PathBuf::from("/nope")));
        assert_eq!(missing.into_response().status(), StatusCode::NOT_FOUND);

        let file = ApiError::from(ScanError::NotADirectory(PathBuf::from("/a.jpg")));
        assert_eq!(file.into_response().status(), StatusCode::BAD_REQUEST);
    }

    async fn error_body(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_store_failures_are_server_errors() {
        let (status, body) =
            error_body(ApiError::from(photoeval_common::Error::Database(sqlx::Error::RowNotFound))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["code"], "DATABASE_ERROR");

        let (status, body) = error_body(ApiError::from(photoeval_common::Error::Config(
            "bad level".into(),
        )))
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["code"], "CONFIG_ERROR");
        assert!(body["error"]["message"].as_str().unwrap().contains("bad level"));
    }

    #[tokio::test]
    async fn test_client_errors_render_code_and_message() {
        let (status, body) = error_body(ApiError::NotFound("Photo 3".into())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
        assert_eq!(body["error"]["message"], "Photo 3");
    }
}
