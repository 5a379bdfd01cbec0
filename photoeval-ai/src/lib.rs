//! photoeval-ai library interface
//!
//! Exposes the router, state and services for the binary and integration tests.

pub mod api;
pub mod db;
pub mod error;
pub mod logging;
pub mod models;
pub mod services;
pub mod types;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::services::BatchEvaluator;
use crate::types::ImageEvaluator;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Batch evaluator wrapping the configured model client
    pub batch: Arc<BatchEvaluator>,
    /// Held for the duration of one batch; concurrent triggers queue up
    pub batch_lock: Arc<Mutex<()>>,
    /// Directory served under `/static`
    pub static_dir: PathBuf,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(db: SqlitePool, evaluator: Arc<dyn ImageEvaluator>, max_concurrent: usize) -> Self {
        Self {
            db,
            batch: Arc::new(BatchEvaluator::new(evaluator, max_concurrent)),
            batch_lock: Arc::new(Mutex::new(())),
            static_dir: PathBuf::from("static"),
            startup_time: Utc::now(),
        }
    }

    pub fn with_static_dir(mut self, static_dir: impl Into<PathBuf>) -> Self {
        self.static_dir = static_dir.into();
        self
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let static_files = ServeDir::new(&state.static_dir);

    Router::new()
        .merge(api::evaluate_routes())
        .merge(api::photo_routes())
        .merge(api::image_routes())
        .merge(api::health_routes())
        .nest_service("/static", static_files)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
