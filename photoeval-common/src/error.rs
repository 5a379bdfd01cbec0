//! Errors shared by the config loader and the photo store

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures that cross the crate boundary
///
/// Request-level failures (missing photo, bad directory) are not here; the
/// service crate reports those through its own `ApiError`.
#[derive(Error, Debug)]
pub enum Error {
    /// Store query, transaction or connection failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Unreadable or invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
}
