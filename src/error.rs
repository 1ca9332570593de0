//! Error taxonomy for the ingestion and aggregation engine.
//!
//! Every fallible core operation returns [`ServiceResult`]. Authorization,
//! validation and lookup failures are recovered at the HTTP boundary (see
//! `routes`), while `IoFailure` raised during startup is fatal and bubbles
//! up to `main` through `anyhow`.

use std::path::PathBuf;

use thiserror::Error;

/// Convenience alias for results using the service error type.
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

#[derive(Debug, Error)]
pub enum ServiceError {
    // ---
    /// Sensor id is not present in the whitelist.
    #[error("Unauthorized sensor: {0}")]
    Unauthorized(String),

    /// Reading payload failed validation; carries the ordered error list.
    #[error("Invalid reading: {}", .0.join(" "))]
    InvalidReading(Vec<String>),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Config, whitelist or historical file unreadable or malformed.
    #[error("Failed to load '{}': {reason}", .path.display())]
    IoFailure { path: PathBuf, reason: String },

    /// Realtime log rewrite failed during ingest.
    #[error("Failed to write realtime log '{}': {source}", .path.display())]
    StorageWriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ServiceError {
    // ---
    pub(crate) fn io_failure(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        ServiceError::IoFailure {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
