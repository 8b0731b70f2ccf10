// src/error.rs

//! Error types for the Larder registry core

use thiserror::Error;

/// Result type alias using the crate error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the review pipeline and the publishing transaction
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Initialization error: {0}")]
    InitError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The artifact could not be retrieved (unreachable, non-2xx, write failure)
    #[error("Fetch failed: {0}")]
    FetchFailed(String),

    /// The artifact could not be unpacked, including rejected traversal entries
    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    /// The linter reported violations for an enabled rule
    #[error("Validation failed")]
    ValidationFailed { report: String },

    /// The linter could not be run to completion
    #[error("Linter error: {0}")]
    LinterError(String),

    #[error("Invalid {field}: {reason}")]
    PublishValidationFailed { field: String, reason: String },

    #[error("Publish conflict: {0}")]
    PublishConflict(String),

    /// The workspace directory was missing or could not be removed
    #[error("Cleanup failed: {0}")]
    CleanupFailed(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Too many reviews are already waiting for a worker
    #[error("Review queue full: {0}")]
    QueueFull(String),

    #[error("Notification failed: {0}")]
    NotifyFailed(String),

    #[error("Path traversal attempt: {0}")]
    PathTraversal(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

impl Error {
    /// Shorthand for a field-level publish validation failure
    pub fn invalid(field: &str, reason: impl Into<String>) -> Self {
        Error::PublishValidationFailed {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}
