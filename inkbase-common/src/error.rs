//! Common error types for InkBase

use thiserror::Error;

/// Common result type for InkBase operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error kinds surfaced by identity, consent and token operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Referenced entity is absent within the caller's scope
    #[error("Not found: {0}")]
    NotFound(String),

    /// Precondition violation (self-merge, inactive keep, malformed fields)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Ownership mismatch between caller and target entity
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Entry token missing, expired or deactivated
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// Unique-constraint race that could not be resolved by a fallback read
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal error (corrupt row, unexpected state)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand for a malformed stored identifier
    pub fn corrupt(column: &str, value: &str) -> Self {
        Error::Internal(format!("Malformed value in column '{}': {}", column, value))
    }
}
