//! Common error types for SkyWatch

use thiserror::Error;

/// Common result type for SkyWatch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across SkyWatch services
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

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request shape
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the underlying cause is a uniqueness-constraint violation.
    ///
    /// Used by the favorites engine to distinguish retryable display-order
    /// conflicts and lookup-or-create races from genuine storage failures.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Error::Database(sqlx::Error::Database(db_err)) => db_err.is_unique_violation(),
            _ => false,
        }
    }
}
