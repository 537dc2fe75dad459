//! Common error types for the BGV services

use thiserror::Error;

/// Common result type for BGV operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the BGV services
///
/// The pipeline distinguishes driver failures (fatal for the current
/// request) from not-found conditions, so HTTP callers can answer 404
/// instead of 500. Schema drift never surfaces here at all; it is
/// absorbed per-service inside the aggregation modules.
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

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}
