//! Common error types for the marketplace product updater

use thiserror::Error;

/// Common result type for updater operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types shared by the updater crates
///
/// Only run-level (fatal) conditions are represented here. Row-level failures
/// are recorded as outcomes and never surface as an `Error`.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV reading or writing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Required input or lookup file is missing
    #[error("Not found: {0}")]
    NotFound(String),

    /// Structurally invalid input (e.g. missing CSV header columns)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
