//! Error types for braid-events

use thiserror::Error;

/// Result type alias using braid-events Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when decoding events at the input boundary
#[derive(Error, Debug)]
pub enum Error {
    /// JSON deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A timestamp string was not valid RFC 3339
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),
}
