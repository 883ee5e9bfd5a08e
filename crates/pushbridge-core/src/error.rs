//! Error types for the `pushbridge` core library.

use thiserror::Error;

/// Result type alias using the core [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for `pushbridge` operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A notification event violated one of its invariants.
    #[error("Invalid notification event: {0}")]
    InvalidEvent(String),

    /// A raw payload could not be represented as a notification event.
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
