//! Server error types.

use thiserror::Error;

/// Server errors.
///
/// Per-request failures never surface here; they become error responses.
/// These are the failures that end the serve loop.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("writer task failed: {0}")]
    Writer(String),
}
