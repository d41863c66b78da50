//! Todoist backend errors.

use thiserror::Error;

/// Errors returned by the Todoist backend.
///
/// `Display` output is what tool handlers surface to callers, so no variant
/// may render the API token.
#[derive(Debug, Error)]
pub enum TodoistError {
    #[error("{} environment variable not set", crate::config::API_TOKEN_ENV)]
    MissingToken,

    #[error("{0}")]
    Network(&'static str),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Todoist API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TodoistError {
    /// Classifies a transport error, collapsing timeouts and connection
    /// failures into short diagnostics.
    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TodoistError::Network("network timeout")
        } else if err.is_connect() {
            TodoistError::Network("connection failed")
        } else {
            TodoistError::Http(err)
        }
    }

    /// Returns whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            TodoistError::Network(_) => true,
            TodoistError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
