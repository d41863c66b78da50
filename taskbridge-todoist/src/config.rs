//! Client configuration and credential lookup.

use crate::error::TodoistError;
use std::fmt;
use std::time::Duration;

/// Environment variable holding the Todoist API token.
pub const API_TOKEN_ENV: &str = "TODOIST_API_TOKEN";

/// Default REST endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.todoist.com/rest/v2";

/// Default per-request HTTP timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Reads the API token from the environment.
///
/// An unset or blank token is an error; the server refuses to start without
/// one.
pub fn api_token_from_env() -> Result<String, TodoistError> {
    require_token(std::env::var(API_TOKEN_ENV).ok())
}

fn require_token(value: Option<String>) -> Result<String, TodoistError> {
    match value {
        Some(token) if !token.trim().is_empty() => Ok(token),
        _ => Err(TodoistError::MissingToken),
    }
}

/// Todoist client configuration.
#[derive(Clone)]
pub struct TodoistConfig {
    /// Bearer token sent with every request.
    pub api_token: String,
    /// REST API base URL, without a trailing slash.
    pub base_url: String,
    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
}

impl TodoistConfig {
    pub fn new(api_token: impl Into<String>) -> Self {
        Self {
            api_token: api_token.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

impl fmt::Debug for TodoistConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TodoistConfig")
            .field("api_token", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}
