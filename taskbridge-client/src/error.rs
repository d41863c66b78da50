//! Client error types.

use taskbridge_protocol::ErrorCode;
use thiserror::Error;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] taskbridge_protocol::ProtocolError),

    #[error("not connected")]
    NotConnected,

    #[error("connection closed")]
    ConnectionClosed,

    #[error("request timeout")]
    Timeout,

    #[error("server error: {code} - {message}")]
    Rpc { code: ErrorCode, message: String },

    #[error("malformed response: {0}")]
    MalformedResponse(&'static str),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClientError {
    /// Returns whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Io(_) => true,
            ClientError::Timeout => true,
            ClientError::ConnectionClosed => true,
            ClientError::Rpc { code, .. } => code.is_retryable(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpc_error_display() {
        let err = ClientError::Rpc {
            code: ErrorCode::MethodNotFound,
            message: "Unknown tool: bogus_tool".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "server error: METHOD_NOT_FOUND - Unknown tool: bogus_tool"
        );
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_retryable() {
        assert!(ClientError::Timeout.is_retryable());
        assert!(ClientError::ConnectionClosed.is_retryable());
        assert!(ClientError::Rpc {
            code: ErrorCode::InternalError,
            message: String::new(),
        }
        .is_retryable());
        assert!(!ClientError::NotConnected.is_retryable());
    }
}
