//! JSON-RPC message types for taskbridge requests and responses.

use crate::error::{ErrorCode, ProtocolError};
use crate::{JSONRPC_VERSION, TOOLS_CALL};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Request message envelope.
///
/// Only `method` drives dispatch. `jsonrpc` is carried but not validated, and
/// `id` is opaque: it is echoed back verbatim, including an explicit `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Request {
    /// Protocol version tag as sent by the caller.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jsonrpc: Option<String>,

    /// Correlation ID. `None` when the field was absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,

    /// Method name.
    pub method: String,

    /// Method-specific parameters (`Null` when absent).
    #[serde(skip_serializing_if = "Value::is_null")]
    pub params: Value,
}

impl Request {
    pub fn new(id: impl Into<Value>, method: impl Into<String>) -> Self {
        Self {
            jsonrpc: Some(JSONRPC_VERSION.to_string()),
            id: Some(id.into()),
            method: method.into(),
            params: Value::Null,
        }
    }

    /// Builds a `tools/call` request for `name` with the given arguments.
    pub fn tool_call(id: impl Into<Value>, name: impl Into<String>, arguments: Value) -> Self {
        let name: String = name.into();
        Self::new(id, TOOLS_CALL).with_params(serde_json::json!({
            "name": name,
            "arguments": arguments,
        }))
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }

    /// Parses one frame payload into a request.
    ///
    /// Fails when the payload is not UTF-8, not a JSON object, or has no
    /// string `method`. Such failures carry no usable ID.
    pub fn parse(payload: &[u8]) -> Result<Self, ProtocolError> {
        let text = std::str::from_utf8(payload).map_err(|_| ProtocolError::InvalidUtf8)?;
        let value: Value = serde_json::from_str(text)?;
        let Value::Object(mut obj) = value else {
            return Err(ProtocolError::NotAnObject);
        };

        let method = match obj.remove("method") {
            Some(Value::String(method)) => method,
            Some(_) => {
                return Err(ProtocolError::InvalidField {
                    field: "method",
                    expected: "a string",
                })
            }
            None => return Err(ProtocolError::MissingField("method")),
        };

        let jsonrpc = match obj.remove("jsonrpc") {
            Some(Value::String(tag)) => Some(tag),
            _ => None,
        };

        Ok(Self {
            jsonrpc,
            id: obj.remove("id"),
            method,
            params: obj.remove("params").unwrap_or(Value::Null),
        })
    }
}

/// Parameters of a `tools/call` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallParams {
    /// Registered tool name.
    pub name: String,

    /// Tool-specific argument bag.
    #[serde(default = "empty_object")]
    pub arguments: Value,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

/// Content block carried in a tool result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Content {
    Text { text: String },
}

impl Content {
    pub fn text(text: impl Into<String>) -> Self {
        Content::Text { text: text.into() }
    }

    /// Returns the text of a text block.
    pub fn as_text(&self) -> &str {
        match self {
            Content::Text { text } => text,
        }
    }
}

/// Result payload of a successful `tools/call`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub content: Content,
}

impl ToolCallResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: Content::text(text),
        }
    }
}

/// Error details in a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseError {
    /// Stable numeric error code.
    pub code: ErrorCode,

    /// Human-readable error message.
    pub message: String,
}

impl ResponseError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn unknown_method(method: &str) -> Self {
        Self::new(ErrorCode::MethodNotFound, format!("Unknown method: {method}"))
    }

    pub fn unknown_tool(name: &str) -> Self {
        Self::new(ErrorCode::MethodNotFound, format!("Unknown tool: {name}"))
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidParams, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

/// Response message envelope. Exactly one of `result` and `error` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Always "2.0".
    pub jsonrpc: String,

    /// ID echoed from the request; omitted when the request had none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,

    /// Result payload (for successful responses).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ToolCallResult>,

    /// Error details (for error responses).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ResponseError>,
}

impl Response {
    pub fn ok(id: Option<Value>, result: ToolCallResult) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Option<Value>, error: ResponseError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.result.is_some()
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
