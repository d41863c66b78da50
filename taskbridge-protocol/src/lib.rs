//! # taskbridge-protocol
//!
//! Wire protocol implementation for taskbridge.
//!
//! This crate provides:
//! - NUL-delimited framing over an unbounded byte stream
//! - JSON-RPC 2.0 request/response envelope types
//! - Stable numeric error codes

pub mod codec;
pub mod error;
pub mod frame;
pub mod message;

pub use codec::{Decoder, Encoder};
pub use error::{ErrorCode, ProtocolError};
pub use frame::{encode_frame, FrameDecoder, Frames, DELIMITER};
pub use message::{Content, Request, Response, ResponseError, ToolCallParams, ToolCallResult};

/// JSON-RPC version tag written on every response.
pub const JSONRPC_VERSION: &str = "2.0";

/// The only method the dispatcher routes to tools.
pub const TOOLS_CALL: &str = "tools/call";
