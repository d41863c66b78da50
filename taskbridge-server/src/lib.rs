//! # taskbridge-server
//!
//! Stdio tool server for taskbridge.
//!
//! This crate provides:
//! - The read loop: NUL-delimited frames in, one response frame per request out
//! - Concurrent request dispatch with per-invocation timeouts
//! - A registry of typed tools, with `create_task` built in
//! - Layered configuration (defaults, YAML file, environment)

pub mod config;
pub mod error;
pub mod handler;
pub mod registry;
pub mod server;
pub mod tools;

pub use config::{Config, ConfigError, ServerSettings, TodoistSettings};
pub use error::ServerError;
pub use handler::{DispatchStats, Dispatcher};
pub use registry::{
    ArgumentError, Tool, ToolDescriptor, ToolError, ToolRegistry, ToolRegistryBuilder,
};
pub use server::{Server, ServerConfig, ServerStats};
pub use tools::{builtin_registry, CreateTaskTool};
