//! # taskbridge-todoist
//!
//! Todoist backend for taskbridge.
//!
//! This crate provides:
//! - The `TaskBackend` trait the server's tools are written against
//! - An async HTTPS client for the Todoist REST API
//! - Credential lookup from the environment

pub mod backend;
pub mod client;
pub mod config;
pub mod error;
pub mod types;

pub use backend::TaskBackend;
pub use client::TodoistClient;
pub use config::{api_token_from_env, TodoistConfig, API_TOKEN_ENV};
pub use error::TodoistError;
pub use types::{NewTask, Task};
