//! # taskbridge-client
//!
//! Client library for taskbridge.
//!
//! This crate provides:
//! - A connection over any async stream pair, or a spawned server process
//! - Response correlation by request ID, so out-of-order replies are routed
//!   correctly
//! - A high-level API for calling tools

pub mod client;
pub mod connection;
pub mod error;

pub use client::Client;
pub use connection::{Connection, ConnectionConfig};
pub use error::ClientError;
