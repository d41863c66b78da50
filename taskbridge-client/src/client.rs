//! High-level client API.

use crate::connection::{Connection, ConnectionConfig};
use crate::error::ClientError;
use serde_json::{json, Value};
use std::sync::Arc;
use taskbridge_protocol::TOOLS_CALL;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::Command;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// High-level client for a taskbridge server.
pub struct Client {
    conn: Arc<Connection>,
    read_task: Mutex<Option<JoinHandle<()>>>,
}

impl Client {
    /// Creates a new client with the given configuration.
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            conn: Arc::new(Connection::new(config)),
            read_task: Mutex::new(None),
        }
    }

    /// Connects over an existing stream pair and starts routing responses.
    pub async fn connect<R, W>(&self, reader: R, writer: W)
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        self.conn.attach(reader, writer).await;
        self.start_reader().await;
    }

    /// Spawns the server binary and connects to its stdio.
    pub async fn spawn(&self, command: &mut Command) -> Result<(), ClientError> {
        self.conn.spawn(command).await?;
        self.start_reader().await;
        Ok(())
    }

    async fn start_reader(&self) {
        let conn = self.conn.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = conn.read_loop().await {
                tracing::debug!("read loop ended: {}", e);
            }
        });
        if let Some(previous) = self.read_task.lock().await.replace(handle) {
            previous.abort();
        }
    }

    /// Returns whether the client is connected.
    pub fn is_connected(&self) -> bool {
        self.conn.is_connected()
    }

    /// Closes the connection.
    pub async fn close(&self) -> Result<(), ClientError> {
        self.conn.close().await?;
        if let Some(handle) = self.read_task.lock().await.take() {
            handle.abort();
        }
        Ok(())
    }

    /// Returns the underlying connection.
    pub fn connection(&self) -> Arc<Connection> {
        self.conn.clone()
    }

    /// Calls a tool and returns its text result.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<String, ClientError> {
        let params = json!({"name": name, "arguments": arguments});
        let response = self.conn.request(TOOLS_CALL, params).await?;

        if let Some(err) = response.error {
            return Err(ClientError::Rpc {
                code: err.code,
                message: err.message,
            });
        }

        let result = response
            .result
            .ok_or(ClientError::MalformedResponse("neither result nor error"))?;
        Ok(result.content.as_text().to_string())
    }

    /// Creates a task and returns the server's confirmation.
    pub async fn create_task(&self, content: &str) -> Result<String, ClientError> {
        self.call_tool("create_task", json!({ "content": content }))
            .await
    }
}
