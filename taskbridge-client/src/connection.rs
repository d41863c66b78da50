//! Connection management.

use crate::error::ClientError;
use serde_json::Value;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use taskbridge_protocol::{Decoder, Encoder, Request, Response};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::sync::{oneshot, Mutex};

/// Default read buffer size (8 KiB).
pub const DEFAULT_READ_BUFFER_SIZE: usize = 8 * 1024;

/// Minimum read buffer size (1 KiB).
pub const MIN_READ_BUFFER_SIZE: usize = 1024;

/// Maximum read buffer size (1 MiB).
pub const MAX_READ_BUFFER_SIZE: usize = 1024 * 1024;

type BoxReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// How long to wait for a response. The server sends nothing back for a
    /// malformed request, so this is the only signal the caller gets.
    pub request_timeout: Duration,
    /// Read buffer size for stream reads.
    pub read_buffer_size: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }
}

impl ConnectionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.clamp(MIN_READ_BUFFER_SIZE, MAX_READ_BUFFER_SIZE);
        self
    }
}

/// A connection to a taskbridge server.
///
/// Responses may arrive in any order; they are routed back to the waiting
/// request by `id`.
pub struct Connection {
    config: ConnectionConfig,
    writer: Mutex<Option<BoxWriter>>,
    reader: Mutex<Option<BoxReader>>,
    /// Pending requests waiting for responses, keyed by rendered id.
    pending: Mutex<HashMap<String, oneshot::Sender<Response>>>,
    next_id: AtomicU64,
    connected: AtomicBool,
    /// Server process, when the connection spawned one.
    child: Mutex<Option<Child>>,
}

impl Connection {
    /// Creates a new connection (not yet attached).
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            config,
            writer: Mutex::new(None),
            reader: Mutex::new(None),
            pending: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            connected: AtomicBool::new(false),
            child: Mutex::new(None),
        }
    }

    /// Attaches to a server through an existing stream pair.
    pub async fn attach<R, W>(&self, reader: R, writer: W)
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        *self.reader.lock().await = Some(Box::new(reader));
        *self.writer.lock().await = Some(Box::new(writer));
        self.connected.store(true, Ordering::SeqCst);
    }

    /// Spawns a server process and attaches to its stdin/stdout. The child's
    /// stderr is inherited so its logs stay visible.
    pub async fn spawn(&self, command: &mut Command) -> Result<(), ClientError> {
        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child.stdin.take().ok_or(ClientError::NotConnected)?;
        let stdout = child.stdout.take().ok_or(ClientError::NotConnected)?;
        tracing::debug!("Spawned server process (pid {:?})", child.id());

        self.attach(stdout, stdin).await;
        *self.child.lock().await = Some(child);
        Ok(())
    }

    /// Sends a request and waits for its response.
    pub async fn request(&self, method: &str, params: Value) -> Result<Response, ClientError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(ClientError::NotConnected);
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let key = id.to_string();
        tracing::debug!("Sending request id={} method={}", id, method);
        let request = Request::new(id, method).with_params(params);
        let encoded = Encoder::encode_request(&request)?;

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(key.clone(), tx);

        let sent = async {
            let mut writer_guard = self.writer.lock().await;
            let writer = writer_guard.as_mut().ok_or(ClientError::NotConnected)?;
            writer.write_all(&encoded).await?;
            writer.flush().await?;
            Ok::<(), ClientError>(())
        }
        .await;
        if let Err(e) = sent {
            self.pending.lock().await.remove(&key);
            return Err(e);
        }

        match tokio::time::timeout(self.config.request_timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => {
                tracing::debug!("Request id={} channel closed", id);
                Err(ClientError::ConnectionClosed)
            }
            Err(_) => {
                tracing::debug!("Request id={} timed out", id);
                self.pending.lock().await.remove(&key);
                Err(ClientError::Timeout)
            }
        }
    }

    /// Reads and routes responses until the server closes its output. Run it
    /// in a background task.
    pub async fn read_loop(&self) -> Result<(), ClientError> {
        let mut buf = vec![0u8; self.config.read_buffer_size];
        let mut decoder = Decoder::new();

        loop {
            let n = {
                let mut reader_guard = self.reader.lock().await;
                let reader = reader_guard.as_mut().ok_or(ClientError::NotConnected)?;
                reader.read(&mut buf).await?
            };

            if n == 0 {
                tracing::debug!("read_loop: connection closed");
                self.connected.store(false, Ordering::SeqCst);
                // Dropping the senders fails every outstanding request.
                self.pending.lock().await.clear();
                return Err(ClientError::ConnectionClosed);
            }

            decoder.extend(&buf[..n]);

            loop {
                let response = match decoder.decode_response() {
                    Ok(Some(response)) => response,
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!("read_loop: skipping malformed response: {}", e);
                        continue;
                    }
                };

                let Some(key) = response.id.as_ref().map(id_key) else {
                    tracing::warn!("read_loop: response without id");
                    continue;
                };
                match self.pending.lock().await.remove(&key) {
                    Some(tx) => {
                        let _ = tx.send(response);
                    }
                    None => tracing::debug!("read_loop: no pending request for id={}", key),
                }
            }
        }
    }

    /// Returns whether the connection is attached.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Closes the connection. A spawned server sees end of input and is
    /// waited on.
    pub async fn close(&self) -> Result<(), ClientError> {
        self.connected.store(false, Ordering::SeqCst);

        if let Some(mut writer) = self.writer.lock().await.take() {
            let _ = writer.shutdown().await;
        }

        if let Some(mut child) = self.child.lock().await.take() {
            let status = child.wait().await?;
            tracing::debug!("Server process exited with {}", status);
        }

        let mut pending = self.pending.lock().await;
        tracing::debug!("Clearing {} pending requests", pending.len());
        pending.clear();
        Ok(())
    }

    /// Returns the number of pending requests.
    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }
}

fn id_key(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use taskbridge_protocol::{ResponseError, ToolCallResult};
    use tokio::io::{duplex, split};

    #[test]
    fn test_config_defaults() {
        let config = ConnectionConfig::new();
        assert_eq!(config.read_buffer_size, DEFAULT_READ_BUFFER_SIZE);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_config_buffer_clamping() {
        let config = ConnectionConfig::new().with_read_buffer_size(100); // Below minimum
        assert_eq!(config.read_buffer_size, MIN_READ_BUFFER_SIZE);

        let config = ConnectionConfig::new().with_read_buffer_size(10 * 1024 * 1024); // Above maximum
        assert_eq!(config.read_buffer_size, MAX_READ_BUFFER_SIZE);
    }

    #[test]
    fn test_id_key() {
        assert_eq!(id_key(&json!(7)), "7");
        assert_eq!(id_key(&json!("abc")), "abc");
    }

    #[tokio::test]
    async fn test_request_not_connected() {
        let conn = Connection::new(ConnectionConfig::new());
        let err = conn.request("tools/call", json!({})).await.unwrap_err();
        assert!(matches!(err, ClientError::NotConnected));
    }

    /// Answers requests in reverse order of arrival.
    async fn reversing_peer(stream: tokio::io::DuplexStream, expected: usize) {
        let (mut reader, mut writer) = split(stream);
        let mut decoder = Decoder::new();
        let mut requests = Vec::new();
        let mut buf = [0u8; 1024];

        while requests.len() < expected {
            let n = reader.read(&mut buf).await.unwrap();
            decoder.extend(&buf[..n]);
            while let Some(request) = decoder.decode_request().unwrap() {
                requests.push(request);
            }
        }

        for request in requests.into_iter().rev() {
            let text = request.params["echo"].as_str().unwrap().to_string();
            let response = Response::ok(request.id, ToolCallResult::text(text));
            writer
                .write_all(&Encoder::encode_response(&response).unwrap())
                .await
                .unwrap();
        }
        writer.flush().await.unwrap();
    }

    #[tokio::test]
    async fn test_out_of_order_responses_correlate() {
        let (client_io, peer_io) = duplex(4096);
        let peer = tokio::spawn(reversing_peer(peer_io, 2));

        let conn = Arc::new(Connection::new(ConnectionConfig::new()));
        let (reader, writer) = split(client_io);
        conn.attach(reader, writer).await;

        let reading = conn.clone();
        tokio::spawn(async move { reading.read_loop().await });

        let (a, b) = tokio::join!(
            conn.request("echo", json!({"echo": "first"})),
            conn.request("echo", json!({"echo": "second"})),
        );
        peer.await.unwrap();

        assert_eq!(a.unwrap().result.unwrap().content.as_text(), "first");
        assert_eq!(b.unwrap().result.unwrap().content.as_text(), "second");
        assert_eq!(conn.pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_request_timeout_when_peer_is_silent() {
        let (client_io, _peer_io) = duplex(4096);
        let conn = Arc::new(Connection::new(
            ConnectionConfig::new().with_request_timeout(Duration::from_millis(50)),
        ));
        let (reader, writer) = split(client_io);
        conn.attach(reader, writer).await;

        let reading = conn.clone();
        tokio::spawn(async move { reading.read_loop().await });

        let err = conn.request("tools/call", json!({})).await.unwrap_err();
        assert!(matches!(err, ClientError::Timeout));
        assert_eq!(conn.pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_peer_close_fails_pending_requests() {
        let (client_io, peer_io) = duplex(4096);
        let conn = Arc::new(Connection::new(ConnectionConfig::new()));
        let (reader, writer) = split(client_io);
        conn.attach(reader, writer).await;

        let reading = conn.clone();
        let read_task = tokio::spawn(async move { reading.read_loop().await });

        let closer = tokio::spawn(async move {
            let (mut peer_reader, peer_writer) = split(peer_io);
            let mut buf = [0u8; 256];
            let _ = peer_reader.read(&mut buf).await;
            drop(peer_writer);
            drop(peer_reader);
        });

        let err = conn.request("tools/call", json!({})).await.unwrap_err();
        assert!(matches!(err, ClientError::ConnectionClosed));
        closer.await.unwrap();
        assert!(matches!(
            read_task.await.unwrap(),
            Err(ClientError::ConnectionClosed)
        ));
        assert!(!conn.is_connected());
    }

    #[tokio::test]
    async fn test_error_response_is_delivered() {
        let (client_io, peer_io) = duplex(4096);
        let conn = Arc::new(Connection::new(ConnectionConfig::new()));
        let (reader, writer) = split(client_io);
        conn.attach(reader, writer).await;

        let reading = conn.clone();
        tokio::spawn(async move { reading.read_loop().await });

        tokio::spawn(async move {
            let (mut peer_reader, mut peer_writer) = split(peer_io);
            let mut decoder = Decoder::new();
            let mut buf = [0u8; 256];
            let request = loop {
                let n = peer_reader.read(&mut buf).await.unwrap();
                decoder.extend(&buf[..n]);
                if let Some(request) = decoder.decode_request().unwrap() {
                    break request;
                }
            };
            // Noise the client must skip before the real answer.
            peer_writer.write_all(b"garbage\0\0").await.unwrap();
            let response = Response::error(request.id, ResponseError::unknown_method("x"));
            peer_writer
                .write_all(&Encoder::encode_response(&response).unwrap())
                .await
                .unwrap();
            let _ = peer_reader.read(&mut buf).await;
        });

        let response = conn.request("x", Value::Null).await.unwrap();
        assert_eq!(response.error.unwrap().message, "Unknown method: x");
    }
}
