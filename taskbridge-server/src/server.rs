//! Stdio server implementation.

use crate::error::ServerError;
use crate::handler::{Dispatcher, DEFAULT_TOOL_TIMEOUT};
use crate::registry::ToolRegistry;
use futures::FutureExt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use taskbridge_protocol::{Encoder, FrameDecoder, Request, Response};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

/// Responses queued for the writer before request tasks start waiting.
const RESPONSE_QUEUE_CAPACITY: usize = 256;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Upper bound on a single tool invocation.
    pub tool_timeout: Duration,
    /// How long in-flight requests may run after input ends.
    pub shutdown_grace: Duration,
    /// Size of each read from the input stream.
    pub read_buffer_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
            shutdown_grace: Duration::from_secs(5),
            read_buffer_size: 8192,
        }
    }
}

impl ServerConfig {
    pub fn from_settings(settings: &crate::config::ServerSettings) -> Self {
        Self {
            tool_timeout: settings.tool_timeout(),
            shutdown_grace: settings.shutdown_grace(),
            read_buffer_size: settings.read_buffer_size(),
        }
    }
}

/// Server statistics.
#[derive(Debug, Default)]
pub struct ServerStats {
    pub frames_total: AtomicU64,
    pub parse_failures: AtomicU64,
    pub responses_written: AtomicU64,
    pub aborted_total: AtomicU64,
}

/// NUL-delimited JSON-RPC server over a byte stream pair.
///
/// Requests are dispatched concurrently; responses are written whole, one
/// envelope per frame, in completion order.
pub struct Server {
    config: ServerConfig,
    dispatcher: Arc<Dispatcher>,
    stats: Arc<ServerStats>,
}

impl Server {
    /// Creates a new server.
    pub fn new(config: ServerConfig, registry: ToolRegistry) -> Self {
        let dispatcher = Dispatcher::new(registry).with_tool_timeout(config.tool_timeout);
        Self {
            config,
            dispatcher: Arc::new(dispatcher),
            stats: Arc::new(ServerStats::default()),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn stats(&self) -> &Arc<ServerStats> {
        &self.stats
    }

    /// Serves stdin/stdout until stdin reaches end of stream.
    pub async fn run(&self) -> Result<(), ServerError> {
        tracing::info!(
            "Serving on stdio (tools: {})",
            self.dispatcher.registry().names().join(", ")
        );
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Serves requests read from `reader`, writing responses to `writer`.
    ///
    /// Returns once the input has ended and every in-flight request has
    /// either completed or been abandoned after the shutdown grace period.
    /// If the output fails first, reading stops at once, in-flight requests
    /// are aborted and the write error is returned.
    pub async fn serve<R, W>(&self, mut reader: R, writer: W) -> Result<(), ServerError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel::<Response>(RESPONSE_QUEUE_CAPACITY);
        let writer_task = tokio::spawn(Self::write_loop(writer, rx, self.stats.clone()));

        let mut frames = FrameDecoder::with_capacity(self.config.read_buffer_size);
        let mut buf = vec![0u8; self.config.read_buffer_size];
        let mut in_flight = JoinSet::new();
        let mut output_closed = false;

        let read_result = loop {
            tokio::select! {
                biased;

                // The writer drops its receiver only when a write fails
                _ = tx.closed() => {
                    tracing::error!("Output closed, no longer accepting requests");
                    output_closed = true;
                    break Ok(());
                }
                result = reader.read(&mut buf) => match result {
                    Ok(0) => {
                        tracing::debug!("Input closed");
                        break Ok(());
                    }
                    Ok(n) => {
                        for frame in frames.feed(&buf[..n]) {
                            if tx.is_closed() {
                                break;
                            }
                            if frame.is_empty() {
                                continue;
                            }
                            self.stats.frames_total.fetch_add(1, Ordering::Relaxed);
                            match Request::parse(&frame) {
                                Ok(request) => self.spawn_request(request, &mut in_flight, &tx),
                                Err(e) => {
                                    self.stats.parse_failures.fetch_add(1, Ordering::Relaxed);
                                    tracing::warn!("Dropping unparseable message: {}", e);
                                }
                            }
                        }
                    }
                    Err(e) => {
                        tracing::error!("Read error: {}", e);
                        break Err(ServerError::Io(e));
                    }
                },
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    Self::reap(joined);
                }
            }
        };

        let remainder = frames.finish();
        if !remainder.is_empty() {
            tracing::debug!(
                "Discarding {} bytes of unterminated input",
                remainder.len()
            );
        }

        if output_closed {
            self.abort_all(&mut in_flight).await;
        } else {
            self.drain(&mut in_flight).await;
        }

        drop(tx);
        match writer_task.await {
            Ok(result) => result?,
            Err(e) => return Err(ServerError::Writer(e.to_string())),
        }
        read_result
    }

    fn spawn_request(
        &self,
        request: Request,
        in_flight: &mut JoinSet<()>,
        tx: &mpsc::Sender<Response>,
    ) {
        let dispatcher = self.dispatcher.clone();
        let tx = tx.clone();
        in_flight.spawn(async move {
            let response = dispatcher.dispatch(request).await;
            if tx.send(response).await.is_err() {
                tracing::debug!("Output closed, dropping response");
            }
        });
    }

    /// Waits up to the shutdown grace for in-flight requests, then aborts
    /// the rest. Aborted requests get no response.
    async fn drain(&self, in_flight: &mut JoinSet<()>) {
        if in_flight.is_empty() {
            return;
        }
        tracing::info!("Waiting for {} in-flight request(s)", in_flight.len());

        let grace = self.config.shutdown_grace;
        let finished = tokio::time::timeout(grace, async {
            while let Some(joined) = in_flight.join_next().await {
                Self::reap(joined);
            }
        })
        .await;

        if finished.is_err() {
            let remaining = in_flight.len();
            tracing::warn!(
                "Abandoning {} request(s) still running after {:?}",
                remaining,
                grace
            );
            self.abort_all(in_flight).await;
        }
    }

    async fn abort_all(&self, in_flight: &mut JoinSet<()>) {
        while let Some(joined) = in_flight.join_next().now_or_never().flatten() {
            Self::reap(joined);
        }
        let remaining = in_flight.len();
        if remaining == 0 {
            return;
        }
        self.stats
            .aborted_total
            .fetch_add(remaining as u64, Ordering::Relaxed);
        in_flight.shutdown().await;
    }

    fn reap(joined: Result<(), tokio::task::JoinError>) {
        if let Err(e) = joined {
            if e.is_panic() {
                tracing::error!("Request task panicked: {}", e);
            }
        }
    }

    /// Writes each response as one frame, flushing after every envelope so
    /// that no two envelopes interleave.
    async fn write_loop<W>(
        mut writer: W,
        mut rx: mpsc::Receiver<Response>,
        stats: Arc<ServerStats>,
    ) -> Result<(), ServerError>
    where
        W: AsyncWrite + Unpin,
    {
        while let Some(response) = rx.recv().await {
            let bytes = match Encoder::encode_response(&response) {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::error!("Failed to encode response: {}", e);
                    continue;
                }
            };
            writer.write_all(&bytes).await?;
            writer.flush().await?;
            stats.responses_written.fetch_add(1, Ordering::Relaxed);
        }
        writer.shutdown().await?;
        Ok(())
    }
}
