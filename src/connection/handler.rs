//! Connection Handler Module
//!
//! This module handles individual client connections to gache.
//! Each client gets its own handler task that reads request lines and
//! writes one response line per request.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! 1. Client connects (TCP handshake)
//!        │
//!        ▼
//! 2. ConnectionHandler spawned
//!        │
//!        ▼
//! 3. ┌──────────────────────────────┐
//!    │  Read one line (until \n)    │
//!    │              │               │
//!    │              ▼               │
//!    │  Parse + execute request     │
//!    │              │               │
//!    │              ▼               │
//!    │  Write one response line     │
//!    │              │               │
//!    │              ▼               │
//!    │  keep-alive? ──yes──> loop   │
//!    └──────────────┬───────────────┘
//!                   │ no
//!                   ▼
//! 4. Shut down the write half, handler task ends
//! ```
//!
//! ## Framing
//!
//! A request ends at the first `\n`. A final line without `\n` is still
//! executed when the client half-closes its write side. Lines longer than
//! [`MAX_LINE_LENGTH`] are answered with `[500]` and the connection is closed.
//! A line that is not valid UTF-8 is answered with `[400] Bad value` and
//! never reaches the storage engine.

use crate::commands::CommandHandler;
use crate::protocol::{status, RequestError, Response};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, trace, warn, Instrument};

/// Maximum length of one request line (64 KB), newline excluded
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Initial line buffer capacity
const INITIAL_LINE_SIZE: usize = 256;

/// Statistics for connection handling
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Total requests processed
    pub requests_processed: AtomicU64,
    /// Total bytes read
    pub bytes_read: AtomicU64,
    /// Total bytes written
    pub bytes_written: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn request_processed(&self) {
        self.requests_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written
            .fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// Per-connection behaviour.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConnectionOptions {
    /// Serve requests until the client closes instead of one exchange
    pub keep_alive: bool,
    /// Close the connection if no complete line arrives in this time
    pub read_timeout: Option<Duration>,
}

/// Handles a single client connection.
///
/// Generic over the stream so the framing can be driven by in-memory mocks
/// as well as by a `TcpStream`.
pub struct ConnectionHandler<S> {
    /// The client stream; writes pass straight through the reader
    stream: BufReader<S>,

    /// Client's address (for logging)
    addr: SocketAddr,

    /// Buffer for the current request line
    line: Vec<u8>,

    /// The command handler (shared across connections)
    command_handler: CommandHandler,

    options: ConnectionOptions,

    /// Connection statistics (shared)
    stats: Arc<ConnectionStats>,
}

impl<S> ConnectionHandler<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new connection handler.
    ///
    /// # Arguments
    ///
    /// * `stream` - The client stream for this connection
    /// * `addr` - The client's socket address
    /// * `command_handler` - The command handler for executing requests
    /// * `options` - Keep-alive and read timeout settings
    /// * `stats` - Shared connection statistics
    pub fn new(
        stream: S,
        addr: SocketAddr,
        command_handler: CommandHandler,
        options: ConnectionOptions,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        stats.connection_opened();

        Self {
            stream: BufReader::new(stream),
            addr,
            line: Vec::with_capacity(INITIAL_LINE_SIZE),
            command_handler,
            options,
            stats,
        }
    }

    /// Runs the connection until the exchange is complete, the client
    /// disconnects, or an error occurs.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        debug!(client = %self.addr, keep_alive = self.options.keep_alive, "Client connected");

        let result = self.main_loop().await;

        match &result {
            Ok(()) => debug!("Client disconnected gracefully"),
            Err(ConnectionError::IoError(io_err))
                if io_err.kind() == std::io::ErrorKind::ConnectionReset =>
            {
                debug!("Connection reset by client")
            }
            Err(ConnectionError::ReadTimeout) => debug!("Read timed out, closing"),
            Err(e) => warn!(error = %e, "Connection error"),
        }

        self.stats.connection_closed();
        result
    }

    /// The main read-execute-respond loop.
    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            match self.read_line().await {
                Ok(()) => {}
                Err(ConnectionError::ClientDisconnected) => return Ok(()),
                Err(e @ (ConnectionError::LineTooLong { .. } | ConnectionError::IoError(_))) => {
                    // Best effort: the peer may already be gone
                    let response = Response::error(status::INTERNAL_ERROR, e.to_string());
                    if let Err(send_err) = self.send_response(&response).await {
                        trace!(error = %send_err, "Could not report read failure");
                    }
                    return Err(e);
                }
                Err(e) => return Err(e),
            };

            let response = match std::str::from_utf8(&self.line) {
                Ok(line) => self.command_handler.execute_line(line),
                Err(e) => {
                    warn!(error = %e, "Request is not valid UTF-8");
                    RequestError::BadValue.into()
                }
            };
            self.stats.request_processed();
            self.send_response(&response).await?;

            if !self.options.keep_alive {
                self.stream.shutdown().await?;
                return Ok(());
            }
        }
    }

    /// Reads one raw request line into `self.line`, terminator included.
    async fn read_line(&mut self) -> Result<(), ConnectionError> {
        self.line.clear();

        // One byte over the limit tells a maximal line apart from an over-long one
        let mut limited = (&mut self.stream).take(MAX_LINE_LENGTH as u64 + 1);
        let read = limited.read_until(b'\n', &mut self.line);

        let n = match self.options.read_timeout {
            Some(limit) => tokio::time::timeout(limit, read)
                .await
                .map_err(|_| ConnectionError::ReadTimeout)??,
            None => read.await?,
        };

        if n == 0 {
            return Err(ConnectionError::ClientDisconnected);
        }
        self.stats.bytes_read(n);

        if n > MAX_LINE_LENGTH && !self.line.ends_with(b"\n") {
            return Err(ConnectionError::LineTooLong {
                max: MAX_LINE_LENGTH,
            });
        }

        trace!(bytes = n, "Read request line");
        Ok(())
    }

    /// Sends a response to the client.
    async fn send_response(&mut self, response: &Response) -> Result<(), ConnectionError> {
        let bytes = response.serialize();
        self.stream.write_all(&bytes).await?;
        self.stream.flush().await?;
        self.stats.bytes_written(bytes.len());
        trace!(bytes = bytes.len(), code = response.code(), "Sent response");
        Ok(())
    }
}

/// Errors that can occur while handling a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Client closed the connection before sending a request
    #[error("Client disconnected")]
    ClientDisconnected,

    /// Request line exceeded the size limit
    #[error("Request line exceeds {max} bytes")]
    LineTooLong { max: usize },

    /// No complete request line arrived in time
    #[error("Read timed out")]
    ReadTimeout,
}

/// Handles a client connection.
///
/// This is a convenience function that creates a ConnectionHandler, runs it
/// to completion inside a `conn` span carrying the client address, and
/// swallows the error after it has been logged.
pub async fn handle_connection<S>(
    stream: S,
    addr: SocketAddr,
    command_handler: CommandHandler,
    options: ConnectionOptions,
    stats: Arc<ConnectionStats>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let span = tracing::info_span!("conn", client = %addr);
    let handler = ConnectionHandler::new(stream, addr, command_handler, options, stats);
    if let Err(e) = handler.run().instrument(span.clone()).await {
        trace!(parent: &span, error = %e, "Connection ended with error");
    }
    info!(parent: &span, "Connection closed");
}
