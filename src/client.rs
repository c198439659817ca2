//! TCP Client
//!
//! A small client for talking to a gache server from Rust code.
//!
//! ```ignore
//! use gache::Client;
//!
//! let mut client = Client::new("127.0.0.1:8800");
//! let resp = client.send(&format!("SET {} {} {}", key, value, ttl)).await?;
//! assert_eq!(resp, "[201]");
//!
//! let value = client.send(&format!("GET {}", key)).await?;
//! ```
//!
//! By default every `send` opens a fresh connection, writes the request,
//! half-closes the write side and reads one response line. With keep-alive
//! the connection is reused and never half-closed.

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, Span};

/// Errors returned by [`Client::send`].
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network failure while connecting, writing or reading
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The server closed the connection without answering
    #[error("Empty response")]
    EmptyResponse,

    /// The address resolved to nothing
    #[error("Unable to resolve address {0}")]
    Resolve(String),
}

/// A gache client bound to one server address.
pub struct Client {
    addr: String,
    keep_alive: bool,
    conn: Option<BufReader<TcpStream>>,
    span: Span,
}

impl Client {
    /// Creates a client that opens one connection per request.
    pub fn new(addr: impl Into<String>) -> Self {
        let addr = addr.into();
        let span = tracing::info_span!("client", addr = %addr);
        Self {
            addr,
            keep_alive: false,
            conn: None,
            span,
        }
    }

    /// Creates a client that reuses one connection across requests.
    ///
    /// The server must run in keep-alive mode as well.
    pub fn keep_alive(addr: impl Into<String>) -> Self {
        let mut client = Self::new(addr);
        client.keep_alive = true;
        client
    }

    /// The server address this client talks to.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Sends one request line and returns the response line, trimmed.
    ///
    /// Error responses such as `[404] Key not found` are returned as `Ok`;
    /// only transport failures are `Err`.
    pub async fn send(&mut self, line: &str) -> Result<String, ClientError> {
        let mut conn = match self.conn.take() {
            Some(conn) => conn,
            None => self.connect().await?,
        };

        let result = exchange(&mut conn, line, self.keep_alive).await;
        match &result {
            Ok(resp) => {
                debug!(parent: &self.span, request = line, response = %resp, "Exchange complete");
                if self.keep_alive {
                    self.conn = Some(conn);
                }
            }
            Err(e) => debug!(parent: &self.span, request = line, error = %e, "Exchange failed"),
        }
        result
    }

    /// Drops the kept-alive connection, if any.
    pub fn close(&mut self) {
        self.conn = None;
    }

    async fn connect(&self) -> Result<BufReader<TcpStream>, ClientError> {
        let addr = tokio::net::lookup_host(&self.addr)
            .await?
            .next()
            .ok_or_else(|| ClientError::Resolve(self.addr.clone()))?;

        let stream = TcpStream::connect(addr).await.inspect_err(|e| {
            debug!(parent: &self.span, error = %e, "Dial error");
        })?;
        Ok(BufReader::new(stream))
    }
}

/// Writes `line` and reads back one response line.
async fn exchange(
    conn: &mut BufReader<TcpStream>,
    line: &str,
    keep_alive: bool,
) -> Result<String, ClientError> {
    let mut msg = Vec::with_capacity(line.len() + 2);
    msg.extend_from_slice(line.as_bytes());
    msg.extend_from_slice(b"\r\n");
    conn.get_mut().write_all(&msg).await?;

    if !keep_alive {
        // Half-close so the server sees the end of the request
        conn.get_mut().shutdown().await?;
    }

    let mut resp = String::new();
    if conn.read_line(&mut resp).await? == 0 {
        return Err(ClientError::EmptyResponse);
    }
    Ok(resp.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::connection::Server;
    use crate::storage::StorageEngine;
    use std::sync::Arc;
    use tokio::net::TcpListener;

    async fn start_server(keep_alive: bool) -> String {
        let config = Config {
            addr: "127.0.0.1:0".to_string(),
            keep_alive,
            ..Config::default()
        };
        let server = Server::new(config, Arc::new(StorageEngine::new()));
        let listener = server.bind().await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move { server.run(listener).await });
        addr
    }

    #[tokio::test]
    async fn test_send_per_connection() {
        let addr = start_server(false).await;
        let mut client = Client::new(addr);

        assert_eq!(client.send("DSET d a 1 b 2 0").await.unwrap(), "[201]");
        assert_eq!(client.send("DGET d b").await.unwrap(), "2");
        assert_eq!(client.send("DGET d c").await.unwrap(), "[404] Key not found");
        assert!(client.conn.is_none());
    }

    #[tokio::test]
    async fn test_keep_alive_reuses_connection() {
        let addr = start_server(true).await;
        let mut client = Client::keep_alive(addr);

        assert_eq!(client.send("SET k v 0").await.unwrap(), "[201]");
        assert!(client.conn.is_some());
        assert_eq!(client.send("UPD k w 0").await.unwrap(), "[204]");
        assert_eq!(client.send("GET k").await.unwrap(), "w");

        client.close();
        assert!(client.conn.is_none());
        assert_eq!(client.send("GET k").await.unwrap(), "w");
    }

    #[tokio::test]
    async fn test_empty_response() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        // Accept and hang up without answering
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            drop(stream);
        });

        let mut client = Client::new(addr);
        let result = client.send("GET k").await;
        assert!(matches!(
            result,
            Err(ClientError::EmptyResponse) | Err(ClientError::Io(_))
        ));
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let mut client = Client::new(addr);
        assert!(matches!(client.send("GET k").await, Err(ClientError::Io(_))));
    }
}
