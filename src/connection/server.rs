//! TCP Server
//!
//! Accepts connections and spawns one task per client. All tasks share the
//! storage engine and the connection statistics.

use crate::commands::CommandHandler;
use crate::config::Config;
use crate::connection::handler::{handle_connection, ConnectionOptions, ConnectionStats};
use crate::storage::StorageEngine;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, Instrument, Span};

/// The cache server.
pub struct Server {
    config: Config,
    storage: Arc<StorageEngine>,
    stats: Arc<ConnectionStats>,
    span: Span,
}

impl Server {
    /// Creates a server around an existing storage engine.
    pub fn new(config: Config, storage: Arc<StorageEngine>) -> Self {
        Self {
            config,
            storage,
            stats: Arc::new(ConnectionStats::new()),
            span: tracing::info_span!("server"),
        }
    }

    /// Binds the configured listen address.
    pub async fn bind(&self) -> io::Result<TcpListener> {
        let listener = TcpListener::bind(&self.config.addr).await?;
        info!(parent: &self.span, addr = %listener.local_addr()?, "Listening");
        Ok(listener)
    }

    /// Shared connection statistics.
    pub fn stats(&self) -> Arc<ConnectionStats> {
        Arc::clone(&self.stats)
    }

    /// The storage engine the server executes against.
    pub fn storage(&self) -> Arc<StorageEngine> {
        Arc::clone(&self.storage)
    }

    fn options(&self) -> ConnectionOptions {
        ConnectionOptions {
            keep_alive: self.config.keep_alive,
            read_timeout: self.config.read_timeout(),
        }
    }

    /// Main loop that accepts incoming connections.
    ///
    /// Accept errors are logged and the loop keeps going; it only ends when
    /// the future is dropped.
    pub async fn run(&self, listener: TcpListener) {
        let options = self.options();

        async {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => self.spawn_connection(stream, addr, options),
                    Err(e) => {
                        error!(error = %e, "Failed to accept connection");
                    }
                }
            }
        }
        .instrument(self.span.clone())
        .await
    }

    fn spawn_connection(
        &self,
        stream: tokio::net::TcpStream,
        addr: SocketAddr,
        options: ConnectionOptions,
    ) {
        let handler = CommandHandler::new(Arc::clone(&self.storage));
        let stats = Arc::clone(&self.stats);

        tokio::spawn(handle_connection(stream, addr, handler, options, stats));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Client;
    use std::sync::atomic::Ordering;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    async fn create_test_server(keep_alive: bool) -> (SocketAddr, Arc<Server>) {
        let config = Config {
            addr: "127.0.0.1:0".to_string(),
            keep_alive,
            ..Config::default()
        };
        let server = Arc::new(Server::new(config, Arc::new(StorageEngine::new())));
        let listener = server.bind().await.unwrap();
        let addr = listener.local_addr().unwrap();

        let running = Arc::clone(&server);
        tokio::spawn(async move { running.run(listener).await });

        (addr, server)
    }

    #[tokio::test]
    async fn test_set_get_through_client() {
        let (addr, _) = create_test_server(false).await;
        let mut client = Client::new(addr.to_string());

        assert_eq!(client.send("SET key somevalue 10").await.unwrap(), "[201]");
        assert_eq!(client.send("GET key").await.unwrap(), "somevalue");
        assert_eq!(
            client.send("SET key somevalue 10").await.unwrap(),
            "[400] Key already exists"
        );
    }

    #[tokio::test]
    async fn test_connection_closed_after_one_exchange() {
        let (addr, _) = create_test_server(false).await;

        // No half-close from our side: the server ends the exchange itself
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(b"SET a 1 0\n").await.unwrap();

        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, b"[201]\n");
    }

    #[tokio::test]
    async fn test_keep_alive_pipelining() {
        let (addr, server) = create_test_server(true).await;

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"LSET l a b 0\nLPOP l\nLPOP l\nLPOP l\n")
            .await
            .unwrap();
        stream.shutdown().await.unwrap();

        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).await.unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "[201]\nb\na\n[404] Key not found\n"
        );

        let stats = server.stats();
        assert_eq!(stats.requests_processed.load(Ordering::Relaxed), 4);
    }

    #[tokio::test]
    async fn test_concurrent_clients() {
        let (addr, server) = create_test_server(false).await;

        let tasks: Vec<_> = (0..20)
            .map(|i| {
                let addr = addr.to_string();
                tokio::spawn(async move {
                    let mut client = Client::new(addr);
                    client.send(&format!("SET k{} v{} 0", i, i)).await.unwrap()
                })
            })
            .collect();

        for task in tasks {
            assert_eq!(task.await.unwrap(), "[201]");
        }

        assert_eq!(server.storage().len(), 20);
        assert_eq!(
            server.stats().connections_accepted.load(Ordering::Relaxed),
            20
        );
    }

    #[tokio::test]
    async fn test_connection_stats() {
        let (addr, server) = create_test_server(true).await;
        let stats = server.stats();

        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 0);

        let stream = TcpStream::connect(addr).await.unwrap();

        // Give the server time to accept the connection
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        assert_eq!(stats.connections_accepted.load(Ordering::Relaxed), 1);
        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 1);

        drop(stream);
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 0);
    }
}
