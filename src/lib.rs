//! # gache - An In-Memory Key-Value Cache over TCP
//!
//! gache stores scalars, LIFO lists and dictionaries under string keys, each
//! with an optional time-to-live, and serves them over a one-line text protocol.
//!
//! ## Features
//!
//! - **Typed Values**: scalars, lists (stack order) and dictionaries
//! - **Create-Once Semantics**: `SET`/`LSET`/`DSET` never overwrite, `UPD` never creates
//! - **TTL Buckets**: keys are indexed by their expiry second and removed once per second
//! - **Async I/O**: Built on Tokio, one task per connection
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                               gache                                     │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │   Server    │───>│ Connection  │───>│  Command    │                  │
//! │  │ (Listener)  │    │  Handler    │    │  Handler    │                  │
//! │  └─────────────┘    └─────────────┘    └──────┬──────┘                  │
//! │                                               │                         │
//! │                                               ▼                         │
//! │  ┌─────────────┐    ┌──────────────────────────────────────────────┐   │
//! │  │   Request   │    │              StorageEngine                   │   │
//! │  │   Parser    │    │  ┌────────┐ ┌────────┐ ┌────────┐ ┌────────┐ │   │
//! │  │             │    │  │Shard 0 │ │Shard 1 │ │Shard 2 │ │...N    │ │   │
//! │  └─────────────┘    │  │items + │ │items + │ │items + │ │shards  │ │   │
//! │                     │  │buckets │ │buckets │ │buckets │ │        │ │   │
//! │                     │  └────────┘ └────────┘ └────────┘ └────────┘ │   │
//! │                     └──────────────────────────────────────────────┘   │
//! │                                               ▲                         │
//! │                                               │                         │
//! │                     ┌─────────────────────────┴───────────────────────┐ │
//! │                     │           ExpirySweeper                         │ │
//! │                     │      (Background Tokio Task)                    │ │
//! │                     └─────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use gache::{start_expiry_sweeper, Client, Config, Server, StorageEngine};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let storage = Arc::new(StorageEngine::new());
//!     let _sweeper = start_expiry_sweeper(Arc::clone(&storage));
//!
//!     let server = Server::new(Config::default(), storage);
//!     let listener = server.bind().await?;
//!     tokio::spawn(async move { server.run(listener).await });
//!
//!     let mut client = Client::new(gache::DEFAULT_ADDR);
//!     assert_eq!(client.send("SET name Ariz 60").await?, "[201]");
//!     assert_eq!(client.send("GET name").await?, "Ariz");
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`protocol`]: request grammar, request parser and response lines
//! - [`storage`]: thread-safe storage engine with TTL buckets
//! - [`commands`]: dispatch of parsed requests to the engine
//! - [`connection`]: TCP server and per-client connection handling
//! - [`client`]: a client for Rust callers
//! - [`config`]: command-line configuration

pub mod client;
pub mod commands;
pub mod config;
pub mod connection;
pub mod protocol;
pub mod storage;

// Re-export commonly used types for convenience
pub use client::{Client, ClientError};
pub use commands::CommandHandler;
pub use config::Config;
pub use connection::{handle_connection, ConnectionStats, Server};
pub use protocol::{Command, Request, RequestError, Response};
pub use storage::{start_expiry_sweeper, ExpiryConfig, ExpirySweeper, StorageEngine, StorageError};

/// The default address gache listens on
pub const DEFAULT_ADDR: &str = "127.0.0.1:8800";

/// Version of gache
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
