//! Connection Handler Module
//!
//! This module manages client connections to gache.
//! Each client connection is handled by its own async task, allowing
//! the server to handle thousands of concurrent clients efficiently.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Server (TcpListener)                    │
//! └──────────────────────┬──────────────────────────────────────┘
//!                        │
//!                        │ accept()
//!                        ▼
//!           ┌────────────────────────┐
//!           │   For each client...   │
//!           └────────────┬───────────┘
//!                        │
//!                        │ spawn task
//!                        ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 ConnectionHandler                           │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐     │
//! │  │ Read line   │───>│ Parse line  │───>│ Execute cmd │     │
//! │  └─────────────┘    └─────────────┘    └─────────────┘     │
//! │                                               │             │
//! │                                               ▼             │
//! │                                      ┌─────────────┐        │
//! │                                      │ Send resp   │        │
//! │                                      └─────────────┘        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Features
//!
//! - **Async I/O**: Uses Tokio for non-blocking network operations
//! - **One-Shot or Keep-Alive**: one exchange per connection by default
//! - **Bounded Lines**: request lines are capped at 64 KB
//! - **Statistics**: Tracks connection and request metrics

pub mod handler;
pub mod server;

// Re-export commonly used types
pub use handler::{
    handle_connection, ConnectionError, ConnectionHandler, ConnectionOptions, ConnectionStats,
    MAX_LINE_LENGTH,
};
pub use server::Server;
