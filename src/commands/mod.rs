//! Command Handler Module
//!
//! This module implements the command processing layer for gache.
//! It receives request lines, executes them against the storage engine,
//! and returns the response line to send back.
//!
//! ## Architecture
//!
//! ```text
//! Client Request
//!       │
//!       ▼
//! ┌─────────────────┐
//! │ Request Parser  │  (protocol module)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ CommandHandler  │  (this module)
//! │                 │
//! │  - Dispatch     │
//! │  - Execute      │
//! │  - Map errors   │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ StorageEngine   │  (storage module)
//! └─────────────────┘
//! ```

pub mod handler;

// Re-export the main command handler
pub use handler::CommandHandler;
