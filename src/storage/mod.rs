//! Storage Engine Module
//!
//! This module provides the core storage functionality for gache.
//! It includes a thread-safe, sharded cache of typed values with
//! per-key TTL and a background expiry sweeper.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     StorageEngine                           │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │...64    │           │
//! │  │ items   │ │ items   │ │ items   │ │ shards  │           │
//! │  │ buckets │ │ buckets │ │ buckets │ │         │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!                            │ expire_due(now)
//!              ┌─────────────┴─────────────┐
//!              │     ExpirySweeper         │
//!              │  (Background Tokio Task)  │
//!              └───────────────────────────┘
//! ```
//!
//! ## Features
//!
//! - **Typed Values**: scalars, LIFO lists and dictionaries
//! - **Create-Once Keys**: `set`/`lset`/`dset` never overwrite
//! - **TTL Buckets**: keys are indexed by the second they expire in
//! - **Lazy Visibility**: expired keys are hidden from reads immediately
//! - **Active Expiry**: the sweeper removes due buckets once per second
//!
//! ## Example
//!
//! ```
//! use gache::storage::StorageEngine;
//! use std::sync::Arc;
//!
//! let engine = Arc::new(StorageEngine::new());
//!
//! engine.set("name", "Ariz", 0).unwrap();
//! assert_eq!(engine.get("name").unwrap().to_string(), "Ariz");
//!
//! engine.lset("jobs", ["build", "test"], 3600).unwrap();
//! assert_eq!(engine.lpop("jobs").unwrap(), "test");
//! ```

pub mod engine;
pub mod expiry;
pub mod item;

// Re-export commonly used types
pub use engine::{StorageEngine, StorageError, StorageResult, StorageStats};
pub use expiry::{start_expiry_sweeper, ExpiryConfig, ExpirySweeper};
pub use item::{now_epoch, DictSeed, Value, NO_EXPIRE};
