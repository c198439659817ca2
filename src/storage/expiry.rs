//! Background Expiry Sweeper
//!
//! This module implements the background task that removes expired keys.
//! Reads already hide an expired key the moment its expiry second arrives;
//! the sweeper is what actually frees the memory of keys nobody touches again.
//!
//! ## Design
//!
//! The sweeper runs as a Tokio task and, once per tick (default: 1s):
//! 1. Reads the current epoch second
//! 2. Pops every TTL bucket whose second is `<= now`
//! 3. Removes the keys in those buckets through the same path `DEL` uses
//!
//! Because every bucket up to `now` is drained, a tick that fires late (or is
//! skipped under load) is caught up on the next one.

use crate::storage::item::now_epoch;
use crate::storage::StorageEngine;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, Instrument};

/// Configuration for the expiry sweeper.
#[derive(Debug, Clone)]
pub struct ExpiryConfig {
    /// Interval between sweeps (default: 1s)
    pub interval: Duration,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
        }
    }
}

/// A handle to the running expiry sweeper.
///
/// When this handle is dropped, the sweeper task will be stopped.
#[derive(Debug)]
pub struct ExpirySweeper {
    /// Sender to signal shutdown
    shutdown_tx: watch::Sender<bool>,
}

impl ExpirySweeper {
    /// Starts the expiry sweeper as a background task.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Arguments
    ///
    /// * `engine` - The storage engine to sweep
    /// * `config` - Configuration for the sweeper
    ///
    /// # Example
    ///
    /// ```ignore
    /// use gache::storage::{StorageEngine, ExpirySweeper, ExpiryConfig};
    /// use std::sync::Arc;
    ///
    /// let engine = Arc::new(StorageEngine::new());
    /// let sweeper = ExpirySweeper::start(engine, ExpiryConfig::default());
    ///
    /// // Dropping the sweeper will stop it
    /// drop(sweeper);
    /// ```
    pub fn start(engine: Arc<StorageEngine>, config: ExpiryConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let span = tracing::info_span!("sweeper");

        tokio::spawn(sweeper_loop(engine, config, shutdown_rx).instrument(span.clone()));

        info!(parent: &span, "Background expiry sweeper started");

        Self { shutdown_tx }
    }

    /// Stops the expiry sweeper.
    ///
    /// This is called automatically when the handle is dropped.
    pub fn stop(&self) {
        if self.shutdown_tx.send(true).is_ok() {
            debug!("Background expiry sweeper stop requested");
        }
    }
}

impl Drop for ExpirySweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The main sweeper loop.
async fn sweeper_loop(
    engine: Arc<StorageEngine>,
    config: ExpiryConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    info!("Background expiry sweeper stopped");
                    return;
                }
            }
        }

        let expired = engine.expire_due(now_epoch());
        if expired > 0 {
            debug!(
                expired = expired,
                keys_remaining = engine.len(),
                "Expired keys cleaned up"
            );
        }
    }
}

/// Starts the expiry sweeper with default configuration.
pub fn start_expiry_sweeper(engine: Arc<StorageEngine>) -> ExpirySweeper {
    ExpirySweeper::start(engine, ExpiryConfig::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageError;

    fn fast() -> ExpiryConfig {
        ExpiryConfig {
            interval: Duration::from_millis(50),
        }
    }

    #[tokio::test]
    async fn test_sweeper_cleans_expired_keys() {
        let engine = Arc::new(StorageEngine::new());

        for i in 0..10 {
            engine.set(&format!("key{}", i), "value", 1).unwrap();
        }
        engine.lset("list", ["a", "b"], 1).unwrap();
        engine.set("persistent", "value", 0).unwrap();

        assert_eq!(engine.len(), 12);

        let _sweeper = ExpirySweeper::start(Arc::clone(&engine), fast());

        // A 1s TTL is due within two wall-clock seconds
        tokio::time::sleep(Duration::from_millis(2300)).await;

        // Only the persistent key should remain, without any read touching the others
        assert_eq!(engine.len(), 1);
        assert!(engine.get("persistent").is_ok());
    }

    #[tokio::test]
    async fn test_key_expires_after_ttl() {
        let engine = Arc::new(StorageEngine::new());
        let _sweeper = start_expiry_sweeper(Arc::clone(&engine));

        engine.set("key", "value", 3).unwrap();
        assert!(engine.get("key").is_ok());

        tokio::time::sleep(Duration::from_millis(4200)).await;

        assert_eq!(engine.get("key"), Err(StorageError::NotFound));
        assert!(engine.is_empty());
    }

    #[tokio::test]
    async fn test_sweeper_stops_on_drop() {
        let engine = Arc::new(StorageEngine::new());

        {
            let _sweeper = ExpirySweeper::start(Arc::clone(&engine), fast());
            tokio::time::sleep(Duration::from_millis(100)).await;
            // Sweeper is dropped here
        }

        engine.set("key", "value", 1).unwrap();
        tokio::time::sleep(Duration::from_millis(2200)).await;

        // Nobody removed it, but reads hide it anyway
        assert_eq!(engine.len(), 1);
        assert_eq!(engine.get("key"), Err(StorageError::NotFound));
    }
}
