//! gache server
//!
//! This is the main entry point for the gache server.
//! It sets up logging, the storage engine with its expiry sweeper, and the
//! TCP server, then runs until Ctrl+C or the optional exit timer.

use clap::Parser;
use gache::storage::{start_expiry_sweeper, StorageEngine};
use gache::{Config, Server};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // RUST_LOG, when set, overrides the command-line level
    let filter = EnvFilter::builder()
        .with_default_directive(config.level_filter().into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    info!(version = gache::VERSION, "Starting gache");

    // Create the storage engine (shared across all connections)
    let storage = Arc::new(StorageEngine::new());

    // Start the background expiry sweeper
    let _sweeper = start_expiry_sweeper(Arc::clone(&storage));

    let exit_after = config.exit_after();
    let server = Server::new(config, storage);

    // A bind failure ends the process with an error
    let listener = server.bind().await?;

    tokio::select! {
        _ = server.run(listener) => {}
        result = signal::ctrl_c() => {
            match result {
                Ok(()) => info!("Shutdown signal received, stopping server..."),
                Err(e) => warn!(error = %e, "Failed to listen for Ctrl+C, stopping server..."),
            }
        }
        _ = exit_timer(exit_after) => {
            info!("Exit timer elapsed, stopping server...");
        }
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Completes after `delay`, or never when no delay is configured.
async fn exit_timer(delay: Option<Duration>) {
    match delay {
        Some(delay) => tokio::time::sleep(delay).await,
        None => std::future::pending().await,
    }
}
