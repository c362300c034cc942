//! Pulse Relay - Main Entry Point
//! Reads newline-delimited JSON events from stdin and delivers them through the
//! durable priority event queue.

mod logging;
mod relay;
mod settings;

use anyhow::{Context, Result};
use clap::Parser;
use pulse_core::EventTracker;
use pulse_infra_http::HttpCollector;
use pulse_infra_sqlite::SqliteKeyValueStore;
use settings::{Cli, Settings};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1. Initialize logging
    let _log_guard = logging::init_logging()?;
    info!("Pulse relay v{} starting...", pulse_core::VERSION);

    // 2. Load configuration
    let settings = Settings::load(&cli)?;
    let db_path = settings.expanded_db_path()?;
    if let Some(parent) = Path::new(&db_path).parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Cannot create database directory {}", parent.display()))?;
    }

    // 3. Initialize storage
    info!(db_path = %db_path, "Opening queue store...");
    let store = SqliteKeyValueStore::connect(&db_path)
        .await
        .context("Failed to open queue store")?;

    // 4. Wire the queue
    info!(collector_url = %settings.collector_url, "Starting event queue...");
    let collector = HttpCollector::new(settings.collector_url.clone());
    let tracker = EventTracker::with_defaults(
        settings.queue.clone(),
        Arc::new(store),
        Arc::new(collector),
    )
    .context("Failed to create event queue")?;
    tracker.start();

    // 5. Relay stdin until EOF or Ctrl+C
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut relayed = 0usize;
    let mut interrupted = false;

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                interrupted = true;
                break;
            }
            line = lines.next_line() => match line.context("Failed to read stdin")? {
                Some(line) => {
                    if relay::forward(&tracker, &line) {
                        relayed += 1;
                    }
                }
                None => {
                    info!(relayed, "Input closed");
                    break;
                }
            },
        }
    }

    // 6. Graceful shutdown
    if !interrupted {
        relay::wait_for_drain(&tracker, Duration::from_secs(settings.drain_timeout_secs)).await?;
    }
    tracker.stop().await;

    info!("Shutdown complete.");
    Ok(())
}
