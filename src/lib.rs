//! # yts-watcher
//!
//! Polls the YTS catalog on a schedule and downloads newly listed torrent
//! files exactly once, remembering what it already fetched across restarts.
//!
//! ## How it works
//!
//! A recurring trigger (compiled from either an explicit cron pattern or a
//! `(unit, value)` frequency) drives poll cycles. Each cycle fetches one page
//! of recent movies, skips everything already recorded in the durable cache,
//! applies the configured MPA rating filter, fires off a detached transfer
//! per qualifying item, and flushes the cache together with the
//! `last_uploaded` watermark. Cycles are serialized; downloads are
//! fire-and-forget.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::sync::atomic::AtomicBool;
//! use yts_watcher::{
//!     Cache, CatalogClient, Config, PollController, PollScheduler, SchedulePattern,
//!     TorrentFetcher, compile_pattern,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let pattern = SchedulePattern::parse(&compile_pattern(&config.frequency))?;
//!
//!     let http_client = reqwest::Client::new();
//!     let catalog = CatalogClient::new(http_client.clone(), &config);
//!     let fetcher = TorrentFetcher::new(http_client, config.destination.clone());
//!     let cache = Cache::load(&config.cache_dir, "yts-watcher")?;
//!     let controller = PollController::new(catalog, fetcher, cache, &config);
//!
//!     let shutdown = Arc::new(AtomicBool::new(false));
//!     let driver = PollScheduler::new(controller, pattern, config.run_at_start, shutdown);
//!     driver.run().await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Durable cache of processed items
pub mod cache;
/// Catalog client and response parsing
pub mod catalog;
/// Configuration types
pub mod config;
/// Fire-and-forget torrent transfers
pub mod download;
/// Error types
pub mod error;
/// Poll cycle orchestration
pub mod poller;
/// Schedule pattern compilation and triggers
pub mod schedule;
/// Scheduler driver
pub mod scheduler;

// Re-export commonly used types
pub use cache::Cache;
pub use catalog::{CatalogClient, CatalogItem, parse_listing};
pub use config::{Config, FrequencyConfig, QueryConfig};
pub use download::TorrentFetcher;
pub use error::{CacheError, Error, Result};
pub use poller::{CycleStats, PollController};
pub use schedule::{SchedulePattern, compile_pattern};
pub use scheduler::{PollScheduler, RunStats};

/// Wait for a termination signal.
///
/// On Unix this listens for SIGTERM and SIGINT, falling back to
/// `tokio::signal::ctrl_c()` if handler registration fails (restricted
/// environments, containers). Elsewhere it waits for Ctrl+C.
pub async fn wait_for_signal() {
    imp::wait().await;
}

#[cfg(unix)]
mod imp {
    use tokio::signal::unix::{SignalKind, signal};

    pub async fn wait() {
        match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => tracing::info!("Received SIGTERM signal"),
                    _ = sigint.recv() => tracing::info!("Received SIGINT signal (Ctrl+C)"),
                }
            }
            _ => {
                tracing::warn!("Could not register signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
mod imp {
    pub async fn wait() {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
