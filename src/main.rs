//! yts-watcher daemon entry point

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{error, info, trace};
use tracing_subscriber::EnvFilter;

use yts_watcher::{
    Cache, CatalogClient, Config, PollController, PollScheduler, Result, SchedulePattern,
    TorrentFetcher, compile_pattern, wait_for_signal,
};

/// Cache namespace, doubling as the cache file name
const CACHE_NAMESPACE: &str = "yts-watcher";

/// Bounded catalog fetch timeout so a hung upstream cannot stall the schedule
const HTTP_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

#[tokio::main]
async fn main() -> ExitCode {
    // Config path: first argument, or YTS_WATCHER_CONFIG, or ./config.json
    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("YTS_WATCHER_CONFIG").ok())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.json"));

    let config = if config_path.exists() {
        match Config::load(&config_path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("yts-watcher: {}", e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        Config::default()
    };

    // RUST_LOG wins over the configured level when set
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .init();

    info!(config = %config_path.display(), "yts-watcher starting");

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Fatal error");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> Result<()> {
    let pattern_str = compile_pattern(&config.frequency);
    trace!(pattern = %pattern_str, "Cron pattern");
    let pattern = SchedulePattern::parse(&pattern_str)?;

    let http_client = reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .user_agent(concat!("yts-watcher/", env!("CARGO_PKG_VERSION")))
        .build()?;

    let catalog = CatalogClient::new(http_client.clone(), &config);
    let fetcher = TorrentFetcher::new(http_client, config.destination.clone());
    let cache = Cache::load(&config.cache_dir, CACHE_NAMESPACE)?;
    let controller = PollController::new(catalog, fetcher, cache, &config);

    let shutdown = Arc::new(AtomicBool::new(false));
    let driver = PollScheduler::new(controller, pattern, config.run_at_start, shutdown.clone());

    let driver_handle = tokio::spawn(driver.run());

    wait_for_signal().await;
    shutdown.store(true, Ordering::SeqCst);

    // The driver finishes its in-flight cycle (cache save included) before
    // observing the flag; detached transfers are abandoned by design.
    let stats = driver_handle.await.unwrap_or_default();
    info!(total = stats.total, "yts-watcher stopped");
    Ok(())
}
