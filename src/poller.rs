//! Poll cycle orchestration
//!
//! One cycle fetches the current catalog page, decides per item whether to
//! download, and flushes the cache. The decision logic is cache-driven, not
//! watermark-driven: an item already marked seen is never re-downloaded even
//! if its timestamp is below the watermark, and an unseen item is evaluated
//! regardless of how its timestamp compares to the watermark. The watermark
//! only seeds the first run and feeds observability.
//!
//! One asymmetry is carried over deliberately: items rejected by the MPA
//! rating filter are not cached as seen, so they are re-evaluated on every
//! cycle they still appear in the page, while accepted items are always
//! cached.

use crate::cache::Cache;
use crate::catalog::{CatalogClient, parse_listing};
use crate::config::Config;
use crate::download::TorrentFetcher;
use crate::error::Result;
use tracing::debug;

/// Counters for one completed cycle
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CycleStats {
    /// Items on the fetched catalog page
    pub listed: usize,

    /// Downloads initiated this cycle
    pub downloaded: usize,
}

/// Runs the fetch-filter-download-persist pass
///
/// The controller is the cache's single writer: all mutation happens here, on
/// the driver's timeline, never from a detached transfer task.
pub struct PollController {
    catalog: CatalogClient,
    fetcher: TorrentFetcher,
    cache: Cache,
    mpa_ratings: Vec<String>,
    since: i64,
}

impl PollController {
    /// Assemble a controller from its collaborators
    pub fn new(catalog: CatalogClient, fetcher: TorrentFetcher, cache: Cache, config: &Config) -> Self {
        Self {
            catalog,
            fetcher,
            cache,
            mpa_ratings: config.query.mpa_ratings.clone(),
            since: config.since,
        }
    }

    /// Read-only view of the cache, for callers reporting on state
    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    /// Run one full poll cycle
    ///
    /// Items are processed in response order. For each item not yet in the
    /// cache: the MPA filter decides whether a download is initiated and the
    /// id marked seen; the watermark advances on every evaluated item either
    /// way. The cache is saved even when nothing qualified.
    ///
    /// # Errors
    /// Fetch and parse failures are recoverable (skip this cycle, retry on
    /// the next trigger). A cache save failure is fatal to the cycle and
    /// surfaced as [`Error::Cache`](crate::error::Error::Cache).
    pub async fn run_cycle(&mut self) -> Result<CycleStats> {
        let body = self.catalog.fetch_recent().await?;
        let items = parse_listing(&body)?;

        let mut last = self.cache.last_uploaded().unwrap_or(self.since);
        let mut downloaded = 0;

        for item in &items {
            if self.cache.seen(item.id) {
                continue;
            }
            debug!(title = %item.title_long, "Examining");

            if !self.mpa_ratings.is_empty() && !self.mpa_ratings.contains(&item.mpa_rating) {
                // Not cached: the item stays eligible for re-evaluation as
                // long as it remains on the page
                debug!(
                    title = %item.title_long,
                    rating = %item.mpa_rating,
                    "Ignoring because of MPA rating"
                );
            } else {
                self.fetcher.spawn(&item.torrent_url, &item.title);
                downloaded += 1;
                self.cache.mark_seen(item.id);
            }

            if item.date_uploaded_unix > last {
                last = item.date_uploaded_unix;
            }
        }

        self.cache.set_last_uploaded(last);
        self.cache.save().await?;

        Ok(CycleStats {
            listed: items.len(),
            downloaded,
        })
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QueryConfig;
    use crate::error::Error;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn movie_json(server_uri: &str, id: u64, title: &str, rating: &str, uploaded: i64) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "title": title,
            "title_long": format!("{} (2026)", title),
            "mpa_rating": rating,
            "date_uploaded_unix": uploaded,
            "torrents": [{ "url": format!("{}/torrent/{}", server_uri, id) }]
        })
    }

    async fn mount_listing(server: &MockServer, movies: Vec<serde_json::Value>) {
        let body = serde_json::json!({ "status": "ok", "data": { "movies": movies } });
        Mock::given(method("GET"))
            .and(path("/api/v2/list_movies.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"d0:e".to_vec()))
            .mount(server)
            .await;
    }

    struct Harness {
        controller: PollController,
        _cache_dir: tempfile::TempDir,
        _dest_dir: tempfile::TempDir,
    }

    fn harness(server_uri: &str, mpa_ratings: Vec<String>, since: i64) -> Harness {
        let cache_dir = tempfile::tempdir().unwrap();
        let dest_dir = tempfile::tempdir().unwrap();
        let config = Config {
            baseurl: format!("{}/api/v2", server_uri),
            query: QueryConfig {
                mpa_ratings,
                ..Default::default()
            },
            since,
            ..Default::default()
        };

        let http_client = reqwest::Client::new();
        let catalog = CatalogClient::new(http_client.clone(), &config);
        let fetcher = TorrentFetcher::new(http_client, dest_dir.path().to_path_buf());
        let cache = Cache::load(cache_dir.path(), "yts-watcher").unwrap();

        Harness {
            controller: PollController::new(catalog, fetcher, cache, &config),
            _cache_dir: cache_dir,
            _dest_dir: dest_dir,
        }
    }

    #[tokio::test]
    async fn test_new_items_are_downloaded_and_cached() {
        let server = MockServer::start().await;
        mount_listing(
            &server,
            vec![
                movie_json(&server.uri(), 1, "One", "R", 100),
                movie_json(&server.uri(), 2, "Two", "PG-13", 200),
            ],
        )
        .await;

        let mut h = harness(&server.uri(), vec![], 0);
        let stats = h.controller.run_cycle().await.unwrap();

        assert_eq!(stats, CycleStats { listed: 2, downloaded: 2 });
        assert!(h.controller.cache().seen(1));
        assert!(h.controller.cache().seen(2));
        assert_eq!(h.controller.cache().last_uploaded(), Some(200));
    }

    #[tokio::test]
    async fn test_second_cycle_over_same_page_downloads_nothing() {
        let server = MockServer::start().await;
        mount_listing(&server, vec![movie_json(&server.uri(), 1, "One", "R", 100)]).await;

        let mut h = harness(&server.uri(), vec![], 0);
        let first = h.controller.run_cycle().await.unwrap();
        let second = h.controller.run_cycle().await.unwrap();

        assert_eq!(first.downloaded, 1);
        assert_eq!(second, CycleStats { listed: 1, downloaded: 0 });
    }

    #[tokio::test]
    async fn test_page_with_already_cached_item() {
        let server = MockServer::start().await;
        mount_listing(
            &server,
            vec![
                movie_json(&server.uri(), 10, "Old", "R", 50),
                movie_json(&server.uri(), 11, "A", "R", 110),
                movie_json(&server.uri(), 12, "B", "R", 120),
                movie_json(&server.uri(), 13, "C", "R", 130),
            ],
        )
        .await;

        let cache_dir = tempfile::tempdir().unwrap();
        let dest_dir = tempfile::tempdir().unwrap();
        // Item 10 was processed by some earlier run
        std::fs::write(
            cache_dir.path().join("yts-watcher.json"),
            r#"{ "10": true }"#,
        )
        .unwrap();

        let config = Config {
            baseurl: format!("{}/api/v2", server.uri()),
            ..Default::default()
        };
        let http_client = reqwest::Client::new();
        let catalog = CatalogClient::new(http_client.clone(), &config);
        let fetcher = TorrentFetcher::new(http_client, dest_dir.path().to_path_buf());
        let cache = Cache::load(cache_dir.path(), "yts-watcher").unwrap();
        let mut controller = PollController::new(catalog, fetcher, cache, &config);

        let stats = controller.run_cycle().await.unwrap();
        assert_eq!(stats, CycleStats { listed: 4, downloaded: 3 });

        // 4 seen flags plus the watermark entry
        assert_eq!(controller.cache().len(), 5);
        assert_eq!(controller.cache().last_uploaded(), Some(130));
    }

    #[tokio::test]
    async fn test_rating_filter_rejects_without_caching() {
        let server = MockServer::start().await;
        mount_listing(
            &server,
            vec![
                movie_json(&server.uri(), 1, "Family", "G", 300),
                movie_json(&server.uri(), 2, "Gritty", "R", 250),
            ],
        )
        .await;

        let mut h = harness(
            &server.uri(),
            vec!["R".to_string(), "PG-13".to_string()],
            0,
        );
        let stats = h.controller.run_cycle().await.unwrap();

        assert_eq!(stats.downloaded, 1);
        assert!(!h.controller.cache().seen(1), "rejected item must not be cached");
        assert!(h.controller.cache().seen(2));
        // Watermark advances past the rejected item's timestamp regardless
        assert_eq!(h.controller.cache().last_uploaded(), Some(300));

        // The rejected item is re-evaluated (and re-rejected) next cycle
        let again = h.controller.run_cycle().await.unwrap();
        assert_eq!(again.downloaded, 0);
        assert!(!h.controller.cache().seen(1));
    }

    #[tokio::test]
    async fn test_empty_rating_set_accepts_any_label() {
        let server = MockServer::start().await;
        mount_listing(
            &server,
            vec![
                movie_json(&server.uri(), 1, "Family", "G", 1),
                movie_json(&server.uri(), 2, "Unrated", "", 2),
            ],
        )
        .await;

        let mut h = harness(&server.uri(), vec![], 0);
        let stats = h.controller.run_cycle().await.unwrap();
        assert_eq!(stats.downloaded, 2);
    }

    #[tokio::test]
    async fn test_watermark_is_monotonic() {
        let server = MockServer::start().await;
        mount_listing(&server, vec![movie_json(&server.uri(), 1, "Old", "R", 100)]).await;

        // Seed the watermark above anything on the page
        let mut h = harness(&server.uri(), vec![], 5000);
        h.controller.run_cycle().await.unwrap();

        assert_eq!(h.controller.cache().last_uploaded(), Some(5000));
        // The old item was still downloaded; dedup is cache-driven
        assert!(h.controller.cache().seen(1));
    }

    #[tokio::test]
    async fn test_fetch_failure_skips_cycle_without_saving() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/list_movies.json"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let mut h = harness(&server.uri(), vec![], 0);
        let cache_file = h._cache_dir.path().join("yts-watcher.json");

        let err = h.controller.run_cycle().await.unwrap_err();
        assert!(matches!(err, Error::Upstream { status: 500, .. }));
        assert!(!cache_file.exists(), "failed cycle must not flush the cache");
    }

    #[tokio::test]
    async fn test_malformed_body_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/list_movies.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let mut h = harness(&server.uri(), vec![], 0);
        assert!(matches!(
            h.controller.run_cycle().await.unwrap_err(),
            Error::Parse(_)
        ));
    }

    #[tokio::test]
    async fn test_empty_page_still_saves_cache() {
        let server = MockServer::start().await;
        mount_listing(&server, vec![]).await;

        let mut h = harness(&server.uri(), vec![], 42);
        let stats = h.controller.run_cycle().await.unwrap();

        assert_eq!(stats, CycleStats { listed: 0, downloaded: 0 });
        // The watermark (seeded from config) is persisted even for a no-op cycle
        let cache_file = h._cache_dir.path().join("yts-watcher.json");
        assert!(cache_file.exists());
        assert_eq!(h.controller.cache().last_uploaded(), Some(42));
    }
}
