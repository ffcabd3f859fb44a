//! Catalog client for the YTS listing API
//!
//! Builds the `list_movies.json` query from the configured filters, fetches a
//! single page of results, and parses the response into typed items. Query
//! parameters are appended from an explicit ordered list so the emitted URL
//! does not depend on map iteration order. A non-success response or a
//! malformed body is reported as an error for the controller to log and skip;
//! neither ever crashes the long-running process.

use crate::config::{Config, QueryConfig};
use crate::error::{Error, Result};
use serde::Deserialize;
use tracing::debug;
use url::Url;

/// One catalog entry with its first torrent reference extracted eagerly
///
/// The upstream lists one or more torrent files per movie; only the first is
/// ever downloaded, so the validating parse pulls it out up front instead of
/// letting an empty list surface later as a missing-value bug.
#[derive(Clone, Debug, PartialEq)]
pub struct CatalogItem {
    /// Unique upstream identifier
    pub id: u64,

    /// Short title, used to name the saved torrent file
    pub title: String,

    /// Long display title (title plus year), used in log lines
    pub title_long: String,

    /// MPA rating label, e.g. "R" or "PG-13" (may be empty upstream)
    pub mpa_rating: String,

    /// Upload timestamp, seconds since epoch
    pub date_uploaded_unix: i64,

    /// URL of the first listed torrent file
    pub torrent_url: String,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    data: ListData,
}

#[derive(Debug, Deserialize)]
struct ListData {
    /// Absent when the query matches nothing; treated as an empty page
    #[serde(default)]
    movies: Vec<RawMovie>,
}

#[derive(Debug, Deserialize)]
struct RawMovie {
    id: u64,
    title: String,
    title_long: String,
    mpa_rating: String,
    date_uploaded_unix: i64,
    torrents: Vec<RawTorrent>,
}

#[derive(Debug, Deserialize)]
struct RawTorrent {
    url: String,
}

/// Client for fetching one page of recently listed movies
#[derive(Clone, Debug)]
pub struct CatalogClient {
    http_client: reqwest::Client,
    baseurl: String,
    query: QueryConfig,
}

impl CatalogClient {
    /// Create a catalog client reusing an already-built HTTP client
    pub fn new(http_client: reqwest::Client, config: &Config) -> Self {
        Self {
            http_client,
            baseurl: config.baseurl.clone(),
            query: config.query.clone(),
        }
    }

    /// Build the listing URL with the configured filter parameters
    ///
    /// Parameters are appended in a fixed order and only when present.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the base URL cannot be parsed.
    pub fn listing_url(&self) -> Result<Url> {
        let mut url = Url::parse(&format!("{}/list_movies.json", self.baseurl))
            .map_err(|e| Error::config(format!("invalid baseurl: {}", e), Some("baseurl")))?;

        let params: [(&str, Option<String>); 3] = [
            ("minimum_rating", self.query.minimum_rating.map(|r| r.to_string())),
            ("quality", self.query.quality.clone()),
            ("genre", self.query.genre.clone()),
        ];

        {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in params {
                if let Some(value) = value {
                    pairs.append_pair(name, &value);
                }
            }
        }

        Ok(url)
    }

    /// Fetch the current page of recent movies, returning the raw body
    ///
    /// # Errors
    /// Returns [`Error::Network`] if the request fails outright and
    /// [`Error::Upstream`] with status and body detail on a non-success
    /// response. Both are recoverable: the caller skips the cycle and the
    /// next scheduled trigger retries.
    pub async fn fetch_recent(&self) -> Result<String> {
        let url = self.listing_url()?;
        debug!(url = %url, "Requesting catalog page");

        let response = self.http_client.get(url).send().await?;
        let status = response.status();
        debug!(status = status.as_u16(), "Catalog response");

        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::Upstream {
                status: status.as_u16(),
                detail,
            });
        }

        Ok(response.text().await?)
    }
}

/// Parse a catalog response body into items, in response order
///
/// # Errors
/// Returns [`Error::Parse`] if the body is not the expected JSON shape, a
/// movie is missing a required field, or a movie lists no torrents at all.
pub fn parse_listing(body: &str) -> Result<Vec<CatalogItem>> {
    let response: ListResponse = serde_json::from_str(body)
        .map_err(|e| Error::Parse(format!("malformed catalog response: {}", e)))?;

    response
        .data
        .movies
        .into_iter()
        .map(|movie| {
            let torrent_url = movie
                .torrents
                .into_iter()
                .next()
                .map(|t| t.url)
                .ok_or_else(|| {
                    Error::Parse(format!("movie {} ({}) has no torrents", movie.id, movie.title))
                })?;

            Ok(CatalogItem {
                id: movie.id,
                title: movie.title,
                title_long: movie.title_long,
                mpa_rating: movie.mpa_rating,
                date_uploaded_unix: movie.date_uploaded_unix,
                torrent_url,
            })
        })
        .collect()
}
