//! Configuration types for yts-watcher

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Catalog query filters
///
/// The first three fields narrow the query sent upstream and are emitted as
/// query parameters only when present. `mpa_ratings` cannot be expressed in
/// the upstream query and is applied client-side after retrieval; an empty
/// list accepts any rating.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Minimum IMDb-style rating, 0-9 (omitted from the query if None)
    #[serde(default)]
    pub minimum_rating: Option<f64>,

    /// Release quality, e.g. "720p", "1080p", "3D" (omitted if None)
    #[serde(default)]
    pub quality: Option<String>,

    /// Genre filter, e.g. "action" (omitted if None)
    #[serde(default)]
    pub genre: Option<String>,

    /// Acceptable MPA ratings, checked client-side (empty = accept any)
    #[serde(default)]
    pub mpa_ratings: Vec<String>,
}

/// Poll frequency configuration
///
/// Either an explicit 6-field cron pattern, used verbatim, or a
/// `(unit, value)` pair compiled into one by
/// [`compile_pattern`](crate::schedule::compile_pattern).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FrequencyConfig {
    /// Explicit cron pattern; takes precedence over unit/value when set
    #[serde(default)]
    pub cron_pattern: Option<String>,

    /// Schedule unit: one of "seconds", "minutes", "hours", "daymonth",
    /// "months", "dayweek"
    #[serde(default = "default_unit")]
    pub unit: String,

    /// Value for the schedule unit (e.g. unit="minutes", value=30 means
    /// "at minute 30 of every hour")
    #[serde(default = "default_frequency_value")]
    pub value: u32,
}

impl Default for FrequencyConfig {
    fn default() -> Self {
        Self {
            cron_pattern: None,
            unit: default_unit(),
            value: default_frequency_value(),
        }
    }
}

/// Main configuration for the watcher
///
/// Field names mirror the JSON config file surface. Every field has a
/// default so a minimal file (or an empty object) is a valid configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the catalog API (default: "https://yts.ag/api/v2")
    #[serde(default = "default_baseurl")]
    pub baseurl: String,

    /// Catalog query filters
    #[serde(default)]
    pub query: QueryConfig,

    /// Directory where downloaded torrent files are written (default: "./torrents")
    #[serde(default = "default_destination")]
    pub destination: PathBuf,

    /// Directory holding the durable cache file (default: "./.cache")
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Watermark seed: upload timestamp (seconds since epoch) to start from
    /// when the cache holds no watermark yet (default: 0)
    #[serde(default)]
    pub since: i64,

    /// Run one cycle immediately at startup in addition to the schedule
    #[serde(default = "default_true")]
    pub run_at_start: bool,

    /// Log verbosity passed to the subscriber when RUST_LOG is unset
    /// (default: "info")
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Poll frequency
    #[serde(default)]
    pub frequency: FrequencyConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            baseurl: default_baseurl(),
            query: QueryConfig::default(),
            destination: default_destination(),
            cache_dir: default_cache_dir(),
            since: 0,
            run_at_start: true,
            log_level: default_log_level(),
            frequency: FrequencyConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, is not valid JSON, or
    /// fails [`validate`](Config::validate).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::config(
                format!("cannot read config file {}: {}", path.display(), e),
                None,
            )
        })?;
        let config: Config = serde_json::from_str(&contents)
            .map_err(|e| Error::config(format!("invalid config file: {}", e), None))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field constraints
    ///
    /// # Errors
    /// Returns a [`Error::Config`] naming the offending key.
    pub fn validate(&self) -> Result<()> {
        if self.baseurl.is_empty() {
            return Err(Error::config("baseurl must not be empty", Some("baseurl")));
        }
        if url::Url::parse(&self.baseurl).is_err() {
            return Err(Error::config(
                format!("baseurl is not a valid URL: {}", self.baseurl),
                Some("baseurl"),
            ));
        }
        if let Some(rating) = self.query.minimum_rating
            && !(0.0..=9.0).contains(&rating)
        {
            return Err(Error::config(
                format!("minimum_rating must be between 0 and 9, got {}", rating),
                Some("query.minimum_rating"),
            ));
        }
        Ok(())
    }
}

fn default_baseurl() -> String {
    "https://yts.ag/api/v2".to_string()
}

fn default_destination() -> PathBuf {
    PathBuf::from("./torrents")
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("./.cache")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_unit() -> String {
    "minutes".to_string()
}

fn default_frequency_value() -> u32 {
    30
}

fn default_true() -> bool {
    true
}
