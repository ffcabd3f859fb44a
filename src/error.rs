//! Error types for yts-watcher
//!
//! The taxonomy mirrors how failures are handled by the poll loop:
//! - Upstream/network and parse errors are recoverable: the cycle is skipped
//!   and the next scheduled trigger retries naturally.
//! - Cache errors are fatal to the cycle and must be surfaced loudly, because
//!   a silently diverged cache breaks the exactly-once download guarantee for
//!   every future cycle.

use thiserror::Error;

/// Result type alias for yts-watcher operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for yts-watcher
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "frequency.value")
        key: Option<String>,
    },

    /// Durable cache operation failed
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    /// Catalog returned a non-success HTTP status
    #[error("catalog returned HTTP {status}: {detail}")]
    Upstream {
        /// HTTP status code returned by the catalog
        status: u16,
        /// Response body or status text, for the log line
        detail: String,
    },

    /// Malformed catalog response body
    #[error("parse error: {0}")]
    Parse(String),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Durable cache errors
///
/// Split out from [`Error`] so callers can distinguish "idempotency invariant
/// at risk" from recoverable per-cycle failures.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Cache file exists but could not be read or decoded
    #[error("failed to load cache {namespace}: {reason}")]
    LoadFailed {
        /// Namespace of the cache store
        namespace: String,
        /// Underlying failure
        reason: String,
    },

    /// Cache contents could not be written durably
    #[error("failed to save cache {namespace}: {reason}")]
    SaveFailed {
        /// Namespace of the cache store
        namespace: String,
        /// Underlying failure
        reason: String,
    },
}

impl Error {
    /// Convenience constructor for configuration errors
    pub fn config(message: impl Into<String>, key: Option<&str>) -> Self {
        Error::Config {
            message: message.into(),
            key: key.map(String::from),
        }
    }
}
