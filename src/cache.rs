//! Durable cache of processed catalog items
//!
//! The cache is the sole idempotency guard for downloads: once an item id is
//! marked seen, the entry is never cleared or overwritten, and the item is
//! never downloaded again regardless of its timestamp. Alongside the per-item
//! flags the store holds one reserved watermark key, `last_uploaded`, tracking
//! the highest upload timestamp processed so far.
//!
//! On disk the store is a single flat JSON object per namespace,
//! `{cache_dir}/{namespace}.json`, loaded once at startup and rewritten in
//! full by [`Cache::save`] at the end of every cycle. Saves go through a
//! temporary file plus rename so a crash mid-write leaves the previous state
//! intact.

use crate::error::{CacheError, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Reserved key holding the watermark timestamp
const LAST_UPLOADED_KEY: &str = "last_uploaded";

/// Durable key-value store of seen item ids plus the watermark
#[derive(Debug)]
pub struct Cache {
    /// Namespace, used for the file name and error context
    namespace: String,

    /// Path of the backing file
    path: PathBuf,

    /// In-memory entries, flushed wholesale by `save()`
    entries: HashMap<String, Value>,
}

impl Cache {
    /// Load the cache for `namespace` from `dir`, or start empty if the
    /// backing file does not exist yet
    ///
    /// # Errors
    /// Returns [`CacheError::LoadFailed`] if the file exists but cannot be
    /// read or decoded. A corrupt cache means the idempotency record is gone,
    /// so this is surfaced to the operator rather than silently reset.
    pub fn load(dir: impl AsRef<Path>, namespace: &str) -> Result<Self> {
        let path = dir.as_ref().join(format!("{}.json", namespace));

        let entries = match std::fs::read_to_string(&path) {
            Ok(contents) => {
                serde_json::from_str(&contents).map_err(|e| CacheError::LoadFailed {
                    namespace: namespace.to_string(),
                    reason: e.to_string(),
                })?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No cache file found, starting empty");
                HashMap::new()
            }
            Err(e) => {
                return Err(CacheError::LoadFailed {
                    namespace: namespace.to_string(),
                    reason: e.to_string(),
                }
                .into());
            }
        };

        debug!(
            namespace,
            entries = entries.len(),
            "Loaded cache from {}",
            path.display()
        );

        Ok(Self {
            namespace: namespace.to_string(),
            path,
            entries,
        })
    }

    /// Whether an item id has already been processed
    pub fn seen(&self, id: u64) -> bool {
        self.entries.contains_key(&id.to_string())
    }

    /// Mark an item id as processed
    ///
    /// Entries are write-once: marking an already-seen id is a no-op rather
    /// than an overwrite.
    pub fn mark_seen(&mut self, id: u64) {
        self.entries.entry(id.to_string()).or_insert(Value::Bool(true));
    }

    /// Current watermark timestamp, if one has ever been persisted
    pub fn last_uploaded(&self) -> Option<i64> {
        self.entries.get(LAST_UPLOADED_KEY).and_then(Value::as_i64)
    }

    /// Persist the watermark timestamp
    pub fn set_last_uploaded(&mut self, timestamp: i64) {
        self.entries
            .insert(LAST_UPLOADED_KEY.to_string(), Value::from(timestamp));
    }

    /// Number of entries currently held (seen flags plus the watermark)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries at all
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Durably persist all entries, overwriting prior state
    ///
    /// # Errors
    /// Returns [`CacheError::SaveFailed`] if the directory cannot be created
    /// or the file cannot be written. Callers treat this as fatal to the
    /// cycle: in-memory decisions that never reach disk would silently
    /// diverge from reality.
    pub async fn save(&self) -> Result<()> {
        let fail = |reason: String| CacheError::SaveFailed {
            namespace: self.namespace.clone(),
            reason,
        };

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| fail(e.to_string()))?;
        }

        let contents = serde_json::to_vec_pretty(&self.entries).map_err(|e| fail(e.to_string()))?;

        // Write to a sibling temp file first, then rename over the target, so
        // an interrupted save never truncates the previous durable state.
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &contents)
            .await
            .map_err(|e| fail(e.to_string()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| fail(e.to_string()))?;

        debug!(
            namespace = %self.namespace,
            entries = self.entries.len(),
            "Saved cache"
        );
        Ok(())
    }
}
