//! Fire-and-forget torrent file transfers
//!
//! A transfer is initiated and immediately detached: the poll cycle counts
//! the item as downloaded at initiation and never waits for delivery. This is
//! at-least-once-intent with best-effort delivery, not exactly-once delivery:
//! a failed transfer is logged and the item stays marked as processed, since
//! the cache guards against re-querying the catalog, not against verifying
//! that a file landed. There is no retry and no existing-file check; two
//! items mapping to the same title silently overwrite each other.

use std::path::PathBuf;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Fetches torrent files into the destination directory
#[derive(Clone, Debug)]
pub struct TorrentFetcher {
    http_client: reqwest::Client,
    destination: PathBuf,
}

impl TorrentFetcher {
    /// Create a fetcher writing into `destination`
    pub fn new(http_client: reqwest::Client, destination: PathBuf) -> Self {
        Self {
            http_client,
            destination,
        }
    }

    /// Initiate a transfer of `url` to `{destination}/{title}.torrent`
    ///
    /// Returns the handle of the detached task. Callers are free to drop it;
    /// tests await it to observe completion.
    pub fn spawn(&self, url: &str, title: &str) -> JoinHandle<()> {
        let local_file = self.destination.join(format!("{}.torrent", title));
        debug!(title, url, file = %local_file.display(), "Downloading torrent");

        let client = self.http_client.clone();
        let url = url.to_string();
        let title = title.to_string();

        tokio::spawn(async move {
            if let Err(e) = transfer(&client, &url, &local_file).await {
                warn!(title, url, error = %e, "Torrent transfer failed");
            }
        })
    }
}

async fn transfer(
    client: &reqwest::Client,
    url: &str,
    local_file: &std::path::Path,
) -> crate::error::Result<()> {
    let response = client.get(url).send().await?.error_for_status()?;
    let bytes = response.bytes().await?;

    if let Some(parent) = local_file.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(local_file, &bytes).await?;

    debug!(file = %local_file.display(), bytes = bytes.len(), "Torrent saved");
    Ok(())
}
