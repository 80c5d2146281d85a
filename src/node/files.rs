//! File sharing flows
//!
//! Local storage changes are pushed to the tracker. Downloads ask the
//! tracker who owns a file and try those owners one by one.

use std::collections::BTreeMap;

use super::Node;
use crate::error::{Error, Result};

impl Node {
    /// Replace our file list on the tracker with the local directory
    pub async fn refresh_registration(&self) -> Result<()> {
        let filenames = self.storage.list().await?;
        let tracker = self.current_tracker().await?;
        let count = filenames.len();
        tracker.register_files(&self.address, filenames).await?;

        tracing::debug!("Registered {} local files with the tracker", count);
        Ok(())
    }

    /// Names of the files we share
    pub async fn local_files(&self) -> Result<Vec<String>> {
        self.storage.list().await
    }

    /// Serve a file to a peer, `None` when we do not have it
    pub async fn get_file(&self, filename: &str) -> Result<Option<Vec<u8>>> {
        match self.storage.read(filename).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Add a file to the shared directory and announce it
    pub async fn share_file(&self, filename: &str, data: &[u8]) -> Result<()> {
        self.storage.write(filename, data).await?;
        tracing::info!("Sharing {} ({} bytes)", filename, data.len());
        self.announce_added(filename).await;
        Ok(())
    }

    /// Delete a shared file and withdraw it from the tracker
    pub async fn unshare_file(&self, filename: &str) -> Result<()> {
        self.storage.remove(filename).await?;
        tracing::info!("Stopped sharing {}", filename);

        let withdrawn = match self.current_tracker().await {
            Ok(tracker) => tracker.update_file_remove(&self.address, filename).await,
            Err(e) => Err(e),
        };
        if let Err(e) = withdrawn {
            tracing::warn!("Failed to withdraw {} from the tracker: {}", filename, e);
        }
        Ok(())
    }

    /// Fetch a file from another owner and share it ourselves
    ///
    /// Returns the address it was downloaded from and its size.
    pub async fn download(&self, filename: &str) -> Result<(String, u64)> {
        let owners = self.current_tracker().await?.who_has(filename).await?;

        for owner in owners.into_iter().filter(|owner| *owner != self.address) {
            let proxy = self.peer_proxy(owner.clone(), self.request_timeout);
            match proxy.get_file(filename).await {
                Ok(Some(data)) => {
                    self.storage.write(filename, &data).await?;
                    tracing::info!(
                        "Downloaded {} ({} bytes) from {}",
                        filename,
                        data.len(),
                        owner
                    );
                    self.announce_added(filename).await;
                    return Ok((owner, data.len() as u64));
                }
                Ok(None) => {
                    tracing::debug!("{} no longer has {}", owner, filename);
                }
                Err(e) => {
                    tracing::debug!("Fetching {} from {} failed: {}", filename, owner, e);
                }
            }
        }

        Err(Error::FileNotFound(filename.to_string()))
    }

    /// Snapshot of the tracker's whole index
    pub async fn list_network_files(&self) -> Result<BTreeMap<String, Vec<String>>> {
        self.current_tracker().await?.list_all_files().await
    }

    /// Owners of a file according to the tracker
    pub async fn who_has(&self, filename: &str) -> Result<Vec<String>> {
        self.current_tracker().await?.who_has(filename).await
    }

    async fn announce_added(&self, filename: &str) {
        let added = match self.current_tracker().await {
            Ok(tracker) => tracker.update_file_add(&self.address, filename).await,
            Err(e) => Err(e),
        };
        match added {
            Ok(()) => {}
            Err(Error::NoTracker) => {
                tracing::debug!("No tracker to announce {} to", filename);
            }
            Err(e) => tracing::warn!("Failed to announce {} to the tracker: {}", filename, e),
        }
    }
}
