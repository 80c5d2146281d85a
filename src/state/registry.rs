//! File Registry
//!
//! The tracker's index of which nodes own which files. One registry
//! belongs to one tracker instance and is tagged with the epoch that
//! instance was elected in; nothing carries over between epochs.

use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::RwLock;

/// Filename -> owner addresses
#[derive(Debug)]
pub struct FileRegistry {
    /// Epoch of the tracker instance owning this registry
    epoch: u64,
    /// Index, owner sets never contain duplicates and are never empty
    index: RwLock<BTreeMap<String, BTreeSet<String>>>,
}

impl FileRegistry {
    /// Create an empty registry for `epoch`
    pub fn new(epoch: u64) -> Self {
        Self {
            epoch,
            index: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Replace the full file list of `owner`
    ///
    /// The owner is dropped from every entry and then added to each name
    /// in `filenames`. Entries left without owners disappear.
    pub async fn register_files(&self, owner: &str, filenames: &[String]) {
        let mut index = self.index.write().await;

        index.retain(|_, owners| {
            owners.remove(owner);
            !owners.is_empty()
        });

        for filename in filenames {
            index
                .entry(filename.clone())
                .or_default()
                .insert(owner.to_string());
        }

        tracing::debug!(
            "Registered {} files for {} (epoch {}, {} files indexed)",
            filenames.len(),
            owner,
            self.epoch,
            index.len()
        );
    }

    /// Record that `owner` now holds `filename`
    pub async fn update_file_add(&self, owner: &str, filename: &str) {
        let mut index = self.index.write().await;
        index
            .entry(filename.to_string())
            .or_default()
            .insert(owner.to_string());
    }

    /// Record that `owner` no longer holds `filename`
    pub async fn update_file_remove(&self, owner: &str, filename: &str) {
        let mut index = self.index.write().await;
        if let Some(owners) = index.get_mut(filename) {
            owners.remove(owner);
            if owners.is_empty() {
                index.remove(filename);
            }
        }
    }

    /// Owners of `filename`, possibly none
    pub async fn who_has(&self, filename: &str) -> Vec<String> {
        let index = self.index.read().await;
        index
            .get(filename)
            .map(|owners| owners.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Snapshot of the whole index
    pub async fn list_all_files(&self) -> BTreeMap<String, Vec<String>> {
        let index = self.index.read().await;
        index
            .iter()
            .map(|(name, owners)| (name.clone(), owners.iter().cloned().collect()))
            .collect()
    }

    /// Liveness acknowledgement
    pub fn heartbeat(&self) -> u64 {
        self.epoch
    }
}
