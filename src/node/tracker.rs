//! Tracker access
//!
//! The tracker is reached over the network, unless this node is the
//! tracker itself, in which case its registry is used in place.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::Node;
use crate::error::{Error, Result};
use crate::network::TrackerProxy;
use crate::state::FileRegistry;

/// Handle on the current tracker
pub(crate) enum TrackerHandle {
    Local(Arc<FileRegistry>),
    Remote(TrackerProxy),
}

impl TrackerHandle {
    pub async fn register_files(&self, owner: &str, filenames: Vec<String>) -> Result<()> {
        match self {
            TrackerHandle::Local(registry) => {
                registry.register_files(owner, &filenames).await;
                Ok(())
            }
            TrackerHandle::Remote(proxy) => proxy.register_files(owner, filenames).await,
        }
    }

    pub async fn update_file_add(&self, owner: &str, filename: &str) -> Result<()> {
        match self {
            TrackerHandle::Local(registry) => {
                registry.update_file_add(owner, filename).await;
                Ok(())
            }
            TrackerHandle::Remote(proxy) => proxy.update_file_add(owner, filename).await,
        }
    }

    pub async fn update_file_remove(&self, owner: &str, filename: &str) -> Result<()> {
        match self {
            TrackerHandle::Local(registry) => {
                registry.update_file_remove(owner, filename).await;
                Ok(())
            }
            TrackerHandle::Remote(proxy) => proxy.update_file_remove(owner, filename).await,
        }
    }

    pub async fn who_has(&self, filename: &str) -> Result<Vec<String>> {
        match self {
            TrackerHandle::Local(registry) => Ok(registry.who_has(filename).await),
            TrackerHandle::Remote(proxy) => proxy.who_has(filename).await,
        }
    }

    pub async fn list_all_files(&self) -> Result<BTreeMap<String, Vec<String>>> {
        match self {
            TrackerHandle::Local(registry) => Ok(registry.list_all_files().await),
            TrackerHandle::Remote(proxy) => proxy.list_all_files().await,
        }
    }
}

impl Node {
    /// Resolve the tracker into something we can call
    pub(crate) async fn current_tracker(&self) -> Result<TrackerHandle> {
        let ad = self.resolve_tracker().await?.ok_or(Error::NoTracker)?;

        if ad.address == self.address {
            let registry = self.state.lock().await.registry();
            if let Some(registry) = registry.filter(|r| r.epoch() == ad.epoch) {
                return Ok(TrackerHandle::Local(registry));
            }
        }

        Ok(TrackerHandle::Remote(
            self.tracker_proxy(&ad.address, self.request_timeout),
        ))
    }
}
