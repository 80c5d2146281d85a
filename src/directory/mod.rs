//! Directory Service
//!
//! Name to address registry used to discover peers and the current
//! tracker. Nodes register as `peer.<node_id>`; the tracker of an epoch
//! advertises itself as `tracker.<epoch>`.

mod memory;
mod remote;
mod server;

pub use memory::InMemoryDirectory;
pub use remote::RemoteDirectory;
pub use server::DirectoryServer;

use std::collections::BTreeMap;

use crate::error::Result;

/// Prefix of peer entries
pub const PEER_PREFIX: &str = "peer.";

/// Prefix of tracker advertisements
pub const TRACKER_PREFIX: &str = "tracker.";

/// Name to address registry
#[async_trait::async_trait]
pub trait Directory: Send + Sync {
    /// Register (or overwrite) `name`
    async fn register(&self, name: &str, address: &str) -> Result<()>;

    /// Remove `name`, a missing name is not an error
    async fn remove(&self, name: &str) -> Result<()>;

    /// All entries whose name starts with `prefix`
    async fn list(&self, prefix: &str) -> Result<BTreeMap<String, String>>;
}

/// A tracker advertisement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerAd {
    pub epoch: u64,
    pub address: String,
}

/// Directory name of a peer
pub fn peer_name(node_id: &str) -> String {
    format!("{}{}", PEER_PREFIX, node_id)
}

/// Directory name of the tracker advertisement for `epoch`
pub fn tracker_name(epoch: u64) -> String {
    format!("{}{}", TRACKER_PREFIX, epoch)
}

/// Parse the epoch out of a tracker advertisement name
pub fn parse_tracker_epoch(name: &str) -> Option<u64> {
    name.strip_prefix(TRACKER_PREFIX)?.parse().ok()
}

/// All parseable tracker advertisements, lowest epoch first
pub async fn tracker_ads(directory: &dyn Directory) -> Result<Vec<TrackerAd>> {
    let mut ads: Vec<TrackerAd> = directory
        .list(TRACKER_PREFIX)
        .await?
        .into_iter()
        .filter_map(|(name, address)| {
            parse_tracker_epoch(&name).map(|epoch| TrackerAd { epoch, address })
        })
        .collect();
    ads.sort_by_key(|ad| ad.epoch);
    Ok(ads)
}

/// Resolve the current tracker: the advertisement with the highest epoch
pub async fn resolve_tracker(directory: &dyn Directory) -> Result<Option<TrackerAd>> {
    Ok(tracker_ads(directory).await?.pop())
}

/// Addresses of every registered peer except `self_id`
pub async fn peer_addresses(directory: &dyn Directory, self_id: &str) -> Result<Vec<String>> {
    let own = peer_name(self_id);
    Ok(directory
        .list(PEER_PREFIX)
        .await?
        .into_iter()
        .filter(|(name, _)| *name != own)
        .map(|(_, address)| address)
        .collect())
}
