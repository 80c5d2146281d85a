//! WolfShare Node
//!
//! A peer in the file-sharing cluster. Every node can serve files, vote
//! in elections and, after winning one, act as the tracker that indexes
//! who owns which file.

mod election;
mod files;
mod heartbeat;
mod service;
mod tracker;

pub use election::{ElectionOutcome, Tally};
pub use service::NodeService;

use std::sync::Arc;
use std::time::Duration;
use chrono::{DateTime, Utc};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use crate::config::{ElectionConfig, HeartbeatConfig, WolfShareConfig};
use crate::directory::{self, Directory, TrackerAd};
use crate::error::{Error, Result};
use crate::network::{PeerProxy, TrackerProxy, Transport};
use crate::state::{FileRegistry, NodeRole, RoleState, VoteLedger};
use crate::storage::SharedDir;

/// Everything a node is built from
pub struct NodeParts {
    pub id: String,
    /// Address other nodes reach us at
    pub address: String,
    pub election: ElectionConfig,
    pub heartbeat: HeartbeatConfig,
    /// Timeout for registrations, lookups and file transfers
    pub request_timeout: Duration,
    pub directory: Arc<dyn Directory>,
    pub transport: Arc<dyn Transport>,
    pub storage: SharedDir,
}

impl NodeParts {
    /// Assemble parts from a loaded configuration
    pub fn from_config(
        config: &WolfShareConfig,
        directory: Arc<dyn Directory>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            id: config.node.id.clone(),
            address: config.advertise_address().to_string(),
            election: config.election.clone(),
            heartbeat: config.heartbeat.clone(),
            request_timeout: config.request_timeout(),
            directory,
            transport,
            storage: SharedDir::new(config.shared_dir()),
        }
    }
}

/// Snapshot of a node's role and epoch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeStatus {
    pub id: String,
    pub address: String,
    pub epoch: u64,
    pub role: NodeRole,
    pub election_in_progress: bool,
    pub tracker_address: Option<String>,
    pub joined_at: DateTime<Utc>,
}

/// A cluster node
pub struct Node {
    id: String,
    address: String,
    election_config: ElectionConfig,
    heartbeat_config: HeartbeatConfig,
    request_timeout: Duration,
    /// Role, epoch and election flag
    state: Mutex<RoleState>,
    /// Votes this node has cast, one per epoch
    ledger: VoteLedger,
    directory: Arc<dyn Directory>,
    transport: Arc<dyn Transport>,
    storage: SharedDir,
    joined_at: DateTime<Utc>,
    shutdown: watch::Sender<bool>,
}

impl Node {
    /// Create a node in the Follower role at epoch 0
    pub fn new(parts: NodeParts) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            id: parts.id,
            address: parts.address,
            election_config: parts.election,
            heartbeat_config: parts.heartbeat,
            request_timeout: parts.request_timeout,
            state: Mutex::new(RoleState::new()),
            ledger: VoteLedger::new(),
            directory: parts.directory,
            transport: parts.transport,
            storage: parts.storage,
            joined_at: Utc::now(),
            shutdown,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn storage(&self) -> &SharedDir {
        &self.storage
    }

    pub fn ledger(&self) -> &VoteLedger {
        &self.ledger
    }

    pub async fn epoch(&self) -> u64 {
        self.state.lock().await.epoch()
    }

    pub async fn role(&self) -> NodeRole {
        self.state.lock().await.role()
    }

    pub async fn status(&self) -> NodeStatus {
        let state = self.state.lock().await;
        NodeStatus {
            id: self.id.clone(),
            address: self.address.clone(),
            epoch: state.epoch(),
            role: state.role(),
            election_in_progress: state.election_in_progress(),
            tracker_address: state.tracker_address().map(str::to_string),
            joined_at: self.joined_at,
        }
    }

    /// Announce ourselves and make sure there is something to share
    ///
    /// Registers `peer.<id>` in the directory, creates the default file
    /// and registers the local file list with the tracker if one is up.
    pub async fn join(&self) -> Result<()> {
        let default_file = self.storage.ensure_default_file(&self.id).await?;
        self.directory
            .register(&directory::peer_name(&self.id), &self.address)
            .await?;

        tracing::info!(
            "Node {} joined at {} sharing {:?}",
            self.id,
            self.address,
            self.storage.root()
        );
        tracing::debug!("Default file {} ready", default_file);

        match self.refresh_registration().await {
            Ok(()) => {}
            Err(Error::NoTracker) => {
                tracing::info!("No tracker advertised yet, registration deferred");
            }
            Err(e) => tracing::warn!("Initial registration failed: {}", e),
        }
        Ok(())
    }

    /// Stop background tasks and withdraw from the directory
    pub async fn shutdown(&self) {
        self.shutdown.send_replace(true);

        if let Err(e) = self.directory.remove(&directory::peer_name(&self.id)).await {
            tracing::warn!("Failed to remove directory entry for {}: {}", self.id, e);
        }

        let held_epoch = {
            let state = self.state.lock().await;
            state.is_tracker().then(|| state.epoch())
        };
        if let Some(epoch) = held_epoch {
            if let Err(e) = self.directory.remove(&directory::tracker_name(epoch)).await {
                tracing::warn!("Failed to withdraw tracker advertisement: {}", e);
            }
        }

        tracing::info!("Node {} shut down", self.id);
    }

    /// Receiver that flips to `true` on shutdown
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    fn peer_proxy(&self, address: String, timeout: Duration) -> PeerProxy {
        PeerProxy::new(Arc::clone(&self.transport), address, timeout)
    }

    fn tracker_proxy(&self, address: &str, timeout: Duration) -> TrackerProxy {
        TrackerProxy::new(Arc::clone(&self.transport), address, timeout)
    }

    /// Look up the current tracker and remember its address
    ///
    /// A newer epoch seen this way is adopted.
    pub async fn resolve_tracker(&self) -> Result<Option<TrackerAd>> {
        let ad = directory::resolve_tracker(self.directory.as_ref()).await?;

        let mut state = self.state.lock().await;
        if let Some(ad) = &ad {
            if state.observe_epoch(ad.epoch) {
                tracing::warn!(
                    "Tracker at {} holds newer epoch {}, stepping down",
                    ad.address,
                    ad.epoch
                );
            }
        }
        state.set_tracker_address(ad.as_ref().map(|ad| ad.address.clone()));
        Ok(ad)
    }

    /// Registry of the tracker instance this node holds
    pub async fn registry(&self) -> Result<Arc<FileRegistry>> {
        self.state
            .lock()
            .await
            .registry()
            .ok_or_else(|| Error::NotTracker(self.address.clone()))
    }

    /// Vote request from a candidate
    pub async fn on_vote_request(&self, epoch: u64, candidate_id: &str) -> bool {
        let granted = self.ledger.grant_vote(epoch, candidate_id).await;
        if granted {
            tracing::info!("Granting vote to {} for epoch {}", candidate_id, epoch);
        } else {
            tracing::debug!(
                "Refusing vote to {} for epoch {}, already voted",
                candidate_id,
                epoch
            );
        }
        granted
    }

    /// A peer announced it started an election
    pub async fn on_election_started(&self, candidate_id: &str) {
        tracing::debug!("{} started an election", candidate_id);
        self.state.lock().await.observe_election(candidate_id);
    }

    /// Update role and epoch from an election-result notice
    pub async fn apply_election_result(&self, tracker_id: &str, epoch: u64) {
        let applied = self.state.lock().await.apply_result(&self.id, tracker_id, epoch);

        if applied.regressed {
            tracing::warn!(
                "Election result for epoch {} is older than our epoch {}, accepting it",
                epoch,
                applied.previous_epoch
            );
        }
        if applied.previous_role == NodeRole::Tracker && applied.role != NodeRole::Tracker {
            tracing::info!("{} is the new tracker, stepping down", tracker_id);
        }
        tracing::info!("Tracker is {} (epoch {})", tracker_id, epoch);
    }

    /// Election-result notice: update state, then re-register our files
    ///
    /// Registration runs in its own task since it may call back into the
    /// node that sent the notice, which is still waiting for our answer.
    pub async fn on_election_result(
        self: &Arc<Self>,
        tracker_id: &str,
        epoch: u64,
    ) -> JoinHandle<()> {
        self.apply_election_result(tracker_id, epoch).await;

        let node = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = node.refresh_registration().await {
                tracing::warn!("Re-registration after election failed: {}", e);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::InMemoryDirectory;
    use crate::network::Message;
    use async_trait::async_trait;
    use tempfile::tempdir;

    /// Transport where every peer is unreachable
    struct Unreachable;

    #[async_trait]
    impl Transport for Unreachable {
        async fn call(&self, address: &str, _message: Message, _timeout: Duration) -> Result<Message> {
            Err(Error::ConnectionFailed {
                address: address.to_string(),
                reason: "unreachable".into(),
            })
        }
    }

    fn node(dir: &std::path::Path, directory: Arc<InMemoryDirectory>) -> Node {
        Node::new(NodeParts {
            id: "alice".into(),
            address: "10.0.0.1:7700".into(),
            election: ElectionConfig::default(),
            heartbeat: HeartbeatConfig::default(),
            request_timeout: Duration::from_millis(200),
            directory,
            transport: Arc::new(Unreachable),
            storage: SharedDir::new(dir.join("alice")),
        })
    }

    #[tokio::test]
    async fn test_join_registers_peer_and_default_file() {
        let dir = tempdir().unwrap();
        let directory = Arc::new(InMemoryDirectory::new());
        let node = node(dir.path(), Arc::clone(&directory));

        node.join().await.unwrap();

        let peers = directory.list("peer.").await.unwrap();
        assert_eq!(peers["peer.alice"], "10.0.0.1:7700");
        assert_eq!(node.storage().list().await.unwrap(), vec!["file_alice.txt"]);

        node.shutdown().await;
        assert!(directory.is_empty().await);
    }

    #[tokio::test]
    async fn test_fresh_node_status() {
        let dir = tempdir().unwrap();
        let node = node(dir.path(), Arc::new(InMemoryDirectory::new()));

        let status = node.status().await;
        assert_eq!(status.epoch, 0);
        assert_eq!(status.role, NodeRole::Follower);
        assert!(!status.election_in_progress);
        assert!(status.tracker_address.is_none());
        assert!(matches!(node.registry().await, Err(Error::NotTracker(_))));
    }

    #[tokio::test]
    async fn test_vote_once_per_epoch() {
        let dir = tempdir().unwrap();
        let node = node(dir.path(), Arc::new(InMemoryDirectory::new()));

        assert!(node.on_vote_request(1, "bob").await);
        assert!(!node.on_vote_request(1, "carol").await);
        assert!(node.on_vote_request(2, "carol").await);
    }

    #[tokio::test]
    async fn test_resolve_tracker_adopts_newer_epoch() {
        let dir = tempdir().unwrap();
        let directory = Arc::new(InMemoryDirectory::new());
        directory.register("tracker.7", "10.0.0.9:7700").await.unwrap();
        let node = node(dir.path(), Arc::clone(&directory));

        let ad = node.resolve_tracker().await.unwrap().unwrap();
        assert_eq!(ad.epoch, 7);

        let status = node.status().await;
        assert_eq!(status.epoch, 7);
        assert_eq!(status.tracker_address.as_deref(), Some("10.0.0.9:7700"));
    }
}
