#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use wolfshare::config::{ElectionConfig, HeartbeatConfig};
use wolfshare::directory::{Directory, InMemoryDirectory};
use wolfshare::error::{Error, Result};
use wolfshare::network::{Message, MessageHandler, Transport};
use wolfshare::node::{Node, NodeParts, NodeService};
use wolfshare::storage::SharedDir;

/// In-process transport routing calls straight to registered handlers
#[derive(Default)]
pub struct LoopbackTransport {
    routes: RwLock<HashMap<String, Arc<dyn MessageHandler>>>,
    down: RwLock<HashSet<String>>,
    slow: RwLock<HashMap<String, Duration>>,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(&self, address: &str, handler: Arc<dyn MessageHandler>) {
        self.routes.write().unwrap().insert(address.to_string(), handler);
    }

    /// Calls to `address` fail as if the host were gone
    pub fn set_down(&self, address: &str, down: bool) {
        let mut set = self.down.write().unwrap();
        if down {
            set.insert(address.to_string());
        } else {
            set.remove(address);
        }
    }

    /// Calls to `address` are delayed before being handled
    pub fn set_slow(&self, address: &str, delay: Duration) {
        self.slow.write().unwrap().insert(address.to_string(), delay);
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn call(&self, address: &str, message: Message, timeout: Duration) -> Result<Message> {
        let handler = if self.down.read().unwrap().contains(address) {
            None
        } else {
            self.routes.read().unwrap().get(address).cloned()
        };
        let handler = handler.ok_or_else(|| Error::ConnectionFailed {
            address: address.to_string(),
            reason: "connection refused".into(),
        })?;
        let delay = self.slow.read().unwrap().get(address).copied();

        let call = async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            handler.handle("loopback", message).await
        };
        tokio::time::timeout(timeout, call)
            .await
            .map_err(|_| Error::ConnectionTimeout(address.to_string()))
    }
}

/// In-memory directory whose lookups can be made to fail
#[derive(Default)]
pub struct FlakyDirectory {
    inner: InMemoryDirectory,
    failures: AtomicUsize,
}

impl FlakyDirectory {
    /// The next `count` lookups fail
    pub fn fail_next(&self, count: usize) {
        self.failures.store(count, Ordering::SeqCst);
    }

    pub fn failures_left(&self) -> usize {
        self.failures.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Directory for FlakyDirectory {
    async fn register(&self, name: &str, address: &str) -> Result<()> {
        self.inner.register(name, address).await
    }

    async fn remove(&self, name: &str) -> Result<()> {
        self.inner.remove(name).await
    }

    async fn list(&self, prefix: &str) -> Result<BTreeMap<String, String>> {
        let failed = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failed {
            return Err(Error::ConnectionFailed {
                address: "directory".into(),
                reason: "connection reset".into(),
            });
        }
        self.inner.list(prefix).await
    }
}

pub fn fast_election() -> ElectionConfig {
    ElectionConfig {
        vote_timeout_ms: 200,
        max_parallel_requests: 8,
        notice_ttl_ms: 3000,
    }
}

pub fn fast_heartbeat() -> HeartbeatConfig {
    HeartbeatConfig {
        probe_timeout_ms: 100,
        interval_min_ms: 20,
        interval_max_ms: 40,
        startup_jitter_min_ms: 0,
        startup_jitter_max_ms: 10,
        absent_wait_ms: 50,
        error_backoff_ms: 50,
    }
}

pub fn address_of(id: &str) -> String {
    format!("{}:7700", id)
}

/// A set of nodes sharing one in-memory directory and one loopback transport
pub struct TestCluster {
    pub directory: Arc<InMemoryDirectory>,
    pub transport: Arc<LoopbackTransport>,
    nodes: Vec<Arc<Node>>,
    _dir: TempDir,
}

impl TestCluster {
    /// Build and join one node per id
    pub async fn new(ids: &[&str]) -> Self {
        Self::with_heartbeat(ids, fast_heartbeat()).await
    }

    /// Build and join nodes using `heartbeat` timings
    pub async fn with_heartbeat(ids: &[&str], heartbeat: HeartbeatConfig) -> Self {
        let cluster = Self::unjoined_with(ids, heartbeat);
        for node in &cluster.nodes {
            node.join().await.unwrap();
        }
        cluster
    }

    /// Build nodes without joining them
    pub fn unjoined(ids: &[&str]) -> Self {
        Self::unjoined_with(ids, fast_heartbeat())
    }

    fn unjoined_with(ids: &[&str], heartbeat: HeartbeatConfig) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let directory = Arc::new(InMemoryDirectory::new());
        let transport = Arc::new(LoopbackTransport::new());

        let nodes = ids
            .iter()
            .map(|id| {
                let address = address_of(id);
                let node = Arc::new(Node::new(NodeParts {
                    id: id.to_string(),
                    address: address.clone(),
                    election: fast_election(),
                    heartbeat: heartbeat.clone(),
                    request_timeout: Duration::from_millis(500),
                    directory: directory.clone(),
                    transport: transport.clone(),
                    storage: SharedDir::new(dir.path().join(id)),
                }));
                transport.route(&address, Arc::new(NodeService::new(Arc::clone(&node))));
                node
            })
            .collect();

        Self {
            directory,
            transport,
            nodes,
            _dir: dir,
        }
    }

    pub fn node(&self, id: &str) -> &Arc<Node> {
        self.nodes
            .iter()
            .find(|n| n.id() == id)
            .unwrap_or_else(|| panic!("no node {}", id))
    }

    pub fn nodes(&self) -> &[Arc<Node>] {
        &self.nodes
    }
}

/// Poll `check` until it holds or `within` elapses
pub async fn eventually<F, Fut>(within: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + within;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
