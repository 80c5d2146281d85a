//! In-memory directory

use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::Directory;
use crate::error::Result;

/// Directory kept in process memory
///
/// Backs the standalone directory server and in-process clusters.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    entries: RwLock<BTreeMap<String, String>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered names
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl Directory for InMemoryDirectory {
    async fn register(&self, name: &str, address: &str) -> Result<()> {
        let mut entries = self.entries.write().await;
        if let Some(previous) = entries.insert(name.to_string(), address.to_string()) {
            if previous != address {
                tracing::debug!("Directory entry {} moved {} -> {}", name, previous, address);
            }
        }
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<()> {
        self.entries.write().await.remove(name);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<BTreeMap<String, String>> {
        let entries = self.entries.read().await;
        Ok(entries
            .range(prefix.to_string()..)
            .take_while(|(name, _)| name.starts_with(prefix))
            .map(|(name, address)| (name.clone(), address.clone()))
            .collect())
    }
}
