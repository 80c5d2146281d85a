//! Standalone directory server

use std::sync::Arc;

use super::{Directory, InMemoryDirectory};
use crate::error::Error;
use crate::network::{ErrorCode, Message, MessageHandler};

/// Serves an `InMemoryDirectory` over the network protocol
#[derive(Default)]
pub struct DirectoryServer {
    directory: Arc<InMemoryDirectory>,
}

impl DirectoryServer {
    pub fn new(directory: Arc<InMemoryDirectory>) -> Self {
        Self { directory }
    }

    pub fn directory(&self) -> &Arc<InMemoryDirectory> {
        &self.directory
    }
}

#[async_trait::async_trait]
impl MessageHandler for DirectoryServer {
    async fn handle(&self, peer_addr: &str, message: Message) -> Message {
        let result = match message {
            Message::DirectoryRegister { name, address } => {
                tracing::info!("Registered {} -> {} (from {})", name, address, peer_addr);
                self.directory.register(&name, &address).await.map(|_| Message::Ack)
            }
            Message::DirectoryRemove { name } => {
                tracing::info!("Removed {} (from {})", name, peer_addr);
                self.directory.remove(&name).await.map(|_| Message::Ack)
            }
            Message::DirectoryList { prefix } => self
                .directory
                .list(&prefix)
                .await
                .map(|entries| Message::DirectoryEntries { entries }),
            other => {
                return Message::Error {
                    code: ErrorCode::BadRequest,
                    message: format!("Directory cannot handle {}", other.type_name()),
                }
            }
        };

        result.unwrap_or_else(|e: Error| Message::from_error(&e))
    }
}
