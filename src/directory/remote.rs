//! Directory client speaking to a `DirectoryServer`

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use super::Directory;
use crate::error::{Error, Result};
use crate::network::{Message, Transport};

/// Directory reached over the network
pub struct RemoteDirectory {
    transport: Arc<dyn Transport>,
    address: String,
    timeout: Duration,
}

impl RemoteDirectory {
    pub fn new(transport: Arc<dyn Transport>, address: String, timeout: Duration) -> Self {
        Self {
            transport,
            address,
            timeout,
        }
    }

    async fn call(&self, message: Message) -> Result<Message> {
        match self.transport.call(&self.address, message, self.timeout).await? {
            Message::Error { code, message } => Err(Error::Remote { code, message }),
            other => Ok(other),
        }
    }
}

#[async_trait::async_trait]
impl Directory for RemoteDirectory {
    async fn register(&self, name: &str, address: &str) -> Result<()> {
        let reply = self
            .call(Message::DirectoryRegister {
                name: name.to_string(),
                address: address.to_string(),
            })
            .await?;
        match reply {
            Message::Ack => Ok(()),
            other => Err(Error::UnexpectedResponse {
                expected: "Ack",
                got: other.type_name(),
            }),
        }
    }

    async fn remove(&self, name: &str) -> Result<()> {
        let reply = self
            .call(Message::DirectoryRemove {
                name: name.to_string(),
            })
            .await?;
        match reply {
            Message::Ack => Ok(()),
            other => Err(Error::UnexpectedResponse {
                expected: "Ack",
                got: other.type_name(),
            }),
        }
    }

    async fn list(&self, prefix: &str) -> Result<BTreeMap<String, String>> {
        let reply = self
            .call(Message::DirectoryList {
                prefix: prefix.to_string(),
            })
            .await?;
        match reply {
            Message::DirectoryEntries { entries } => Ok(entries),
            other => Err(Error::UnexpectedResponse {
                expected: "DirectoryEntries",
                got: other.type_name(),
            }),
        }
    }
}
