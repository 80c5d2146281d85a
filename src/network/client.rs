//! Network Client
//!
//! TCP client for calling other nodes and the directory service.

use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;

use super::{read_message, write_message, Message, Transport};
use crate::error::{Error, Result};

/// Network client for connecting to peer nodes
///
/// Every call opens a fresh connection, so a dead peer never poisons
/// later calls to the same address.
#[derive(Debug, Clone)]
pub struct NetworkClient {
    /// Connection timeout
    connect_timeout: Duration,
}

impl NetworkClient {
    /// Create a new network client
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    /// Connect to an address
    async fn connect(&self, address: &str) -> Result<TcpStream> {
        let result = timeout(self.connect_timeout, TcpStream::connect(address)).await;

        match result {
            Ok(Ok(stream)) => {
                stream.set_nodelay(true)?;
                Ok(stream)
            }
            Ok(Err(e)) => Err(Error::ConnectionFailed {
                address: address.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(Error::ConnectionTimeout(address.to_string())),
        }
    }

    /// Send without timeout wrapper
    async fn send_inner(&self, address: &str, message: Message) -> Result<Message> {
        let mut stream = self.connect(address).await?;
        let (mut reader, mut writer) = stream.split();

        write_message(&mut writer, &message).await?;
        read_message(&mut reader).await
    }
}

impl Default for NetworkClient {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}

#[async_trait::async_trait]
impl Transport for NetworkClient {
    async fn call(&self, address: &str, message: Message, request_timeout: Duration) -> Result<Message> {
        tracing::trace!("Calling {} with {}", address, message.type_name());

        match timeout(request_timeout, self.send_inner(address, message)).await {
            Ok(inner_result) => inner_result,
            Err(_) => Err(Error::ConnectionTimeout(address.to_string())),
        }
    }
}
