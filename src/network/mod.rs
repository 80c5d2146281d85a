//! Network Module
//!
//! Handles TCP communication between nodes, the tracker and the
//! directory service. Every exchange is one framed request followed by
//! one framed response.

pub mod protocol;
pub mod broadcast;
mod server;
mod client;
mod proxy;

pub use protocol::{Message, ErrorCode, FrameHeader};
pub use server::NetworkServer;
pub use client::NetworkClient;
pub use proxy::{PeerProxy, TrackerProxy};

use std::time::Duration;

use crate::error::{Error, Result};

/// Request/response transport between nodes
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Send `message` to `address` and wait at most `timeout` for the reply
    async fn call(&self, address: &str, message: Message, timeout: Duration) -> Result<Message>;
}

/// Server-side handler producing exactly one response per request
#[async_trait::async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, peer_addr: &str, message: Message) -> Message;
}

/// Read a framed message from a reader
pub async fn read_message<R: tokio::io::AsyncRead + Unpin>(reader: &mut R) -> Result<Message> {
    use tokio::io::AsyncReadExt;

    // Read header
    let mut header_bytes = [0u8; FrameHeader::SIZE];
    reader.read_exact(&mut header_bytes).await?;
    let header = FrameHeader::from_bytes(&header_bytes);

    if header.length > FrameHeader::MAX_LENGTH {
        return Err(Error::Network(format!("Frame of {} bytes exceeds limit", header.length)));
    }

    // Read body
    let mut body = vec![0u8; header.length as usize];
    reader.read_exact(&mut body).await?;

    // Verify checksum
    let computed_checksum = crc32fast::hash(&body);
    if computed_checksum != header.checksum {
        return Err(Error::Network("Message checksum mismatch".into()));
    }

    // Deserialize
    let message = Message::deserialize(&body)?;
    Ok(message)
}

/// Write a framed message to a writer
pub async fn write_message<W: tokio::io::AsyncWrite + Unpin>(
    writer: &mut W,
    message: &Message,
) -> Result<()> {
    use tokio::io::AsyncWriteExt;

    let body = message.serialize()?;
    if body.len() > FrameHeader::MAX_LENGTH as usize {
        return Err(Error::Network(format!(
            "{} of {} bytes exceeds frame limit",
            message.type_name(),
            body.len()
        )));
    }
    let header = FrameHeader::new(&body);

    writer.write_all(&header.to_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;

    Ok(())
}
