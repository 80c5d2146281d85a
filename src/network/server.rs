//! Network Server
//!
//! TCP server for accepting connections from other nodes.

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;

use super::{read_message, write_message, ErrorCode, Message, MessageHandler};
use crate::error::{Error, Result};

/// Network server for cluster communication
pub struct NetworkServer {
    /// Bound listener
    listener: TcpListener,
    /// Actual bound address (resolves port 0)
    local_addr: SocketAddr,
}

impl NetworkServer {
    /// Bind a new network server
    pub async fn bind(bind_address: &str) -> Result<Self> {
        let listener = TcpListener::bind(bind_address).await?;
        let local_addr = listener.local_addr()?;

        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve requests until `shutdown` flips to true
    pub async fn serve(
        self,
        handler: Arc<dyn MessageHandler>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        tracing::info!("Network server listening on {}", self.local_addr);

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((socket, addr)) => {
                            let peer_addr = addr.to_string();
                            let handler = Arc::clone(&handler);

                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(socket, &peer_addr, handler).await {
                                    tracing::debug!("Connection error from {}: {}", peer_addr, e);
                                }
                            });
                        }
                        Err(e) => {
                            tracing::error!("Accept error: {}", e);
                        }
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Network server on {} stopped", self.local_addr);
        Ok(())
    }
}

/// Handle a single connection
async fn handle_connection(
    socket: TcpStream,
    peer_addr: &str,
    handler: Arc<dyn MessageHandler>,
) -> Result<()> {
    socket.set_nodelay(true)?;
    let (mut reader, mut writer) = socket.into_split();

    loop {
        match read_message(&mut reader).await {
            Ok(message) => {
                tracing::trace!("Received {} from {}", message.type_name(), peer_addr);
                let response = handler.handle(peer_addr, message).await;
                match write_message(&mut writer, &response).await {
                    Ok(()) => {}
                    // Rejected before any byte was sent, report it instead
                    Err(Error::Network(reason)) => {
                        tracing::warn!("Reply to {} not sent: {}", peer_addr, reason);
                        let refusal = Message::Error {
                            code: ErrorCode::Internal,
                            message: reason,
                        };
                        write_message(&mut writer, &refusal).await?;
                    }
                    Err(e) => return Err(e),
                }
            }
            Err(Error::Io(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                // Connection closed
                break;
            }
            Err(e) => {
                tracing::warn!("Error reading message from {}: {}", peer_addr, e);
                break;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_server_bind_resolves_port() {
        let server = NetworkServer::bind("127.0.0.1:0").await.unwrap();
        assert_ne!(server.local_addr().port(), 0);
    }
}
