//! Node request handling
//!
//! Dispatches framed requests to the node: the peer surface, the
//! tracker surface (only answered while we hold a registry) and the
//! control surface used by `wolfsharectl`.

use std::sync::Arc;
use async_trait::async_trait;

use super::Node;
use crate::error::Result;
use crate::network::{ErrorCode, Message, MessageHandler};

/// `MessageHandler` for a shared node
#[derive(Clone)]
pub struct NodeService {
    node: Arc<Node>,
}

impl NodeService {
    pub fn new(node: Arc<Node>) -> Self {
        Self { node }
    }

    pub fn node(&self) -> &Arc<Node> {
        &self.node
    }

    async fn dispatch(&self, message: Message) -> Result<Message> {
        let node = &self.node;

        match message {
            // Peer surface
            Message::RequestVote { epoch, candidate_id } => Ok(Message::VoteResponse {
                granted: node.on_vote_request(epoch, &candidate_id).await,
            }),
            Message::ElectionStarted { candidate_id } => {
                node.on_election_started(&candidate_id).await;
                Ok(Message::Ack)
            }
            Message::ElectionResult { tracker_id, epoch } => {
                // Re-registration continues after we answered
                let _ = node.on_election_result(&tracker_id, epoch).await;
                Ok(Message::Ack)
            }
            Message::GetFile { filename } => Ok(Message::FileContent {
                data: node.get_file(&filename).await?,
            }),

            // Tracker surface
            Message::RegisterFiles { owner, filenames } => {
                node.registry().await?.register_files(&owner, &filenames).await;
                Ok(Message::Ack)
            }
            Message::FileAdded { owner, filename } => {
                node.registry().await?.update_file_add(&owner, &filename).await;
                Ok(Message::Ack)
            }
            Message::FileRemoved { owner, filename } => {
                node.registry().await?.update_file_remove(&owner, &filename).await;
                Ok(Message::Ack)
            }
            Message::WhoHas { filename } => Ok(Message::Owners {
                addresses: node.registry().await?.who_has(&filename).await,
            }),
            Message::Heartbeat => Ok(Message::HeartbeatAck {
                epoch: node.registry().await?.heartbeat(),
            }),
            Message::ListAllFiles => Ok(Message::FileIndex {
                files: node.registry().await?.list_all_files().await,
            }),

            // Control surface
            Message::StatusRequest => {
                let status = node.status().await;
                Ok(Message::StatusResponse {
                    node_id: status.id,
                    address: status.address,
                    epoch: status.epoch,
                    role: status.role,
                    election_in_progress: status.election_in_progress,
                    tracker_address: status.tracker_address,
                    joined_at: status.joined_at.to_rfc3339(),
                })
            }
            Message::TriggerElection => {
                let outcome = node.start_election().await?;
                let tally = outcome.tally().copied();
                Ok(Message::ElectionReport {
                    won: outcome.is_won(),
                    epoch: node.epoch().await,
                    granted: tally.map_or(0, |t| t.granted),
                    respondents: tally.map_or(0, |t| t.respondents),
                    skipped: tally.is_none(),
                })
            }
            Message::ListLocal => Ok(Message::LocalFiles {
                filenames: node.local_files().await?,
            }),
            Message::ListNetwork => Ok(Message::FileIndex {
                files: node.list_network_files().await?,
            }),
            Message::ShareFile { filename, data } => {
                node.share_file(&filename, &data).await?;
                Ok(Message::Ack)
            }
            Message::UnshareFile { filename } => {
                node.unshare_file(&filename).await?;
                Ok(Message::Ack)
            }
            Message::Download { filename } => {
                let (source, size) = node.download(&filename).await?;
                Ok(Message::Downloaded { source, size })
            }

            other => Ok(Message::Error {
                code: ErrorCode::BadRequest,
                message: format!("{} is not handled by nodes", other.type_name()),
            }),
        }
    }
}

#[async_trait]
impl MessageHandler for NodeService {
    async fn handle(&self, peer_addr: &str, message: Message) -> Message {
        let kind = message.type_name();
        match self.dispatch(message).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::debug!("{} from {} failed: {}", kind, peer_addr, e);
                Message::from_error(&e)
            }
        }
    }
}
