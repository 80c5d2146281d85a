//! Typed Remote Proxies
//!
//! Thin wrappers that turn a `Transport` and an address into the remote
//! call surfaces of a peer node and of the tracker.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use super::{ErrorCode, Message, Transport};
use crate::error::{Error, Result};

/// Convert an error reply into the matching crate error
fn remote_error(address: &str, code: ErrorCode, message: String) -> Error {
    match code {
        ErrorCode::NotTracker => Error::NotTracker(address.to_string()),
        ErrorCode::NotFound => Error::FileNotFound(message),
        _ => Error::Remote { code, message },
    }
}

fn unexpected(expected: &'static str, got: &Message) -> Error {
    Error::UnexpectedResponse {
        expected,
        got: got.type_name(),
    }
}

/// Remote surface exposed by every node
#[derive(Clone)]
pub struct PeerProxy {
    transport: Arc<dyn Transport>,
    address: String,
    timeout: Duration,
}

impl PeerProxy {
    pub fn new(transport: Arc<dyn Transport>, address: impl Into<String>, timeout: Duration) -> Self {
        Self {
            transport,
            address: address.into(),
            timeout,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    async fn call(&self, message: Message) -> Result<Message> {
        match self.transport.call(&self.address, message, self.timeout).await? {
            Message::Error { code, message } => Err(remote_error(&self.address, code, message)),
            other => Ok(other),
        }
    }

    /// Ask the peer to vote for `candidate_id` in `epoch`
    pub async fn request_vote(&self, epoch: u64, candidate_id: &str) -> Result<bool> {
        let reply = self
            .call(Message::RequestVote {
                epoch,
                candidate_id: candidate_id.to_string(),
            })
            .await?;
        match reply {
            Message::VoteResponse { granted } => Ok(granted),
            other => Err(unexpected("VoteResponse", &other)),
        }
    }

    /// Fetch a file, `None` when the peer does not have it
    pub async fn get_file(&self, filename: &str) -> Result<Option<Vec<u8>>> {
        let reply = self
            .call(Message::GetFile {
                filename: filename.to_string(),
            })
            .await?;
        match reply {
            Message::FileContent { data } => Ok(data),
            other => Err(unexpected("FileContent", &other)),
        }
    }

    pub async fn notify_election_started(&self, candidate_id: &str) -> Result<()> {
        let reply = self
            .call(Message::ElectionStarted {
                candidate_id: candidate_id.to_string(),
            })
            .await?;
        match reply {
            Message::Ack => Ok(()),
            other => Err(unexpected("Ack", &other)),
        }
    }

    pub async fn notify_election_result(&self, tracker_id: &str, epoch: u64) -> Result<()> {
        let reply = self
            .call(Message::ElectionResult {
                tracker_id: tracker_id.to_string(),
                epoch,
            })
            .await?;
        match reply {
            Message::Ack => Ok(()),
            other => Err(unexpected("Ack", &other)),
        }
    }
}

/// Remote surface exposed by the node holding the tracker role
#[derive(Clone)]
pub struct TrackerProxy {
    inner: PeerProxy,
}

impl TrackerProxy {
    pub fn new(transport: Arc<dyn Transport>, address: impl Into<String>, timeout: Duration) -> Self {
        Self {
            inner: PeerProxy::new(transport, address, timeout),
        }
    }

    pub fn address(&self) -> &str {
        self.inner.address()
    }

    async fn expect_ack(&self, message: Message) -> Result<()> {
        match self.inner.call(message).await? {
            Message::Ack => Ok(()),
            other => Err(unexpected("Ack", &other)),
        }
    }

    pub async fn register_files(&self, owner: &str, filenames: Vec<String>) -> Result<()> {
        self.expect_ack(Message::RegisterFiles {
            owner: owner.to_string(),
            filenames,
        })
        .await
    }

    pub async fn update_file_add(&self, owner: &str, filename: &str) -> Result<()> {
        self.expect_ack(Message::FileAdded {
            owner: owner.to_string(),
            filename: filename.to_string(),
        })
        .await
    }

    pub async fn update_file_remove(&self, owner: &str, filename: &str) -> Result<()> {
        self.expect_ack(Message::FileRemoved {
            owner: owner.to_string(),
            filename: filename.to_string(),
        })
        .await
    }

    pub async fn who_has(&self, filename: &str) -> Result<Vec<String>> {
        let reply = self
            .inner
            .call(Message::WhoHas {
                filename: filename.to_string(),
            })
            .await?;
        match reply {
            Message::Owners { addresses } => Ok(addresses),
            other => Err(unexpected("Owners", &other)),
        }
    }

    /// Liveness probe, returns the tracker's epoch
    pub async fn heartbeat(&self) -> Result<u64> {
        match self.inner.call(Message::Heartbeat).await? {
            Message::HeartbeatAck { epoch } => Ok(epoch),
            other => Err(unexpected("HeartbeatAck", &other)),
        }
    }

    pub async fn list_all_files(&self) -> Result<BTreeMap<String, Vec<String>>> {
        match self.inner.call(Message::ListAllFiles).await? {
            Message::FileIndex { files } => Ok(files),
            other => Err(unexpected("FileIndex", &other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Transport answering every call with a fixed reply
    struct Canned(Message);

    #[async_trait::async_trait]
    impl Transport for Canned {
        async fn call(&self, _address: &str, _message: Message, _timeout: Duration) -> Result<Message> {
            Ok(self.0.clone())
        }
    }

    fn tracker(reply: Message) -> TrackerProxy {
        TrackerProxy::new(Arc::new(Canned(reply)), "10.0.0.9:7700", Duration::from_millis(50))
    }

    #[tokio::test]
    async fn test_not_tracker_reply_maps_to_error() {
        let proxy = tracker(Message::Error {
            code: ErrorCode::NotTracker,
            message: "follower".into(),
        });

        match proxy.heartbeat().await {
            Err(Error::NotTracker(addr)) => assert_eq!(addr, "10.0.0.9:7700"),
            other => panic!("expected NotTracker, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_wrong_reply_is_transport_failure() {
        let proxy = tracker(Message::Ack);
        let err = proxy.who_has("a.txt").await.unwrap_err();
        assert!(err.is_transport_failure());
    }

    #[tokio::test]
    async fn test_vote_reply() {
        let peer = PeerProxy::new(
            Arc::new(Canned(Message::VoteResponse { granted: true })),
            "10.0.0.3:7700",
            Duration::from_millis(50),
        );
        assert!(peer.request_vote(1, "alice").await.unwrap());
    }
}
