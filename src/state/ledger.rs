//! Vote Ledger
//!
//! Records which candidate this node voted for in each epoch. At most
//! one vote is ever granted per epoch, and a recorded vote never changes.

use std::collections::HashMap;
use tokio::sync::Mutex;

/// Per-node record of granted votes
#[derive(Debug, Default)]
pub struct VoteLedger {
    /// epoch -> candidate that received our vote
    votes: Mutex<HashMap<u64, String>>,
}

impl VoteLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant our vote for `epoch` to `candidate_id`
    ///
    /// Returns true iff no vote was recorded for `epoch` yet. A second
    /// request for the same epoch is denied even when it comes from the
    /// candidate that already holds the vote.
    pub async fn grant_vote(&self, epoch: u64, candidate_id: &str) -> bool {
        let mut votes = self.votes.lock().await;
        if votes.contains_key(&epoch) {
            return false;
        }
        votes.insert(epoch, candidate_id.to_string());
        true
    }

    /// Candidate that holds our vote for `epoch`, if any
    pub async fn voted_for(&self, epoch: u64) -> Option<String> {
        self.votes.lock().await.get(&epoch).cloned()
    }

    /// Vote for ourselves in the first epoch we can still stand in
    ///
    /// That is `min_epoch`, or the epoch after the highest one we already
    /// voted in when that is later. Epochs spent on earlier rounds, ours
    /// or another candidate's, are never contested again.
    pub async fn claim_epoch(&self, min_epoch: u64, candidate_id: &str) -> u64 {
        let mut votes = self.votes.lock().await;
        let epoch = match votes.keys().max() {
            Some(&highest) if highest >= min_epoch => highest + 1,
            _ => min_epoch,
        };
        votes.insert(epoch, candidate_id.to_string());
        epoch
    }
}
