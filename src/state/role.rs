//! Node Role State
//!
//! Epoch, role and election flag of a node. Every transition happens
//! through the methods below while the owner holds the node's state lock.

use std::sync::Arc;
use std::time::{Duration, Instant};
use serde::{Deserialize, Serialize};

use super::FileRegistry;

/// Role of a node in the cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeRole {
    /// Node is not the tracker
    Follower,
    /// Node is running its own election
    Candidate,
    /// Node holds the file registry
    Tracker,
}

impl std::fmt::Display for NodeRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeRole::Follower => write!(f, "FOLLOWER"),
            NodeRole::Candidate => write!(f, "CANDIDATE"),
            NodeRole::Tracker => write!(f, "TRACKER"),
        }
    }
}

/// Election-in-progress flag
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElectionFlag {
    /// No election known
    Idle,
    /// This node is running an election
    Running,
    /// A peer announced an election
    Observed { candidate_id: String, since: Instant },
}

/// Why an election was not started
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Our own election is still running
    InProgress,
    /// A peer's election notice is still fresh
    PeerElection { candidate_id: String },
}

/// What an election-result notice changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResultApplied {
    pub previous_epoch: u64,
    pub previous_role: NodeRole,
    pub role: NodeRole,
    /// The announced epoch was lower than ours
    pub regressed: bool,
}

/// Mutable role/epoch state of a node
#[derive(Debug)]
pub struct RoleState {
    epoch: u64,
    role: NodeRole,
    /// Role to fall back to when our own election is lost
    resume_role: NodeRole,
    election: ElectionFlag,
    /// Registry of the tracker instance we hold, if any
    registry: Option<Arc<FileRegistry>>,
    /// Last tracker address resolved from the directory
    tracker_address: Option<String>,
}

impl Default for RoleState {
    fn default() -> Self {
        Self {
            epoch: 0,
            role: NodeRole::Follower,
            resume_role: NodeRole::Follower,
            election: ElectionFlag::Idle,
            registry: None,
            tracker_address: None,
        }
    }
}

impl RoleState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn role(&self) -> NodeRole {
        self.role
    }

    pub fn is_tracker(&self) -> bool {
        self.role == NodeRole::Tracker
    }

    pub fn election(&self) -> &ElectionFlag {
        &self.election
    }

    pub fn election_in_progress(&self) -> bool {
        self.election != ElectionFlag::Idle
    }

    /// Registry of the tracker instance held by this node
    pub fn registry(&self) -> Option<Arc<FileRegistry>> {
        self.registry.clone()
    }

    pub fn tracker_address(&self) -> Option<&str> {
        self.tracker_address.as_deref()
    }

    pub fn set_tracker_address(&mut self, address: Option<String>) {
        self.tracker_address = address;
    }

    /// Check-and-set the election flag, returning the next epoch
    ///
    /// A peer's notice older than `notice_ttl` no longer blocks us.
    pub fn begin_election(&mut self, notice_ttl: Duration) -> Result<u64, SkipReason> {
        match &self.election {
            ElectionFlag::Running => return Err(SkipReason::InProgress),
            ElectionFlag::Observed { candidate_id, since } if since.elapsed() < notice_ttl => {
                return Err(SkipReason::PeerElection {
                    candidate_id: candidate_id.clone(),
                });
            }
            _ => {}
        }

        self.election = ElectionFlag::Running;
        if self.role != NodeRole::Candidate {
            self.resume_role = self.role;
        }
        self.role = NodeRole::Candidate;
        Ok(self.epoch + 1)
    }

    /// Our election ended without a win
    ///
    /// Leaves epoch untouched. Role is restored unless a result notice
    /// already moved us on.
    pub fn abort_election(&mut self) {
        if self.election == ElectionFlag::Running {
            self.election = ElectionFlag::Idle;
        }
        if self.role == NodeRole::Candidate {
            self.role = self.resume_role;
        }
    }

    /// Take the tracker role for `epoch` with a fresh, empty registry
    ///
    /// Returns `None` when we already reached `epoch` or beyond through
    /// another node's announcement.
    pub fn promote(&mut self, epoch: u64) -> Option<Arc<FileRegistry>> {
        if self.epoch >= epoch {
            self.abort_election();
            return None;
        }

        let registry = Arc::new(FileRegistry::new(epoch));
        self.epoch = epoch;
        self.role = NodeRole::Tracker;
        self.resume_role = NodeRole::Tracker;
        self.election = ElectionFlag::Idle;
        self.registry = Some(Arc::clone(&registry));
        Some(registry)
    }

    /// A peer announced it started an election
    pub fn observe_election(&mut self, candidate_id: &str) {
        if self.election != ElectionFlag::Running {
            self.election = ElectionFlag::Observed {
                candidate_id: candidate_id.to_string(),
                since: Instant::now(),
            };
        }
    }

    /// Catch up with an epoch seen in the directory
    ///
    /// Only ever raises the epoch. A tracker that learns of a newer
    /// epoch steps down. Returns true when that happened.
    pub fn observe_epoch(&mut self, epoch: u64) -> bool {
        if epoch <= self.epoch {
            return false;
        }

        self.epoch = epoch;
        if self.role == NodeRole::Tracker {
            self.role = NodeRole::Follower;
            self.resume_role = NodeRole::Follower;
            self.registry = None;
            return true;
        }
        if self.resume_role == NodeRole::Tracker {
            self.resume_role = NodeRole::Follower;
            self.registry = None;
        }
        false
    }

    /// Apply an election-result notice
    ///
    /// The announced epoch is accepted even when lower than ours.
    pub fn apply_result(&mut self, self_id: &str, tracker_id: &str, epoch: u64) -> ResultApplied {
        let previous_epoch = self.epoch;
        let previous_role = self.role;

        self.election = ElectionFlag::Idle;
        self.epoch = epoch;

        if tracker_id == self_id {
            self.role = NodeRole::Tracker;
            let reuse = self.registry.as_ref().is_some_and(|r| r.epoch() == epoch);
            if !reuse {
                self.registry = Some(Arc::new(FileRegistry::new(epoch)));
            }
        } else {
            // Our tracker instance, if any, is abandoned
            self.role = NodeRole::Follower;
            self.registry = None;
        }
        self.resume_role = self.role;

        ResultApplied {
            previous_epoch,
            previous_role,
            role: self.role,
            regressed: epoch < previous_epoch,
        }
    }
}
