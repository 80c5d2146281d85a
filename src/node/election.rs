//! Tracker Election
//!
//! One round of the election: vote for ourselves, collect votes from
//! every peer in the directory and, with a majority of the nodes that
//! answered, take over as tracker for the contested epoch.
//!
//! The contested epoch is the next one, unless this node already voted
//! in it (for itself in a lost round, or for a peer). Then it moves past
//! every epoch it voted in, so a split vote never blocks later rounds.

use super::Node;
use crate::directory::{self, TrackerAd};
use crate::error::{Error, Result};
use crate::network::broadcast;
use crate::state::SkipReason;

/// Votes collected in one election round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    /// Epoch contested
    pub epoch: u64,
    /// Votes granted, our own included
    pub granted: usize,
    /// Nodes that answered, ourselves included
    pub respondents: usize,
}

impl Tally {
    /// Start with the candidate's own vote
    pub fn new(epoch: u64) -> Self {
        Self {
            epoch,
            granted: 1,
            respondents: 1,
        }
    }

    /// Count one answer, `None` meaning no answer at all
    pub fn record(&mut self, vote: Option<bool>) {
        if let Some(granted) = vote {
            self.respondents += 1;
            if granted {
                self.granted += 1;
            }
        }
    }

    /// Strict majority of the nodes that answered
    pub fn has_majority(&self) -> bool {
        self.granted > self.respondents / 2
    }
}

/// How an election attempt ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElectionOutcome {
    /// We are the tracker for `tally.epoch`
    Won(Tally),
    /// No majority, nothing changed
    Lost(Tally),
    /// Majority reached, but another node's result notice got there first
    Superseded(Tally),
    /// No round was run
    Skipped(SkipReason),
}

impl ElectionOutcome {
    pub fn tally(&self) -> Option<&Tally> {
        match self {
            ElectionOutcome::Won(t) | ElectionOutcome::Lost(t) | ElectionOutcome::Superseded(t) => {
                Some(t)
            }
            ElectionOutcome::Skipped(_) => None,
        }
    }

    pub fn is_won(&self) -> bool {
        matches!(self, ElectionOutcome::Won(_))
    }
}

impl Node {
    /// Run one election round
    ///
    /// Errors come from the directory, or `ShuttingDown`. The round is
    /// abandoned and the election flag cleared before they are returned.
    pub async fn start_election(&self) -> Result<ElectionOutcome> {
        if *self.shutdown.borrow() {
            return Err(Error::ShuttingDown);
        }

        let begun = self
            .state
            .lock()
            .await
            .begin_election(self.election_config.notice_ttl());
        let next_epoch = match begun {
            Ok(next_epoch) => next_epoch,
            Err(reason) => {
                tracing::debug!("Election skipped: {:?}", reason);
                return Ok(ElectionOutcome::Skipped(reason));
            }
        };

        // Our own vote goes through the ledger like any other, so a
        // concurrent candidate never gets it for the epoch we contest
        let target = self.ledger.claim_epoch(next_epoch, &self.id).await;
        if target != next_epoch {
            tracing::debug!(
                "Epochs {}..{} already spent on earlier rounds",
                next_epoch,
                target
            );
        }

        let peers = match directory::peer_addresses(self.directory.as_ref(), &self.id).await {
            Ok(peers) => peers,
            Err(e) => {
                self.state.lock().await.abort_election();
                return Err(e);
            }
        };

        tracing::info!(
            "Starting election for epoch {} ({} peers)",
            target,
            peers.len()
        );

        self.broadcast_election_started(&peers).await;
        let tally = self.collect_votes(target, peers.clone()).await;

        tracing::info!(
            "Election for epoch {}: {}/{} votes",
            target,
            tally.granted,
            tally.respondents
        );

        if !tally.has_majority() {
            self.state.lock().await.abort_election();
            tracing::info!("No majority for epoch {}", target);
            return Ok(ElectionOutcome::Lost(tally));
        }

        if self.state.lock().await.promote(target).is_none() {
            tracing::info!(
                "Won epoch {} but a newer result arrived first, standing down",
                target
            );
            return Ok(ElectionOutcome::Superseded(tally));
        }

        tracing::info!("Won election for epoch {}, becoming TRACKER", target);

        if let Err(e) = self.advertise_tracker(target).await {
            tracing::error!("Failed to advertise tracker for epoch {}: {}", target, e);
        }
        self.broadcast_election_result(&peers, target).await;
        if let Err(e) = self.refresh_registration().await {
            tracing::warn!("Failed to register our own files: {}", e);
        }

        Ok(ElectionOutcome::Won(tally))
    }

    async fn collect_votes(&self, epoch: u64, peers: Vec<String>) -> Tally {
        let timeout = self.election_config.vote_timeout();
        let candidate = self.id.clone();

        let results = broadcast::fan_out(
            peers,
            self.election_config.max_parallel_requests,
            timeout,
            |address| {
                let proxy = self.peer_proxy(address, timeout);
                let candidate = candidate.clone();
                async move { proxy.request_vote(epoch, &candidate).await }
            },
        )
        .await;

        let mut tally = Tally::new(epoch);
        for (address, vote) in results {
            match vote {
                Some(granted) => tracing::debug!("{} voted {}", address, granted),
                None => tracing::debug!("{} did not answer", address),
            }
            tally.record(vote);
        }
        tally
    }

    /// Best-effort notice that we are running
    async fn broadcast_election_started(&self, peers: &[String]) {
        let timeout = self.election_config.vote_timeout();
        let candidate = self.id.clone();

        let results = broadcast::fan_out(
            peers.to_vec(),
            self.election_config.max_parallel_requests,
            timeout,
            |address| {
                let proxy = self.peer_proxy(address, timeout);
                let candidate = candidate.clone();
                async move { proxy.notify_election_started(&candidate).await }
            },
        )
        .await;

        tracing::debug!(
            "Election notice reached {}/{} peers",
            broadcast::responded(&results),
            results.len()
        );
    }

    /// Best-effort announcement of the new tracker
    async fn broadcast_election_result(&self, peers: &[String], epoch: u64) {
        let timeout = self.election_config.vote_timeout();
        let tracker = self.id.clone();

        let results = broadcast::fan_out(
            peers.to_vec(),
            self.election_config.max_parallel_requests,
            timeout,
            |address| {
                let proxy = self.peer_proxy(address, timeout);
                let tracker = tracker.clone();
                async move { proxy.notify_election_result(&tracker, epoch).await }
            },
        )
        .await;

        tracing::debug!(
            "Election result reached {}/{} peers",
            broadcast::responded(&results),
            results.len()
        );
    }

    /// Replace older tracker advertisements with ours
    async fn advertise_tracker(&self, epoch: u64) -> Result<()> {
        let ads: Vec<TrackerAd> = directory::tracker_ads(self.directory.as_ref()).await?;
        for ad in ads {
            if ad.epoch < epoch {
                if let Err(e) = self.directory.remove(&directory::tracker_name(ad.epoch)).await {
                    tracing::warn!("Failed to remove stale tracker.{}: {}", ad.epoch, e);
                }
            } else if ad.epoch > epoch {
                tracing::warn!(
                    "Directory already advertises newer tracker.{} at {}",
                    ad.epoch,
                    ad.address
                );
            }
        }

        self.directory
            .register(&directory::tracker_name(epoch), &self.address)
            .await?;

        let mut state = self.state.lock().await;
        state.set_tracker_address(Some(self.address.clone()));
        Ok(())
    }
}
