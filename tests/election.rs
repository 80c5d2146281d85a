mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use wolfshare::config::HeartbeatConfig;
use wolfshare::directory::{self, Directory};
use wolfshare::error::Error;
use wolfshare::node::{ElectionOutcome, Node, NodeParts, NodeService, Tally};
use wolfshare::state::{NodeRole, SkipReason};
use wolfshare::storage::SharedDir;

const SETTLE: Duration = Duration::from_secs(2);

async fn indexed(cluster: &TestCluster, tracker: &str, filename: &str) -> bool {
    match cluster.node(tracker).registry().await {
        Ok(registry) => !registry.who_has(filename).await.is_empty(),
        Err(_) => false,
    }
}

#[tokio::test]
async fn first_election_with_all_peers_answering() {
    let cluster = TestCluster::new(&["alice", "bob", "carol"]).await;
    let alice = cluster.node("alice");

    let outcome = alice.start_election().await.unwrap();
    assert_eq!(
        outcome,
        ElectionOutcome::Won(Tally {
            epoch: 1,
            granted: 3,
            respondents: 3,
        })
    );

    let ad = directory::resolve_tracker(cluster.directory.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(ad.epoch, 1);
    assert_eq!(ad.address, alice.address());
    assert_eq!(alice.role().await, NodeRole::Tracker);

    for id in ["bob", "carol"] {
        let status = cluster.node(id).status().await;
        assert_eq!(status.epoch, 1);
        assert_eq!(status.role, NodeRole::Follower);
        assert!(!status.election_in_progress);
    }

    // Followers rebuild the fresh index by re-registering
    for filename in ["file_alice.txt", "file_bob.txt", "file_carol.txt"] {
        assert!(
            eventually(SETTLE, || indexed(&cluster, "alice", filename)).await,
            "{} never registered",
            filename
        );
    }
}

#[tokio::test]
async fn failover_counts_only_respondents() {
    let cluster = TestCluster::new(&["alice", "bob", "carol"]).await;
    let (alice, bob, carol) = (cluster.node("alice"), cluster.node("bob"), cluster.node("carol"));

    assert!(alice.start_election().await.unwrap().is_won());

    // Tracker dies, bob notices on its next probe
    cluster.transport.set_down(alice.address(), true);
    bob.heartbeat_tick().await.unwrap();

    assert_eq!(bob.role().await, NodeRole::Tracker);
    assert_eq!(bob.epoch().await, 2);
    assert_eq!(carol.epoch().await, 2);

    let ads = directory::tracker_ads(cluster.directory.as_ref()).await.unwrap();
    assert_eq!(ads.len(), 1, "stale advertisement left behind: {:?}", ads);
    assert_eq!(ads[0].epoch, 2);
    assert_eq!(ads[0].address, bob.address());
}

#[tokio::test]
async fn failover_tally_with_one_silent_peer() {
    let cluster = TestCluster::new(&["alice", "bob", "carol"]).await;
    let (alice, bob) = (cluster.node("alice"), cluster.node("bob"));

    assert!(alice.start_election().await.unwrap().is_won());
    cluster.transport.set_down(alice.address(), true);

    // 2 of 2 respondents, the dead tracker does not count
    assert_eq!(
        bob.start_election().await.unwrap(),
        ElectionOutcome::Won(Tally {
            epoch: 2,
            granted: 2,
            respondents: 2,
        })
    );
}

#[tokio::test]
async fn concurrent_candidates_never_both_win() {
    let cluster = TestCluster::new(&["alice", "bob", "carol"]).await;
    let (alice, bob, carol) = (cluster.node("alice"), cluster.node("bob"), cluster.node("carol"));

    // Delay traffic to both candidates so neither sees the other's
    // notice before starting
    cluster.transport.set_slow(alice.address(), Duration::from_millis(50));
    cluster.transport.set_slow(bob.address(), Duration::from_millis(50));

    let (a, b) = tokio::join!(alice.start_election(), bob.start_election());
    let (a, b) = (a.unwrap(), b.unwrap());

    let winners = [&a, &b].iter().filter(|o| o.is_won()).count();
    assert_eq!(winners, 1, "alice: {:?}, bob: {:?}", a, b);

    let winner = if a.is_won() { alice } else { bob };
    assert_eq!(carol.ledger().voted_for(1).await.as_deref(), Some(winner.id()));

    // The loser learns about the winner from the result notice
    for node in cluster.nodes() {
        assert_eq!(node.epoch().await, 1);
        assert!(!node.status().await.election_in_progress);
    }
    assert_eq!(
        [alice.role().await, bob.role().await]
            .iter()
            .filter(|r| **r == NodeRole::Tracker)
            .count(),
        1
    );
}

#[tokio::test]
async fn four_node_race_has_at_most_one_winner() {
    let cluster = TestCluster::new(&["alice", "bob", "carol", "dave"]).await;
    for id in ["alice", "bob"] {
        cluster
            .transport
            .set_slow(cluster.node(id).address(), Duration::from_millis(50));
    }

    let (a, b) = tokio::join!(
        cluster.node("alice").start_election(),
        cluster.node("bob").start_election()
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert!(!(a.is_won() && b.is_won()));
    for outcome in [&a, &b] {
        if let ElectionOutcome::Lost(tally) = outcome {
            assert!(!tally.has_majority());
        }
    }
}

#[tokio::test]
async fn lost_election_leaves_state_unchanged() {
    let cluster = TestCluster::new(&["alice", "bob", "carol"]).await;
    let alice = cluster.node("alice");

    // Both peers already promised epoch 1 to someone else
    for id in ["bob", "carol"] {
        assert!(cluster.node(id).on_vote_request(1, "mallory").await);
    }

    let outcome = alice.start_election().await.unwrap();
    assert_eq!(
        outcome,
        ElectionOutcome::Lost(Tally {
            epoch: 1,
            granted: 1,
            respondents: 3,
        })
    );

    let status = alice.status().await;
    assert_eq!(status.epoch, 0);
    assert_eq!(status.role, NodeRole::Follower);
    assert!(!status.election_in_progress);
    assert!(directory::resolve_tracker(cluster.directory.as_ref())
        .await
        .unwrap()
        .is_none());

    // The next round contests a fresh epoch and wins it
    assert_eq!(
        alice.start_election().await.unwrap(),
        ElectionOutcome::Won(Tally {
            epoch: 2,
            granted: 3,
            respondents: 3,
        })
    );
    assert_eq!(alice.epoch().await, 2);
}

#[tokio::test]
async fn candidate_moves_past_an_epoch_it_voted_in() {
    let cluster = TestCluster::new(&["alice", "bob"]).await;
    let alice = cluster.node("alice");

    assert!(alice.on_vote_request(1, "bob").await);
    assert_eq!(
        alice.start_election().await.unwrap(),
        ElectionOutcome::Won(Tally {
            epoch: 2,
            granted: 2,
            respondents: 2,
        })
    );
    assert_eq!(alice.ledger().voted_for(1).await.as_deref(), Some("bob"));
    assert_eq!(alice.ledger().voted_for(2).await.as_deref(), Some("alice"));
}

#[tokio::test]
async fn split_vote_is_followed_by_a_successful_election() {
    let cluster = TestCluster::new(&["alice", "bob", "carol"]).await;
    let (alice, bob, carol) = (cluster.node("alice"), cluster.node("bob"), cluster.node("carol"));

    assert!(alice.start_election().await.unwrap().is_won());
    cluster.transport.set_down(alice.address(), true);

    // Both survivors run for epoch 2 at once and refuse each other
    cluster.transport.set_slow(bob.address(), Duration::from_millis(50));
    cluster.transport.set_slow(carol.address(), Duration::from_millis(50));
    let (b, c) = tokio::join!(bob.start_election(), carol.start_election());
    let (b, c) = (b.unwrap(), c.unwrap());
    assert!(!b.is_won() && !c.is_won(), "bob: {:?}, carol: {:?}", b, c);
    assert_eq!(bob.epoch().await, 1);

    // The next probe of the dead tracker elects someone
    bob.heartbeat_tick().await.unwrap();

    let status = bob.status().await;
    assert_eq!(status.role, NodeRole::Tracker);
    assert_eq!(status.epoch, 3);
    assert_eq!(carol.epoch().await, 3);

    let ad = directory::resolve_tracker(cluster.directory.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!((ad.epoch, ad.address.as_str()), (3, bob.address()));
}

#[tokio::test]
async fn survivor_wins_after_candidate_crashed_holding_its_vote() {
    let cluster = TestCluster::new(&["alice", "bob", "carol"]).await;
    let (alice, bob, carol) = (cluster.node("alice"), cluster.node("bob"), cluster.node("carol"));

    assert!(alice.start_election().await.unwrap().is_won());

    // Carol collected bob's vote for epoch 2, then died with the tracker
    assert!(bob.on_vote_request(2, "carol").await);
    cluster.transport.set_down(carol.address(), true);
    cluster.transport.set_down(alice.address(), true);

    bob.heartbeat_tick().await.unwrap();

    let status = bob.status().await;
    assert_eq!(status.role, NodeRole::Tracker);
    assert_eq!(status.epoch, 3);
    assert_eq!(status.tracker_address.as_deref(), Some(bob.address()));
}

#[tokio::test]
async fn peer_notice_suppresses_local_election() {
    let cluster = TestCluster::new(&["alice", "bob"]).await;
    let alice = cluster.node("alice");

    alice.on_election_started("bob").await;
    assert_eq!(
        alice.start_election().await.unwrap(),
        ElectionOutcome::Skipped(SkipReason::PeerElection {
            candidate_id: "bob".into(),
        })
    );
}

#[tokio::test]
async fn stale_tracker_steps_down_after_partition() {
    let cluster = TestCluster::new(&["alice", "bob", "carol"]).await;
    let (alice, bob) = (cluster.node("alice"), cluster.node("bob"));

    assert!(alice.start_election().await.unwrap().is_won());

    // Alice misses the whole next election
    cluster.transport.set_down(alice.address(), true);
    assert!(bob.start_election().await.unwrap().is_won());
    cluster.transport.set_down(alice.address(), false);

    assert_eq!(alice.role().await, NodeRole::Tracker);
    alice.heartbeat_tick().await.unwrap();

    let status = alice.status().await;
    assert_eq!(status.role, NodeRole::Follower);
    assert_eq!(status.epoch, 2);
    assert_eq!(status.tracker_address.as_deref(), Some(bob.address()));
}

#[tokio::test]
async fn regressed_result_notice_is_accepted() {
    let cluster = TestCluster::new(&["alice", "bob"]).await;
    let alice = cluster.node("alice");

    alice.apply_election_result("bob", 5).await;
    alice.apply_election_result("carol", 3).await;

    assert_eq!(alice.epoch().await, 3);
    assert_eq!(alice.role().await, NodeRole::Follower);
}

#[tokio::test]
async fn heartbeat_monitors_elect_a_single_tracker() {
    let cluster = TestCluster::new(&["alice", "bob", "carol"]).await;
    let monitors: Vec<_> = cluster.nodes().iter().map(|n| n.spawn_heartbeat()).collect();

    let shared = &cluster;
    let elected = eventually(Duration::from_secs(5), || async move {
        let ad = match directory::resolve_tracker(shared.directory.as_ref()).await {
            Ok(Some(ad)) => ad,
            _ => return false,
        };
        let mut trackers = 0;
        for node in shared.nodes() {
            if node.role().await == NodeRole::Tracker {
                trackers += 1;
                if node.address() != ad.address {
                    return false;
                }
            }
        }
        trackers == 1
    })
    .await;
    assert!(elected, "no single tracker emerged");

    for node in cluster.nodes() {
        node.shutdown().await;
    }
    for monitor in monitors {
        tokio::time::timeout(Duration::from_secs(1), monitor)
            .await
            .expect("monitor did not stop")
            .unwrap();
    }
    assert!(cluster.directory.list("peer.").await.unwrap().is_empty());
}

#[tokio::test]
async fn monitor_survives_directory_outage() {
    let dir = tempfile::tempdir().unwrap();
    let directory = Arc::new(FlakyDirectory::default());
    let transport = Arc::new(LoopbackTransport::new());

    let alice = Arc::new(Node::new(NodeParts {
        id: "alice".into(),
        address: address_of("alice"),
        election: fast_election(),
        heartbeat: fast_heartbeat(),
        request_timeout: Duration::from_millis(500),
        directory: directory.clone(),
        transport: transport.clone(),
        storage: SharedDir::new(dir.path().join("alice")),
    }));
    transport.route(alice.address(), Arc::new(NodeService::new(Arc::clone(&alice))));
    alice.join().await.unwrap();

    directory.fail_next(5);
    let monitor = alice.spawn_heartbeat();

    let elected = eventually(Duration::from_secs(3), || {
        let alice = Arc::clone(&alice);
        async move { alice.role().await == NodeRole::Tracker }
    })
    .await;
    assert!(elected, "monitor gave up after directory errors");
    assert_eq!(directory.failures_left(), 0);

    alice.shutdown().await;
    tokio::time::timeout(Duration::from_secs(1), monitor)
        .await
        .expect("monitor did not stop")
        .unwrap();
}

#[tokio::test]
async fn shutdown_interrupts_the_no_tracker_wait() {
    let heartbeat = HeartbeatConfig {
        startup_jitter_min_ms: 0,
        startup_jitter_max_ms: 0,
        absent_wait_ms: 30_000,
        ..fast_heartbeat()
    };
    let cluster = TestCluster::with_heartbeat(&["alice"], heartbeat).await;
    let alice = cluster.node("alice");

    let monitor = alice.spawn_heartbeat();
    tokio::time::sleep(Duration::from_millis(100)).await;
    alice.shutdown().await;

    tokio::time::timeout(Duration::from_secs(1), monitor)
        .await
        .expect("monitor kept waiting for a tracker")
        .unwrap();
    assert_eq!(alice.role().await, NodeRole::Follower);
}

#[tokio::test]
async fn no_election_after_shutdown() {
    let cluster = TestCluster::new(&["alice", "bob"]).await;
    let alice = cluster.node("alice");

    alice.shutdown().await;
    assert!(matches!(alice.start_election().await, Err(Error::ShuttingDown)));
    assert!(!alice.status().await.election_in_progress);
}
