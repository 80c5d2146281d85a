//! Heartbeat Monitor
//!
//! Background task probing the tracker. A failed probe, or no tracker
//! at all, starts an election.

use std::sync::Arc;
use std::time::Duration;
use rand::Rng;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::Node;
use crate::error::{Error, Result};

/// Uniformly random duration in `[min_ms, max_ms]`
fn jitter(min_ms: u64, max_ms: u64) -> Duration {
    let mut rng = rand::thread_rng();
    Duration::from_millis(rng.gen_range(min_ms..=max_ms.max(min_ms)))
}

/// Sleep unless shutdown is signalled first, returns true on shutdown
async fn sleep_or_shutdown(duration: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    if *shutdown.borrow() {
        return true;
    }
    tokio::select! {
        _ = tokio::time::sleep(duration) => false,
        changed = shutdown.changed() => changed.is_err() || *shutdown.borrow(),
    }
}

impl Node {
    /// Spawn the monitor, it runs until `shutdown()`
    pub fn spawn_heartbeat(self: &Arc<Self>) -> JoinHandle<()> {
        let node = Arc::clone(self);
        tokio::spawn(async move { node.run_heartbeat().await })
    }

    async fn run_heartbeat(&self) {
        let mut shutdown = self.shutdown.subscribe();
        let hb = &self.heartbeat_config;

        // Spread out the first probes of nodes started together
        let delay = jitter(hb.startup_jitter_min_ms, hb.startup_jitter_max_ms);
        if sleep_or_shutdown(delay, &mut shutdown).await {
            return;
        }

        tracing::info!("Heartbeat monitor started for {}", self.id);

        loop {
            let pause = match self.heartbeat_tick().await {
                Ok(()) => self.heartbeat_interval(),
                Err(Error::ShuttingDown) => break,
                Err(e) => {
                    tracing::warn!("Heartbeat monitor error: {}", e);
                    hb.error_backoff()
                }
            };
            if sleep_or_shutdown(pause, &mut shutdown).await {
                break;
            }
        }

        tracing::info!("Heartbeat monitor stopped for {}", self.id);
    }

    fn heartbeat_interval(&self) -> Duration {
        jitter(
            self.heartbeat_config.interval_min_ms,
            self.heartbeat_config.interval_max_ms,
        )
    }

    /// One monitor iteration
    ///
    /// Errors are directory failures or `ShuttingDown`. A probe that
    /// fails in transport starts an election here.
    pub async fn heartbeat_tick(&self) -> Result<()> {
        let is_tracker = self.state.lock().await.is_tracker();

        let ad = self.resolve_tracker().await?;
        if is_tracker {
            // Idle, resolving above is enough to notice a newer epoch
            return Ok(());
        }

        match ad {
            Some(ad) => match self.probe(&ad.address).await {
                Ok(_) => {}
                Err(e) if e.is_transport_failure() => {
                    tracing::warn!(
                        "Tracker {} (epoch {}) did not answer: {}",
                        ad.address,
                        ad.epoch,
                        e
                    );
                    self.state.lock().await.set_tracker_address(None);
                    self.start_election().await?;
                }
                Err(e) => return Err(e),
            },
            None => {
                tracing::info!(
                    "No tracker advertised, waiting {:?} before electing",
                    self.heartbeat_config.absent_wait()
                );
                let mut shutdown = self.shutdown.subscribe();
                if sleep_or_shutdown(self.heartbeat_config.absent_wait(), &mut shutdown).await {
                    return Err(Error::ShuttingDown);
                }

                if self.resolve_tracker().await?.is_none() {
                    self.start_election().await?;
                }
            }
        }
        Ok(())
    }

    /// Liveness probe bounded by the probe timeout
    async fn probe(&self, address: &str) -> Result<u64> {
        let timeout = self.heartbeat_config.probe_timeout();
        let proxy = self.tracker_proxy(address, timeout);
        match tokio::time::timeout(timeout, proxy.heartbeat()).await {
            Ok(result) => result,
            Err(_) => Err(Error::ConnectionTimeout(address.to_string())),
        }
    }
}
