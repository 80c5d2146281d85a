//! Bounded Fan-out
//!
//! Runs one remote call per target with bounded concurrency and a fixed
//! per-call timeout. Failures never escape: each target yields either
//! its result or nothing.

use std::future::Future;
use std::time::Duration;

use futures::stream::{self, StreamExt};

use crate::error::Result;

/// Call `f` for every target, at most `limit` at a time
///
/// Returns `(target, Some(value))` for calls that completed within
/// `timeout`, and `(target, None)` for errors and timeouts. Order of the
/// returned pairs follows completion, not `targets`.
pub async fn fan_out<T, F, Fut>(
    targets: Vec<String>,
    limit: usize,
    timeout: Duration,
    f: F,
) -> Vec<(String, Option<T>)>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    stream::iter(targets)
        .map(|target| {
            let call = f(target.clone());
            async move {
                let outcome = match tokio::time::timeout(timeout, call).await {
                    Ok(Ok(value)) => Some(value),
                    Ok(Err(e)) => {
                        tracing::debug!("Call to {} failed: {}", target, e);
                        None
                    }
                    Err(_) => {
                        tracing::debug!("Call to {} timed out", target);
                        None
                    }
                };
                (target, outcome)
            }
        })
        .buffer_unordered(limit.max(1))
        .collect()
        .await
}

/// Count how many targets answered at all
pub fn responded<T>(results: &[(String, Option<T>)]) -> usize {
    results.iter().filter(|(_, r)| r.is_some()).count()
}
