//! `GarbageCollector`: periodic, jittered pruning of stale pending
//! transmissions.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;

use crate::metrics;
use crate::traits::Database;

/// Base period between collection passes.
const BASE_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Upper bound of the uniform jitter added to [`BASE_INTERVAL`], to
/// desynchronize garbage collection across a fleet.
const JITTER_MAX: Duration = Duration::from_secs(5 * 60);

/// How far back pending transmissions are retained before deletion.
const RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

/// Runs the garbage collector until `cancel` fires.
pub async fn run<D: Database>(database: Arc<D>, database_timeout: Duration, cancel: CancellationToken) {
    loop {
        let jitter_millis = rand::rng().random_range(0..=JITTER_MAX.as_millis() as u64);
        let sleep = BASE_INTERVAL + Duration::from_millis(jitter_millis);

        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::debug!("GarbageCollector cancelled, exiting");
                return;
            }
            () = tokio::time::sleep(sleep) => {
                collect_once(&*database, database_timeout).await;
            }
        }
    }
}

async fn collect_once<D: Database>(database: &D, database_timeout: Duration) {
    let Ok(now) = std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH) else {
        tracing::error!("system clock before unix epoch, skipping garbage collection pass");
        return;
    };
    let older_than = now.saturating_sub(RETENTION).as_secs();

    match tokio::time::timeout(
        database_timeout,
        database.delete_pending_transmissions_older_than(older_than),
    )
    .await
    {
        Ok(Ok(())) => metrics::GARBAGE_COLLECTOR_RUNS_TOTAL.inc(),
        Ok(Err(err)) => tracing::warn!(%err, "garbage collection pass failed"),
        Err(_) => tracing::warn!("garbage collection pass timed out"),
    }
}
