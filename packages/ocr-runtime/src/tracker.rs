//! `ConfigTracker`: a long-lived task surfacing on-chain `ContractConfig`
//! changes on a bounded channel.

use std::time::Duration;

use ocr_types::{ConfigDigest, ContractConfig, LocalConfig};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::metrics;
use crate::traits::{ConfigSubscription, ContractConfigTracker};

/// Re-check sooner than `poll_interval` while waiting for confirmations,
/// capped at this value.
const FAST_RECHECK_CAP: Duration = Duration::from_secs(15);

/// Depth of the output channel. The tracker blocks (racing cancellation) on
/// send if the supervisor falls behind; this is deliberately small since the
/// supervisor is expected to drain far faster than configs change.
const OUTPUT_CHANNEL_CAPACITY: usize = 4;

/// Spawns the `ConfigTracker` state machine and returns the receiving half of
/// its output channel.
///
/// `current_digest` seeds the "most recently emitted" state so a config
/// matching it is never re-emitted.
pub fn spawn<T: ContractConfigTracker>(
    tracker: std::sync::Arc<T>,
    local_config: LocalConfig,
    current_digest: ConfigDigest,
    cancel: CancellationToken,
) -> mpsc::Receiver<ContractConfig> {
    let (tx, rx) = mpsc::channel(OUTPUT_CHANNEL_CAPACITY);
    tokio::spawn(run(tracker, local_config, current_digest, tx, cancel));
    rx
}

async fn run<T: ContractConfigTracker>(
    tracker: std::sync::Arc<T>,
    local_config: LocalConfig,
    mut current_digest: ConfigDigest,
    tx: mpsc::Sender<ContractConfig>,
    cancel: CancellationToken,
) {
    let mut next_check = Instant::now() + local_config.contract_config_tracker_poll_interval;

    let mut subscription: Option<T::Subscription> = match tracker.subscribe_to_new_configs().await {
        Ok(sub) => Some(sub),
        Err(err) => {
            tracing::warn!(%err, "initial subscribe_to_new_configs failed, will retry");
            None
        }
    };
    let mut resubscribe_interval = tokio::time::interval(local_config.contract_config_tracker_subscribe_interval);
    resubscribe_interval.reset();

    loop {
        let subscription_hint = async {
            match subscription.as_mut() {
                Some(sub) => sub.next_hint().await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                tracing::debug!("ConfigTracker cancelled, exiting");
                return;
            }

            () = tokio::time::sleep_until(next_check) => {
                let awaiting_confirmation = check(&*tracker, &local_config, &mut current_digest, &tx, &cancel).await;
                let delay = if awaiting_confirmation {
                    local_config.contract_config_tracker_poll_interval.min(FAST_RECHECK_CAP)
                } else {
                    local_config.contract_config_tracker_poll_interval
                };
                next_check = Instant::now() + delay;
            }

            hint = subscription_hint => {
                match hint {
                    Some(()) => next_check = Instant::now(),
                    None => {
                        tracing::debug!("config subscription closed, scheduling resubscribe");
                        subscription = None;
                        resubscribe_interval.reset();
                    }
                }
            }

            _ = resubscribe_interval.tick(), if subscription.is_none() => {
                match tokio::time::timeout(local_config.blockchain_timeout, tracker.subscribe_to_new_configs()).await {
                    Ok(Ok(sub)) => {
                        tracing::info!("resubscribed to config changes");
                        subscription = Some(sub);
                    }
                    Ok(Err(err)) => tracing::warn!(%err, "resubscribe failed"),
                    Err(_) => tracing::warn!("resubscribe timed out"),
                }
            }
        }
    }
}

/// Runs one check cycle. Returns `true` if a change was seen but is still
/// within its confirmation window (the caller should re-poll sooner).
async fn check<T: ContractConfigTracker>(
    tracker: &T,
    local_config: &LocalConfig,
    current_digest: &mut ConfigDigest,
    tx: &mpsc::Sender<ContractConfig>,
    cancel: &CancellationToken,
) -> bool {
    metrics::CONFIG_TRACKER_POLLS_TOTAL.inc();

    let timeout = local_config.blockchain_timeout;
    let height = tokio::time::timeout(timeout, tracker.latest_block_height()).await;
    let details = tokio::time::timeout(timeout, tracker.latest_config_details()).await;

    let (height, details) = match (height, details) {
        (Ok(Ok(height)), Ok(Ok(details))) => (height, details),
        _ => {
            tracing::warn!("failed to read latest block height or config details, will retry");
            return false;
        }
    };

    if details.config_digest.is_zero() || details.config_digest == *current_digest {
        return false;
    }

    let confirmations = local_config.contract_config_confirmations;
    if !local_config.skip_contract_config_confirmations
        && confirmations > 0
        && height < details.changed_in_block + confirmations - 1
    {
        metrics::CONFIG_TRACKER_AWAITING_CONFIRMATION_TOTAL.inc();
        tracing::debug!(
            height,
            changed_in_block = details.changed_in_block,
            confirmations,
            "config change not yet confirmed"
        );
        return true;
    }

    let contract_config = match tokio::time::timeout(timeout, tracker.config_from_logs(details.changed_in_block)).await {
        Ok(Ok(cc)) => cc,
        Ok(Err(err)) => {
            tracing::warn!(%err, "config_from_logs failed");
            return false;
        }
        Err(_) => {
            tracing::warn!("config_from_logs timed out");
            return false;
        }
    };

    if contract_config.encoded_config_version != ocr_codec::ENCODED_CONFIG_VERSION {
        tracing::error!(
            version = contract_config.encoded_config_version,
            "dropping config with unsupported encoded_config_version"
        );
        return false;
    }

    *current_digest = contract_config.config_digest;
    metrics::CONFIG_TRACKER_LAST_DIGEST_CHANGE_TIMESTAMP_SECONDS.set(unix_timestamp_secs());

    tokio::select! {
        biased;
        () = cancel.cancelled() => {}
        result = tx.send(contract_config) => {
            if result.is_err() {
                tracing::warn!("ConfigTracker output channel closed, dropping emission");
            }
        }
    }

    false
}

#[allow(clippy::cast_possible_wrap)]
fn unix_timestamp_secs() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// A no-op [`ConfigSubscription`] for collaborators with no push channel.
pub struct NeverSubscription;

#[async_trait::async_trait]
impl ConfigSubscription for NeverSubscription {
    async fn next_hint(&mut self) -> Option<()> {
        std::future::pending().await
    }
}

#[cfg(test)]
mod tests {
    use super::{spawn, ConfigSubscription};
    use crate::traits::{ContractConfigTracker, LatestConfigDetails};
    use ocr_types::{ConfigDigest, ContractConfig, LocalConfig};
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    struct NoHintSubscription;

    #[async_trait::async_trait]
    impl ConfigSubscription for NoHintSubscription {
        async fn next_hint(&mut self) -> Option<()> {
            std::future::pending().await
        }
    }

    struct FakeTracker {
        digest: ConfigDigest,
        changed_in_block: u64,
        height: AtomicU64,
    }

    #[async_trait::async_trait]
    impl ContractConfigTracker for FakeTracker {
        type Subscription = NoHintSubscription;

        async fn latest_block_height(&self) -> anyhow::Result<u64> {
            Ok(self.height.load(Ordering::SeqCst))
        }

        async fn latest_config_details(&self) -> anyhow::Result<LatestConfigDetails> {
            Ok(LatestConfigDetails {
                changed_in_block: self.changed_in_block,
                config_digest: self.digest,
            })
        }

        async fn config_from_logs(&self, _changed_in_block: u64) -> anyhow::Result<ContractConfig> {
            Ok(ContractConfig {
                config_digest: self.digest,
                signers: vec![],
                transmitters: vec![],
                threshold: 1,
                encoded_config_version: 1,
                encoded_config: vec![],
            })
        }

        async fn subscribe_to_new_configs(&self) -> anyhow::Result<Self::Subscription> {
            Ok(NoHintSubscription)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn emits_confirmed_config_change() {
        let tracker = Arc::new(FakeTracker {
            digest: ConfigDigest::from([7u8; 16]),
            changed_in_block: 10,
            height: AtomicU64::new(20),
        });
        let mut local_config = LocalConfig::default();
        local_config.contract_config_tracker_poll_interval = Duration::from_millis(10);
        local_config.contract_config_confirmations = 1;

        let cancel = CancellationToken::new();
        let mut rx = spawn(tracker, local_config, ConfigDigest::ZERO, cancel.clone());

        let emitted = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(emitted.config_digest, ConfigDigest::from([7u8; 16]));
        cancel.cancel();
    }

    struct BadVersionTracker {
        digest: ConfigDigest,
    }

    #[async_trait::async_trait]
    impl ContractConfigTracker for BadVersionTracker {
        type Subscription = NoHintSubscription;

        async fn latest_block_height(&self) -> anyhow::Result<u64> {
            Ok(20)
        }

        async fn latest_config_details(&self) -> anyhow::Result<LatestConfigDetails> {
            Ok(LatestConfigDetails {
                changed_in_block: 10,
                config_digest: self.digest,
            })
        }

        async fn config_from_logs(&self, _changed_in_block: u64) -> anyhow::Result<ContractConfig> {
            Ok(ContractConfig {
                config_digest: self.digest,
                signers: vec![],
                transmitters: vec![],
                threshold: 1,
                encoded_config_version: 2,
                encoded_config: vec![],
            })
        }

        async fn subscribe_to_new_configs(&self) -> anyhow::Result<Self::Subscription> {
            Ok(NoHintSubscription)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn drops_unsupported_config_version_before_emission() {
        let tracker = Arc::new(BadVersionTracker {
            digest: ConfigDigest::from([4u8; 16]),
        });
        let mut local_config = LocalConfig::default();
        local_config.contract_config_tracker_poll_interval = Duration::from_millis(10);
        local_config.contract_config_confirmations = 1;

        let cancel = CancellationToken::new();
        let mut rx = spawn(tracker, local_config, ConfigDigest::ZERO, cancel.clone());

        let result = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await;
        assert!(result.is_err(), "a config with an unsupported version must never be emitted");
        cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn never_reemits_the_same_digest() {
        let tracker = Arc::new(FakeTracker {
            digest: ConfigDigest::from([1u8; 16]),
            changed_in_block: 10,
            height: AtomicU64::new(20),
        });
        let mut local_config = LocalConfig::default();
        local_config.contract_config_tracker_poll_interval = Duration::from_millis(10);

        let cancel = CancellationToken::new();
        let mut rx = spawn(tracker, local_config, ConfigDigest::from([1u8; 16]), cancel.clone());

        let result = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await;
        assert!(result.is_err(), "no emission expected for an already-current digest");
        cancel.cancel();
    }
}
