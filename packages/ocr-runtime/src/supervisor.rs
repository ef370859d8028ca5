//! `ManagedOracleSupervisor`: the outer event loop owning the inner protocol's
//! lifecycle.

use std::sync::Arc;
use std::time::Duration;

use ocr_types::{ConfigDigest, ContractConfig, LocalConfig, NodeIdentity};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::metrics;
use crate::resolver;
use crate::telemetry::{MonitoringEndpoint, TelemetryEvent};
use crate::traits::{BinaryNetworkEndpointFactory, ContractConfigTracker, Database, NetworkEndpoint, RunOracle};

/// Rate-limit capacity handed to every new network endpoint.
const TOKEN_BUCKET_SIZE: u32 = 16;

/// Computes the token-bucket refill rate, in tokens per second, from the
/// session's pacemaker timings.
fn token_bucket_refill_rate(delta_resend: Duration, delta_progress: Duration, delta_round: Duration) -> f64 {
    2.0 * (1.0 / delta_resend.as_secs_f64() + 1.0 / delta_progress.as_secs_f64() + 6.0 / delta_round.as_secs_f64())
}

/// A per-session handle kept alive while the inner protocol subtree runs.
struct InnerSession<E: NetworkEndpoint> {
    cancel: CancellationToken,
    tasks: JoinSet<anyhow::Result<()>>,
    endpoint: Arc<Mutex<E>>,
}

/// The managed oracle supervisor: owns the config tracker, garbage
/// collector, and telemetry forwarder as long-lived siblings, and spawns or
/// tears down the inner protocol subtree as configs change.
pub struct ManagedOracleSupervisor<D, T, F, R>
where
    D: Database,
    T: ContractConfigTracker,
    F: BinaryNetworkEndpointFactory,
    R: RunOracle<Endpoint = F::Endpoint>,
{
    database: Arc<D>,
    tracker: Arc<T>,
    endpoint_factory: Arc<F>,
    runner: Arc<R>,
    monitoring_endpoint: Option<Arc<dyn MonitoringEndpoint>>,
    local_config: LocalConfig,
    node_identity: NodeIdentity,
    private_key: [u8; 32],
    root_cancel: CancellationToken,
    inner: Option<InnerSession<F::Endpoint>>,
    siblings: JoinSet<()>,
    config_rx: Option<mpsc::Receiver<ContractConfig>>,
    telemetry_tx: mpsc::Sender<TelemetryEvent>,
    telemetry_rx: Option<mpsc::Receiver<TelemetryEvent>>,
}

impl<D, T, F, R> ManagedOracleSupervisor<D, T, F, R>
where
    D: Database,
    T: ContractConfigTracker,
    F: BinaryNetworkEndpointFactory,
    R: RunOracle<Endpoint = F::Endpoint>,
{
    /// Builds a new supervisor. Does not start anything; call [`Self::run`]
    /// to execute the boot sequence and main loop.
    pub fn new(
        database: Arc<D>,
        tracker: Arc<T>,
        endpoint_factory: Arc<F>,
        runner: Arc<R>,
        monitoring_endpoint: Option<Arc<dyn MonitoringEndpoint>>,
        local_config: LocalConfig,
        node_identity: NodeIdentity,
        private_key: [u8; 32],
    ) -> Self {
        let (telemetry_tx, telemetry_rx) = crate::telemetry::channel::<TelemetryEvent>();
        Self {
            database,
            tracker,
            endpoint_factory,
            runner,
            monitoring_endpoint,
            local_config,
            node_identity,
            private_key,
            root_cancel: CancellationToken::new(),
            inner: None,
            siblings: JoinSet::new(),
            config_rx: None,
            telemetry_tx,
            telemetry_rx: Some(telemetry_rx),
        }
    }

    /// A token that, when cancelled, shuts the supervisor down.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.root_cancel.clone()
    }

    /// The sender half of the telemetry channel, handed to the inner
    /// protocol so it can emit best-effort telemetry.
    #[must_use]
    pub fn telemetry_sender(&self) -> mpsc::Sender<TelemetryEvent> {
        self.telemetry_tx.clone()
    }

    /// Runs the boot sequence and then the main loop until the
    /// root token is cancelled, at which point every child task has been
    /// awaited and the method returns.
    pub async fn run(mut self) {
        self.boot().await;

        loop {
            let next_config = async {
                match self.config_rx.as_mut() {
                    Some(rx) => rx.recv().await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                biased;
                () = self.root_cancel.cancelled() => {
                    self.close_inner().await;
                    self.siblings.shutdown().await;
                    tracing::info!("supervisor shut down");
                    return;
                }
                maybe_config = next_config => {
                    match maybe_config {
                        Some(cc) => self.apply_config_change(cc, true).await,
                        None => {
                            tracing::warn!("ConfigTracker output channel closed unexpectedly");
                            self.config_rx = None;
                        }
                    }
                }
            }
        }
    }

    async fn boot(&mut self) {
        let gc_token = self.root_cancel.child_token();
        let gc_database = self.database.clone();
        let database_timeout = self.local_config.database_timeout;
        self.siblings
            .spawn(async move { crate::gc::run(gc_database, database_timeout, gc_token).await });

        let telemetry_token = self.root_cancel.child_token();
        let telemetry_rx = self.telemetry_rx.take().expect("telemetry receiver taken once at boot");
        let monitoring_endpoint = self.monitoring_endpoint.clone();
        self.siblings
            .spawn(async move { crate::telemetry::run(telemetry_rx, monitoring_endpoint, telemetry_token).await });

        let restored = match tokio::time::timeout(self.local_config.database_timeout, self.database.read_config()).await {
            Ok(Ok(config)) => config,
            Ok(Err(err)) => {
                tracing::warn!(%err, "failed to restore config from database, proceeding with none");
                None
            }
            Err(_) => {
                tracing::warn!("database read_config timed out, proceeding with none");
                None
            }
        };

        let seed_digest = if let Some(cc) = restored {
            tracing::info!(digest = %cc.config_digest, "restored cached config, treating as configChanged");
            let digest = cc.config_digest;
            // `persist = false`: this config came from the database already;
            // writing it straight back would be a pointless round-trip on
            // every boot against an unreachable chain.
            self.apply_config_change(cc, false).await;
            digest
        } else {
            ConfigDigest::ZERO
        };

        let tracker_token = self.root_cancel.child_token();
        self.config_rx = Some(crate::tracker::spawn(
            self.tracker.clone(),
            self.local_config.clone(),
            seed_digest,
            tracker_token,
        ));
    }

    /// Idempotent: cancels the inner subtree (if any), awaits it, and closes
    /// the network endpoint.
    async fn close_inner(&mut self) {
        let Some(mut session) = self.inner.take() else {
            return;
        };
        session.cancel.cancel();
        while let Some(result) = session.tasks.join_next().await {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(err)) => tracing::warn!(%err, "inner protocol task returned an error"),
                Err(join_err) if join_err.is_panic() => {
                    tracing::error!("inner protocol task panicked");
                }
                Err(join_err) => tracing::warn!(%join_err, "inner protocol task was cancelled"),
            }
        }
        let mut endpoint = session.endpoint.lock().await;
        if let Err(err) = endpoint.close().await {
            tracing::warn!(%err, "failed to close network endpoint");
        }
    }

    /// Applies a newly observed config change. `persist` gates the final
    /// `Database::write_config` call: `false` for the boot-time restore path
    /// (the config already came from the database), `true`
    /// for every config the tracker emits thereafter.
    async fn apply_config_change(&mut self, contract_config: ContractConfig, persist: bool) {
        self.close_inner().await;

        let (shared_config, oracle_id) = match resolver::resolve_config(&contract_config, &self.node_identity, &self.private_key) {
            Ok(resolved) => resolved,
            Err(err) => {
                tracing::error!(%err, "failed to resolve config, supervisor remains cold");
                return;
            }
        };

        let peer_ids: Vec<String> = shared_config
            .public_config
            .oracle_identities
            .iter()
            .map(|identity| identity.peer_id.clone())
            .collect();
        let threshold = contract_config.threshold;

        let refill_rate = token_bucket_refill_rate(
            shared_config.public_config.delta_resend,
            shared_config.public_config.delta_progress,
            shared_config.public_config.delta_round,
        );

        let endpoint = match self
            .endpoint_factory
            .new_endpoint(
                shared_config.config_digest(),
                &peer_ids,
                &[],
                threshold,
                refill_rate,
                TOKEN_BUCKET_SIZE,
            )
            .await
        {
            Ok(endpoint) => endpoint,
            Err(err) => {
                tracing::error!(%err, "failed to construct network endpoint, supervisor remains cold");
                return;
            }
        };

        let endpoint = Arc::new(Mutex::new(endpoint));
        let session_cancel = self.root_cancel.child_token();
        let mut tasks = JoinSet::new();

        let runner = self.runner.clone();
        let run_endpoint = endpoint.clone();
        let run_cancel = session_cancel.clone();
        tasks.spawn(async move { runner.run(shared_config, oracle_id, run_endpoint, run_cancel).await });

        self.inner = Some(InnerSession {
            cancel: session_cancel,
            tasks,
            endpoint,
        });
        metrics::SUPERVISOR_CONFIG_CHANGES_TOTAL.inc();

        if persist {
            match tokio::time::timeout(self.local_config.database_timeout, self.database.write_config(&contract_config)).await {
                Ok(Err(err)) => tracing::warn!(%err, "write_config failed"),
                Err(_) => tracing::warn!("write_config timed out"),
                Ok(Ok(())) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::token_bucket_refill_rate;
    use std::time::Duration;

    #[test]
    fn token_bucket_refill_rate_matches_formula() {
        let rate = token_bucket_refill_rate(Duration::from_secs(5), Duration::from_secs(2), Duration::from_millis(2_500));
        let expected = 2.0 * (1.0 / 5.0 + 1.0 / 2.0 + 6.0 / 2.5);
        assert!((rate - expected).abs() < 1e-9);
    }
}
