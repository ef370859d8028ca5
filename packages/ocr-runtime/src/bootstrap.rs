//! `ManagedBootstrapSupervisor`: the bootstrap-only variant of
//! [`crate::supervisor::ManagedOracleSupervisor`].
//!
//! A bootstrap node does not sign or observe, so it never resolves a shared
//! secret and never spawns an inner protocol subtree; it only tracks the
//! on-chain config and keeps a peer-discovery [`Bootstrapper`] running under
//! the current digest. It also has no pending transmissions of its own, so
//! unlike [`crate::supervisor::ManagedOracleSupervisor`] it does not run a
//! [`crate::gc::GarbageCollector`] or [`crate::telemetry::TelemetryForwarder`]
//! sibling.

use std::sync::Arc;

use ocr_types::{ConfigDigest, ContractConfig, LocalConfig};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::resolver;
use crate::traits::{Bootstrapper, BootstrapperFactory, ContractConfigTracker, Database};

/// The bootstrap-only managed supervisor: tracks on-chain config changes and
/// keeps a single [`Bootstrapper`] running under the current digest.
pub struct ManagedBootstrapSupervisor<D, T, F>
where
    D: Database,
    T: ContractConfigTracker,
    F: BootstrapperFactory,
{
    database: Arc<D>,
    tracker: Arc<T>,
    bootstrapper_factory: Arc<F>,
    local_config: LocalConfig,
    root_cancel: CancellationToken,
    bootstrapper: Option<F::Bootstrapper>,
    config_rx: Option<mpsc::Receiver<ContractConfig>>,
}

impl<D, T, F> ManagedBootstrapSupervisor<D, T, F>
where
    D: Database,
    T: ContractConfigTracker,
    F: BootstrapperFactory,
{
    /// Builds a new bootstrap supervisor. Does not start anything; call
    /// [`Self::run`] to execute the boot sequence and main loop.
    pub fn new(database: Arc<D>, tracker: Arc<T>, bootstrapper_factory: Arc<F>, local_config: LocalConfig) -> Self {
        Self {
            database,
            tracker,
            bootstrapper_factory,
            local_config,
            root_cancel: CancellationToken::new(),
            bootstrapper: None,
            config_rx: None,
        }
    }

    /// A token that, when cancelled, shuts the supervisor down.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.root_cancel.clone()
    }

    /// Runs the boot sequence and then the main loop until the root token is
    /// cancelled.
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
                    self.close_bootstrapper().await;
                    tracing::info!("bootstrap supervisor shut down");
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

    async fn close_bootstrapper(&mut self) {
        let Some(mut bootstrapper) = self.bootstrapper.take() else {
            return;
        };
        if let Err(err) = bootstrapper.close().await {
            tracing::warn!(%err, "failed to close bootstrapper");
        }
    }

    async fn apply_config_change(&mut self, contract_config: ContractConfig, persist: bool) {
        self.close_bootstrapper().await;

        let public_config = match resolver::resolve_bootstrap_config(&contract_config) {
            Ok(public_config) => public_config,
            Err(err) => {
                tracing::error!(%err, "failed to resolve config, bootstrap supervisor remains cold");
                return;
            }
        };

        let peer_ids: Vec<String> = public_config
            .oracle_identities
            .iter()
            .map(|identity| identity.peer_id.clone())
            .collect();

        let mut bootstrapper = match self
            .bootstrapper_factory
            .new_bootstrapper(public_config.config_digest, &peer_ids, &[], contract_config.threshold)
            .await
        {
            Ok(bootstrapper) => bootstrapper,
            Err(err) => {
                tracing::error!(%err, "failed to construct bootstrapper, bootstrap supervisor remains cold");
                return;
            }
        };

        if let Err(err) = bootstrapper.start().await {
            tracing::error!(%err, "failed to start bootstrapper, bootstrap supervisor remains cold");
            return;
        }

        self.bootstrapper = Some(bootstrapper);

        if persist {
            match tokio::time::timeout(self.local_config.database_timeout, self.database.write_config(&contract_config)).await {
                Ok(Err(err)) => tracing::warn!(%err, "write_config failed"),
                Err(_) => tracing::warn!("write_config timed out"),
                Ok(Ok(())) => {}
            }
        }
    }
}
