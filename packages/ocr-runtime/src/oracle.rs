//! `Oracle`: the entry point wrapping a [`crate::supervisor::ManagedOracleSupervisor`]
//! in an at-most-once start/stop state machine.

use std::sync::Arc;

use ocr_types::{LocalConfig, NodeIdentity};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::supervisor::ManagedOracleSupervisor;
use crate::telemetry::MonitoringEndpoint;
use crate::traits::{BinaryNetworkEndpointFactory, ContractConfigTracker, Database, RunOracle};

/// Errors raised by the [`Oracle`] state machine.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum OracleError {
    /// `start()` was called more than once.
    #[error("oracle already started")]
    AlreadyStarted,
    /// `close()` was called before `start()`, or after a prior `close()`.
    ///
    /// `Close` is not idempotent: a second close is rejected rather than
    /// treated as a no-op, so a caller bug (closing twice) surfaces as an
    /// error instead of being silently absorbed.
    #[error("oracle not started")]
    NotStarted,
}

enum State<D, T, F, R>
where
    D: Database,
    T: ContractConfigTracker,
    F: BinaryNetworkEndpointFactory,
    R: RunOracle<Endpoint = F::Endpoint>,
{
    Unstarted(Box<ManagedOracleSupervisor<D, T, F, R>>),
    Started {
        cancel: CancellationToken,
        handle: JoinHandle<()>,
    },
    Closed,
}

/// Owns a [`ManagedOracleSupervisor`] through its `Unstarted → Started →
/// Closed` lifecycle.
pub struct Oracle<D, T, F, R>
where
    D: Database,
    T: ContractConfigTracker,
    F: BinaryNetworkEndpointFactory,
    R: RunOracle<Endpoint = F::Endpoint>,
{
    state: State<D, T, F, R>,
}

impl<D, T, F, R> Oracle<D, T, F, R>
where
    D: Database,
    T: ContractConfigTracker,
    F: BinaryNetworkEndpointFactory,
    R: RunOracle<Endpoint = F::Endpoint>,
{
    /// Constructs a new, unstarted oracle.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
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
        let supervisor = ManagedOracleSupervisor::new(
            database,
            tracker,
            endpoint_factory,
            runner,
            monitoring_endpoint,
            local_config,
            node_identity,
            private_key,
        );
        Self {
            state: State::Unstarted(Box::new(supervisor)),
        }
    }

    /// Starts the supervisor's boot sequence and main loop on a background
    /// task. At-most-once: a second call returns [`OracleError::AlreadyStarted`].
    ///
    /// # Errors
    /// Returns [`OracleError::AlreadyStarted`] if called more than once.
    pub fn start(&mut self) -> Result<(), OracleError> {
        let State::Unstarted(_) = &self.state else {
            return Err(OracleError::AlreadyStarted);
        };
        let State::Unstarted(supervisor) = std::mem::replace(&mut self.state, State::Closed) else {
            unreachable!("state checked above");
        };
        let cancel = supervisor.cancellation_token();
        let handle = tokio::spawn(supervisor.run());
        self.state = State::Started { cancel, handle };
        Ok(())
    }

    /// Requests shutdown and awaits the supervisor's main loop. Only valid
    /// from `Started`; not idempotent.
    ///
    /// # Errors
    /// Returns [`OracleError::NotStarted`] if the oracle was never started,
    /// or has already been closed.
    pub async fn close(&mut self) -> Result<(), OracleError> {
        let State::Started { cancel, handle } = std::mem::replace(&mut self.state, State::Closed) else {
            self.state = State::Closed;
            return Err(OracleError::NotStarted);
        };
        cancel.cancel();
        if let Err(err) = handle.await {
            if err.is_panic() {
                tracing::error!("supervisor task panicked during shutdown");
            }
        }
        Ok(())
    }
}
