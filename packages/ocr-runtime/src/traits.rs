//! The external collaborators the supervisor is built against. Each is a
//! thin async trait so the rest of the crate can be exercised against fakes
//! without a real database, chain client, P2P stack, or BFT engine.

use alloy_primitives::Address;
use ocr_types::{ConfigDigest, ContractConfig};

/// Persists and restores the node's view of the current `ContractConfig`,
/// plus the pending-transmission bookkeeping the [`crate::gc::GarbageCollector`]
/// prunes.
#[async_trait::async_trait]
pub trait Database: Send + Sync + 'static {
    /// Restores the last-known `ContractConfig`, if any.
    async fn read_config(&self) -> anyhow::Result<Option<ContractConfig>>;

    /// Best-effort persistence of a newly adopted `ContractConfig`.
    async fn write_config(&self, config: &ContractConfig) -> anyhow::Result<()>;

    /// Deletes pending-transmission records older than `older_than`
    /// (a Unix timestamp in seconds).
    async fn delete_pending_transmissions_older_than(&self, older_than: u64) -> anyhow::Result<()>;
}

/// The digest and block height of the most recently changed on-chain config.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LatestConfigDetails {
    /// The block the config last changed in.
    pub changed_in_block: u64,
    /// The digest of the config as of that change.
    pub config_digest: ConfigDigest,
}

/// A live subscription to on-chain config-change hints.
#[async_trait::async_trait]
pub trait ConfigSubscription: Send + 'static {
    /// Awaits the next hint that the config may have changed. Returns `None`
    /// once the subscription is closed.
    async fn next_hint(&mut self) -> Option<()>;
}

/// Chain-read collaborator for [`crate::tracker::ConfigTracker`].
#[async_trait::async_trait]
pub trait ContractConfigTracker: Send + Sync + 'static {
    /// The subscription type returned by [`Self::subscribe_to_new_configs`].
    type Subscription: ConfigSubscription;

    /// The chain's current block height.
    async fn latest_block_height(&self) -> anyhow::Result<u64>;

    /// The block and digest of the most recent on-chain config change.
    async fn latest_config_details(&self) -> anyhow::Result<LatestConfigDetails>;

    /// Fetches the full `ContractConfig` that changed at `changed_in_block`.
    async fn config_from_logs(&self, changed_in_block: u64) -> anyhow::Result<ContractConfig>;

    /// Subscribes to push hints of future config changes.
    async fn subscribe_to_new_configs(&self) -> anyhow::Result<Self::Subscription>;
}

/// Identity surface of the inner protocol's transmitter, observed by the
/// supervisor only for bookkeeping.
pub trait ContractTransmitter: Send + Sync + 'static {
    /// The chain ID this transmitter submits to.
    fn chain_id(&self) -> u64;
    /// The address this transmitter submits from.
    fn from_address(&self) -> Address;
}

/// A peer-discovery-only endpoint, serving the BFT protocol's bootstrap role.
#[async_trait::async_trait]
pub trait Bootstrapper: Send + 'static {
    /// Starts serving peer discovery under `config_digest`.
    async fn start(&mut self) -> anyhow::Result<()>;
    /// Stops serving peer discovery.
    async fn close(&mut self) -> anyhow::Result<()>;
}

/// Constructs a [`Bootstrapper`] for a bootstrap-only node. The
/// non-bootstrap analogue is [`BinaryNetworkEndpointFactory`].
#[async_trait::async_trait]
pub trait BootstrapperFactory: Send + Sync + 'static {
    /// The bootstrapper type this factory produces.
    type Bootstrapper: Bootstrapper;

    /// Builds a not-yet-started bootstrapper for `config_digest`.
    async fn new_bootstrapper(
        &self,
        config_digest: ConfigDigest,
        peer_ids: &[String],
        bootstrappers: &[String],
        f: u8,
    ) -> anyhow::Result<Self::Bootstrapper>;
}

/// A live, started network endpoint (the handle returned by
/// [`BinaryNetworkEndpointFactory::new_endpoint`]).
#[async_trait::async_trait]
pub trait NetworkEndpoint: Send + 'static {
    /// Closes the endpoint, releasing its transport resources.
    async fn close(&mut self) -> anyhow::Result<()>;
}

/// Constructs the inner protocol's network endpoint for a given session.
#[async_trait::async_trait]
pub trait BinaryNetworkEndpointFactory: Send + Sync + 'static {
    /// The endpoint type this factory produces.
    type Endpoint: NetworkEndpoint;

    /// Builds and returns a not-yet-started endpoint for `config_digest`,
    /// rate-limited per the token-bucket parameters computed in
    /// [`crate::supervisor`] from the session's timing parameters.
    async fn new_endpoint(
        &self,
        config_digest: ConfigDigest,
        peer_ids: &[String],
        bootstrappers: &[String],
        f: u8,
        token_bucket_refill_rate: f64,
        token_bucket_size: u32,
    ) -> anyhow::Result<Self::Endpoint>;
}

/// Runs the inner BFT protocol for one session, scoped to a cancellation
/// token supplied at spawn time.
///
/// The endpoint is shared with the supervisor (which retains its own handle
/// to close it during teardown), so it is passed by shared handle rather
/// than by value.
#[async_trait::async_trait]
pub trait RunOracle: Send + Sync + 'static {
    /// The network endpoint type this runner drives.
    type Endpoint: NetworkEndpoint;

    /// Runs until `cancel` fires. Must return promptly afterward.
    async fn run(
        &self,
        shared_config: ocr_types::SharedConfig,
        oracle_id: ocr_types::OracleId,
        endpoint: std::sync::Arc<tokio::sync::Mutex<Self::Endpoint>>,
        cancel: tokio_util::sync::CancellationToken,
    ) -> anyhow::Result<()>;
}
