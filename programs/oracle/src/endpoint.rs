//! Placeholder `BinaryNetworkEndpointFactory`/`NetworkEndpoint` and
//! `RunOracle` implementations.
//!
//! The P2P transport and the inner BFT protocol are external collaborators:
//! this binary does not ship either. What follows is the
//! simplest implementation that satisfies `ocr_runtime::traits` so the
//! supervisor's lifecycle can actually be exercised end-to-end — it opens no
//! sockets and runs no consensus, it only logs the session parameters it was
//! handed and waits for cancellation. A deployment wires real
//! implementations of these two traits in its place.

use ocr_runtime::traits::{BinaryNetworkEndpointFactory, Bootstrapper, BootstrapperFactory, NetworkEndpoint, RunOracle};
use ocr_types::{ConfigDigest, OracleId, SharedConfig};
use tokio_util::sync::CancellationToken;

/// A network endpoint that does nothing.
pub struct NullEndpoint;

#[async_trait::async_trait]
impl NetworkEndpoint for NullEndpoint {
    async fn close(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Constructs [`NullEndpoint`]s, logging the parameters a real P2P transport
/// would be configured with.
pub struct NullEndpointFactory;

#[async_trait::async_trait]
impl BinaryNetworkEndpointFactory for NullEndpointFactory {
    type Endpoint = NullEndpoint;

    async fn new_endpoint(
        &self,
        config_digest: ConfigDigest,
        peer_ids: &[String],
        bootstrappers: &[String],
        f: u8,
        token_bucket_refill_rate: f64,
        token_bucket_size: u32,
    ) -> anyhow::Result<Self::Endpoint> {
        tracing::info!(
            %config_digest,
            peers = peer_ids.len(),
            bootstrappers = bootstrappers.len(),
            f,
            token_bucket_refill_rate,
            token_bucket_size,
            "constructing network endpoint (no-op transport)"
        );
        Ok(NullEndpoint)
    }
}

/// A `RunOracle` that idles until cancelled, standing in for the BFT
/// pacemaker/report-generation/transmission protocol.
pub struct IdleRunner;

#[async_trait::async_trait]
impl RunOracle for IdleRunner {
    type Endpoint = NullEndpoint;

    async fn run(
        &self,
        shared_config: SharedConfig,
        oracle_id: OracleId,
        _endpoint: std::sync::Arc<tokio::sync::Mutex<Self::Endpoint>>,
        cancel: CancellationToken,
    ) -> anyhow::Result<()> {
        tracing::info!(
            digest = %shared_config.config_digest(),
            %oracle_id,
            n = shared_config.public_config.n(),
            "inner protocol session started (no-op runner)"
        );
        cancel.cancelled().await;
        tracing::info!(%oracle_id, "inner protocol session stopped");
        Ok(())
    }
}

/// A peer-discovery bootstrapper that does nothing, standing in for a real
/// P2P transport's bootstrap role.
pub struct NullBootstrapper;

#[async_trait::async_trait]
impl Bootstrapper for NullBootstrapper {
    async fn start(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
    async fn close(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Constructs [`NullBootstrapper`]s, logging the parameters a real P2P
/// transport's bootstrap role would be configured with.
pub struct NullBootstrapperFactory;

#[async_trait::async_trait]
impl BootstrapperFactory for NullBootstrapperFactory {
    type Bootstrapper = NullBootstrapper;

    async fn new_bootstrapper(
        &self,
        config_digest: ConfigDigest,
        peer_ids: &[String],
        bootstrappers: &[String],
        f: u8,
    ) -> anyhow::Result<Self::Bootstrapper> {
        tracing::info!(
            %config_digest,
            peers = peer_ids.len(),
            bootstrappers = bootstrappers.len(),
            f,
            "constructing bootstrapper (no-op transport)"
        );
        Ok(NullBootstrapper)
    }
}
