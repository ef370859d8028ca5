use std::sync::Arc;

use alloy::providers::ProviderBuilder;
use clap::Parser;
use oracle::chain::EthConfigTracker;
use oracle::cli::{Commands, OracleCli, StartArgs};
use oracle::config::OracleBinaryConfig;
use oracle::database::FileDatabase;
use oracle::endpoint::{IdleRunner, NullBootstrapperFactory, NullEndpointFactory};
use oracle::observability::init_observability;
use ocr_runtime::{ManagedBootstrapSupervisor, Oracle};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = OracleCli::parse();
    match cli.command {
        Commands::Start(args) => {
            let config_bytes = std::fs::read(&args.config)?;
            let config = OracleBinaryConfig::from_json(&config_bytes)?;

            let _guard = init_observability(&config.observability)?;
            info!(
                level = %config.observability.level(),
                "observability initialized"
            );

            let node_identity = config.node.identity()?;
            let private_key = config.node.private_key()?;

            let database = FileDatabase::open(config.database_path.clone())?;

            let provider = ProviderBuilder::new().connect_http(config.chain_rpc_url.parse()?);
            let tracker = Arc::new(EthConfigTracker::new(config.contract_address, provider));

            let metrics_addr = config.metrics_addr;
            tokio::spawn(oracle::metrics::serve(metrics_addr));

            let mut node = Oracle::new(
                database,
                tracker,
                Arc::new(NullEndpointFactory),
                Arc::new(IdleRunner),
                None,
                config.local.clone(),
                node_identity,
                private_key,
            );

            node.start().map_err(anyhow::Error::from)?;
            info!("oracle started, waiting for shutdown signal");

            tokio::signal::ctrl_c().await?;
            info!("shutdown signal received, closing oracle");
            node.close().await.map_err(anyhow::Error::from)?;

            Ok(())
        }
        Commands::Bootstrap(args) => run_bootstrap(args).await,
    }
}

async fn run_bootstrap(args: StartArgs) -> anyhow::Result<()> {
    let config_bytes = std::fs::read(&args.config)?;
    let config = OracleBinaryConfig::from_json(&config_bytes)?;

    let _guard = init_observability(&config.observability)?;
    info!(level = %config.observability.level(), "observability initialized");

    let database = FileDatabase::open(config.database_path.clone())?;

    let provider = ProviderBuilder::new().connect_http(config.chain_rpc_url.parse()?);
    let tracker = Arc::new(EthConfigTracker::new(config.contract_address, provider));

    let metrics_addr = config.metrics_addr;
    tokio::spawn(oracle::metrics::serve(metrics_addr));

    let supervisor = ManagedBootstrapSupervisor::new(database, tracker, Arc::new(NullBootstrapperFactory), config.local);
    let cancel = supervisor.cancellation_token();
    let handle = tokio::spawn(supervisor.run());
    info!("bootstrap node started, waiting for shutdown signal");

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received, closing bootstrap node");
    cancel.cancel();
    handle.await?;

    Ok(())
}
