//! `EthConfigTracker`: an `ocr_runtime::traits::ContractConfigTracker`
//! implementation reading an EVM configurator contract via `alloy` — a thin
//! wrapper around a generated contract binding plus
//! `provider.get_logs`/`get_block_number`.

use alloy::primitives::Address;
use alloy::providers::Provider;
use alloy::rpc::types::Filter;
use alloy::sol_types::SolEvent;
use anyhow::{anyhow, Context, Result};
use ocr_runtime::traits::{ContractConfigTracker, LatestConfigDetails};
use ocr_runtime::tracker::NeverSubscription;
use ocr_types::{ConfigDigest, ContractConfig};

alloy::sol! {
    #[sol(rpc)]
    interface IConfigurator {
        function latestConfigDetails() external view returns (uint64 configCount, uint64 blockNumber, bytes16 configDigest);

        event ConfigSet(
            uint64 previousConfigBlockNumber,
            bytes16 configDigest,
            uint64 configCount,
            address[] signers,
            address[] transmitters,
            uint8 threshold,
            uint64 encodedConfigVersion,
            bytes encodedConfig
        );
    }
}

/// Reads `ContractConfig` updates from an on-chain `IConfigurator`-shaped
/// contract over JSON-RPC.
pub struct EthConfigTracker<P: Provider + Clone> {
    address: Address,
    provider: P,
}

impl<P: Provider + Clone> EthConfigTracker<P> {
    /// Wraps `provider` to track the configurator contract at `address`.
    pub const fn new(address: Address, provider: P) -> Self {
        Self { address, provider }
    }

    const fn contract(&self) -> IConfigurator::IConfiguratorInstance<&P> {
        IConfigurator::IConfiguratorInstance::new(self.address, &self.provider)
    }
}

#[async_trait::async_trait]
impl<P: Provider + Clone + Send + Sync + 'static> ContractConfigTracker for EthConfigTracker<P> {
    type Subscription = NeverSubscription;

    async fn latest_block_height(&self) -> Result<u64> {
        Ok(self.provider.get_block_number().await?)
    }

    async fn latest_config_details(&self) -> Result<LatestConfigDetails> {
        let result = self.contract().latestConfigDetails().call().await?;
        Ok(LatestConfigDetails {
            changed_in_block: result.blockNumber,
            config_digest: ConfigDigest::from(result.configDigest.0),
        })
    }

    async fn config_from_logs(&self, changed_in_block: u64) -> Result<ContractConfig> {
        let filter = Filter::new()
            .address(self.address)
            .event_signature(IConfigurator::ConfigSet::SIGNATURE_HASH)
            .from_block(changed_in_block)
            .to_block(changed_in_block);

        let log = self
            .provider
            .get_logs(&filter)
            .await?
            .into_iter()
            .find_map(|log| IConfigurator::ConfigSet::decode_log(&log.inner, true).ok())
            .ok_or_else(|| anyhow!("no ConfigSet log found at block {changed_in_block}"))
            .context("config_from_logs")?;

        Ok(ContractConfig {
            config_digest: ConfigDigest::from(log.data.configDigest.0),
            signers: log.data.signers,
            transmitters: log.data.transmitters,
            threshold: log.data.threshold,
            encoded_config_version: log.data.encodedConfigVersion,
            encoded_config: log.data.encodedConfig.to_vec(),
        })
    }

    async fn subscribe_to_new_configs(&self) -> Result<Self::Subscription> {
        Ok(NeverSubscription)
    }
}
