use std::time::Duration;

use serde::{Deserialize, Serialize};

/// String that must appear verbatim in [`LocalConfig::development_mode`] to
/// unlock chain-specific-validation skipping.
pub const ENABLE_DANGEROUS_DEVELOPMENT_MODE: &str = "enable-dangerous-development-mode";

/// This node's local environment configuration. Populated from a
/// JSON file or environment and validated once at construction time; invalid
/// values are a "fatal at boot" condition.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalConfig {
    /// Per-call bound on chain reads.
    #[serde(with = "duration_secs")]
    pub blockchain_timeout: Duration,
    /// Block-depth required before accepting a config change.
    pub contract_config_confirmations: u64,
    /// When `true`, accept a config change immediately (L2/dev).
    pub skip_contract_config_confirmations: bool,
    /// Base period for tracker polling.
    #[serde(with = "duration_secs")]
    pub contract_config_tracker_poll_interval: Duration,
    /// Retry period for resubscription.
    #[serde(with = "duration_secs")]
    pub contract_config_tracker_subscribe_interval: Duration,
    /// Inner transmit bound.
    #[serde(with = "duration_secs")]
    pub contract_transmitter_transmit_timeout: Duration,
    /// Per-call database bound.
    #[serde(with = "duration_secs")]
    pub database_timeout: Duration,
    /// Observation call bound.
    #[serde(with = "duration_secs")]
    pub data_source_timeout: Duration,
    /// Extra leeway after `data_source_timeout` before forcing continuation.
    #[serde(with = "duration_secs")]
    pub data_source_grace_period: Duration,
    /// Must equal [`ENABLE_DANGEROUS_DEVELOPMENT_MODE`] to unlock development-only behavior.
    pub development_mode: String,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            blockchain_timeout: Duration::from_secs(20),
            contract_config_confirmations: 1,
            skip_contract_config_confirmations: false,
            contract_config_tracker_poll_interval: Duration::from_secs(15),
            contract_config_tracker_subscribe_interval: Duration::from_secs(2 * 60),
            contract_transmitter_transmit_timeout: Duration::from_secs(10),
            database_timeout: Duration::from_secs(10),
            data_source_timeout: Duration::from_secs(1),
            data_source_grace_period: Duration::from_millis(500),
            development_mode: String::new(),
        }
    }
}

/// Errors raised validating a [`LocalConfig`] at construction time.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LocalConfigError {
    /// A timeout field was zero.
    #[error("{field} must be greater than zero")]
    ZeroTimeout {
        /// The offending field's name.
        field: &'static str,
    },
    /// `contract_config_confirmations` was implausibly large.
    #[error("contract_config_confirmations too large: {0}")]
    ConfirmationsTooLarge(u64),
}

/// Confirmation depths above this are almost certainly a misconfiguration
/// (e.g. a units mix-up between blocks and seconds) rather than an intentional
/// deep-finality requirement.
const MAX_PLAUSIBLE_CONFIRMATIONS: u64 = 100_000;

impl LocalConfig {
    /// Validates the fields that must hold for the oracle to be constructible
    /// at all.
    ///
    /// # Errors
    /// Returns the first violated [`LocalConfigError`].
    pub fn validate(&self) -> Result<(), LocalConfigError> {
        for (field, value) in [
            ("blockchain_timeout", self.blockchain_timeout),
            (
                "contract_config_tracker_poll_interval",
                self.contract_config_tracker_poll_interval,
            ),
            (
                "contract_config_tracker_subscribe_interval",
                self.contract_config_tracker_subscribe_interval,
            ),
            ("database_timeout", self.database_timeout),
        ] {
            if value.is_zero() {
                return Err(LocalConfigError::ZeroTimeout { field });
            }
        }
        if self.contract_config_confirmations > MAX_PLAUSIBLE_CONFIRMATIONS {
            return Err(LocalConfigError::ConfirmationsTooLarge(
                self.contract_config_confirmations,
            ));
        }
        Ok(())
    }

    /// `true` if `development_mode` unlocks chain-specific-check skipping.
    #[must_use]
    pub fn is_development_mode(&self) -> bool {
        self.development_mode == ENABLE_DANGEROUS_DEVELOPMENT_MODE
    }

    /// Parses a `LocalConfig` from a JSON document and validates it.
    ///
    /// # Errors
    /// Returns a [`serde_json::Error`] on malformed JSON, or a
    /// [`LocalConfigError`] if the parsed value fails [`Self::validate`].
    pub fn from_json(bytes: &[u8]) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_slice(bytes)?;
        config.validate()?;
        Ok(config)
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Ok(Duration::from_secs_f64(secs))
    }
}
