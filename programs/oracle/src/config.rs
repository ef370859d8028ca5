//! Top-level configuration for the `oracle` binary: the JSON document loaded
//! at startup and validated before the supervisor boots.

use std::path::PathBuf;
use std::str::FromStr;

use alloy_primitives::Address;
use ocr_types::{LocalConfig, NodeIdentity};
use tracing::Level;

/// The on-disk configuration document passed to `oracle start --config`.
#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
pub struct OracleBinaryConfig {
    /// This node's identity and keys.
    pub node: NodeConfig,
    /// The address of the on-chain configurator contract this node tracks.
    pub contract_address: Address,
    /// JSON-RPC HTTP endpoint for the chain hosting the configurator contract.
    pub chain_rpc_url: String,
    /// Path to the JSON file backing the node's `Database`.
    pub database_path: PathBuf,
    /// Socket address the Prometheus `/metrics` endpoint binds to.
    #[serde(default = "default_metrics_addr")]
    pub metrics_addr: std::net::SocketAddr,
    /// The supervisor's local environment configuration.
    #[serde(default)]
    pub local: LocalConfig,
    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

fn default_metrics_addr() -> std::net::SocketAddr {
    ([0, 0, 0, 0], 9000).into()
}

/// This node's identity and private keys, as loaded from the config file.
///
/// Keys are hex strings on disk; [`NodeConfig::identity`] and
/// [`NodeConfig::private_key`] parse them into the fixed-size arrays the rest
/// of the crate expects.
#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
pub struct NodeConfig {
    /// This node's on-chain signing address.
    pub on_chain_signing_address: Address,
    /// This node's on-chain transmit address.
    pub transmit_address: Address,
    /// This node's peer-to-peer transport identity string.
    pub peer_id: String,
    /// Hex-encoded X25519 public key, 32 bytes.
    pub offchain_public_key_hex: String,
    /// Hex-encoded X25519 private key, 32 bytes. Sensitive; never logged.
    pub offchain_private_key_hex: String,
}

/// Errors parsing a [`NodeConfig`]'s hex-encoded key material.
#[derive(Debug, thiserror::Error)]
pub enum NodeConfigError {
    /// A hex field did not decode to the expected byte length.
    #[error("{field} must decode to {expected} bytes")]
    WrongLength {
        /// The offending field's name.
        field: &'static str,
        /// The expected byte length.
        expected: usize,
    },
    /// A hex field was not valid hex.
    #[error("invalid hex in {field}: {source}")]
    InvalidHex {
        /// The offending field's name.
        field: &'static str,
        /// The underlying decode error.
        #[source]
        source: hex::FromHexError,
    },
}

fn decode_fixed<const N: usize>(field: &'static str, hex_str: &str) -> Result<[u8; N], NodeConfigError> {
    let bytes = hex::decode(hex_str.trim_start_matches("0x")).map_err(|source| NodeConfigError::InvalidHex { field, source })?;
    <[u8; N]>::try_from(bytes.as_slice()).map_err(|_| NodeConfigError::WrongLength { field, expected: N })
}

impl NodeConfig {
    /// Parses this node's [`NodeIdentity`], used by the config resolver to
    /// find this node among `PublicConfig::oracle_identities`.
    ///
    /// # Errors
    /// Returns a [`NodeConfigError`] if `offchain_public_key_hex` is not
    /// valid 32-byte hex.
    pub fn identity(&self) -> Result<NodeIdentity, NodeConfigError> {
        Ok(NodeIdentity {
            on_chain_signing_address: self.on_chain_signing_address,
            offchain_public_key: decode_fixed("offchain_public_key_hex", &self.offchain_public_key_hex)?,
            peer_id: self.peer_id.clone(),
            transmit_address: self.transmit_address,
        })
    }

    /// Parses this node's X25519 private key.
    ///
    /// # Errors
    /// Returns a [`NodeConfigError`] if `offchain_private_key_hex` is not
    /// valid 32-byte hex.
    pub fn private_key(&self) -> Result<[u8; 32], NodeConfigError> {
        decode_fixed("offchain_private_key_hex", &self.offchain_private_key_hex)
    }
}

/// Observability configuration: stdout logging plus optional OpenTelemetry
/// OTLP export.
#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// The log level to use.
    pub level: String,
    /// Whether to export traces to an OTLP collector.
    pub use_otel: bool,
    /// The service name attached to exported spans.
    pub service_name: String,
    /// The OpenTelemetry collector endpoint.
    pub otel_endpoint: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            use_otel: false,
            service_name: "ocr-oracle".to_string(),
            otel_endpoint: None,
        }
    }
}

impl ObservabilityConfig {
    /// The configured log level, falling back to `INFO` if unparsable.
    #[must_use]
    pub fn level(&self) -> Level {
        Level::from_str(&self.level).unwrap_or(Level::INFO)
    }
}

impl OracleBinaryConfig {
    /// Parses and validates an [`OracleBinaryConfig`] from a JSON document.
    ///
    /// # Errors
    /// Returns an error if the document is malformed or
    /// [`LocalConfig::validate`] rejects the embedded `local` section.
    pub fn from_json(bytes: &[u8]) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_slice(bytes)?;
        config.local.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::{NodeConfig, ObservabilityConfig};

    #[test]
    fn observability_defaults_to_info() {
        assert_eq!(ObservabilityConfig::default().level(), tracing::Level::INFO);
    }

    #[test]
    fn node_config_rejects_short_keys() {
        let node = NodeConfig {
            on_chain_signing_address: alloy_primitives::Address::ZERO,
            transmit_address: alloy_primitives::Address::ZERO,
            peer_id: "self".to_string(),
            offchain_public_key_hex: "ab".to_string(),
            offchain_private_key_hex: "ab".to_string(),
        };
        assert!(node.identity().is_err());
        assert!(node.private_key().is_err());
    }

    #[test]
    fn node_config_parses_full_length_hex() {
        let hex32 = "11".repeat(32);
        let node = NodeConfig {
            on_chain_signing_address: alloy_primitives::Address::ZERO,
            transmit_address: alloy_primitives::Address::ZERO,
            peer_id: "self".to_string(),
            offchain_public_key_hex: hex32.clone(),
            offchain_private_key_hex: hex32,
        };
        assert_eq!(node.identity().unwrap().offchain_public_key, [0x11u8; 32]);
        assert_eq!(node.private_key().unwrap(), [0x11u8; 32]);
    }
}
