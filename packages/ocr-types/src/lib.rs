#![doc = include_str!("../README.md")]
#![deny(clippy::nursery, clippy::pedantic, missing_docs)]
#![allow(clippy::module_name_repetitions)]

//! Shared data model for the managed oracle supervisor: the on-chain
//! [`ContractConfig`], the decoded [`PublicConfig`] and [`SharedConfig`],
//! oracle identities, the shared-secret wire format, and the node's local
//! environment configuration ([`LocalConfig`]).

use std::time::Duration;

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

mod digest;
mod local_config;
mod secret;

pub use digest::ConfigDigest;
pub use local_config::LocalConfig;
pub use secret::SharedSecret;

/// Maximum size, in bytes, of [`ContractConfig::encoded_config`].
pub const MAX_ENCODED_CONFIG_LEN: usize = 20_000;

/// Maximum number of entries in [`PublicConfig::s`].
pub const MAX_TRANSMISSION_SCHEDULE_LEN: usize = 1_000;

/// Maximum tolerated Byzantine oracle count.
pub const MAX_THRESHOLD: u8 = 31;

/// Errors raised when an on-chain [`ContractConfig`] or decoded [`PublicConfig`]
/// fails one of the configuration invariants.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum InvariantError {
    /// `len(signers) != len(transmitters)`, or either disagrees with the
    /// number of oracle identities or shared-secret encryptions.
    #[error(
        "mismatched oracle counts: signers={signers}, transmitters={transmitters}, identities={identities}, encryptions={encryptions}"
    )]
    MismatchedOracleCount {
        /// `len(signers)`.
        signers: usize,
        /// `len(transmitters)`.
        transmitters: usize,
        /// `len(oracle_identities)`.
        identities: usize,
        /// `len(encryptions)`.
        encryptions: usize,
    },
    /// `N > 3F` does not hold, or `F` is outside `[1, 31]`.
    #[error("invalid oracle/threshold combination: n={n}, f={f}")]
    InvalidThreshold {
        /// Number of oracles.
        n: usize,
        /// Threshold `F`.
        f: u8,
    },
    /// `len(s) > 1000`.
    #[error("transmission delay schedule too long: {0}")]
    ScheduleTooLong(usize),
    /// `encoded_config` exceeds [`MAX_ENCODED_CONFIG_LEN`].
    #[error("encoded config too large: {0} bytes")]
    EncodedConfigTooLarge(usize),
}

/// The on-chain source of truth for a session's configuration. Immutable once
/// constructed; a configuration change is represented by a new `ContractConfig`,
/// never a mutation of an existing one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractConfig {
    /// 16-byte identifier derived from the full config payload.
    pub config_digest: ConfigDigest,
    /// Ordered on-chain signing addresses.
    pub signers: Vec<Address>,
    /// Ordered on-chain transmit addresses, aligned with `signers`.
    pub transmitters: Vec<Address>,
    /// Maximum tolerated Byzantine oracle count (`F`).
    pub threshold: u8,
    /// Encoding version of `encoded_config`. Fixed at `1` for this spec.
    pub encoded_config_version: u64,
    /// Opaque blob containing the ABI-encoded session parameters.
    pub encoded_config: Vec<u8>,
}

impl ContractConfig {
    /// Checks the size invariant on `encoded_config`.
    ///
    /// # Errors
    /// Returns [`InvariantError::EncodedConfigTooLarge`] if the payload exceeds
    /// [`MAX_ENCODED_CONFIG_LEN`].
    pub fn validate_size(&self) -> Result<(), InvariantError> {
        if self.encoded_config.len() > MAX_ENCODED_CONFIG_LEN {
            return Err(InvariantError::EncodedConfigTooLarge(
                self.encoded_config.len(),
            ));
        }
        Ok(())
    }
}

/// Decoded session parameters, identical across all oracles in a configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicConfig {
    /// Minimum delay between reports absent a trigger.
    pub delta_progress: Duration,
    /// Delay before resending an unacknowledged message.
    pub delta_resend: Duration,
    /// Duration of one pacemaker round.
    pub delta_round: Duration,
    /// Grace period appended to a round before declaring it stalled.
    pub delta_grace: Duration,
    /// Observation collection window.
    pub delta_c: Duration,
    /// Duration of the epoch-change handshake stage.
    pub delta_stage: Duration,
    /// Deviation threshold, in parts per billion, that triggers an unscheduled report.
    pub alpha_ppb: u64,
    /// Rounds-per-epoch cap.
    pub r_max: u8,
    /// Transmission-delay schedule, each entry a delay rank in `[0, 255]`.
    pub s: Vec<u8>,
    /// Ordered oracle identities, aligned with `ContractConfig::signers`.
    pub oracle_identities: Vec<OracleIdentity>,
    /// Copied from the originating [`ContractConfig`].
    pub config_digest: ConfigDigest,
}

impl PublicConfig {
    /// Number of oracles (`N`) in this configuration.
    #[must_use]
    pub fn n(&self) -> usize {
        self.oracle_identities.len()
    }

    /// Validates the cross-field invariants that apply once a `PublicConfig`
    /// has been decoded alongside its originating `ContractConfig`.
    ///
    /// # Errors
    /// Returns the first violated [`InvariantError`].
    pub fn validate(
        &self,
        signers: &[Address],
        transmitters: &[Address],
        encryptions_len: usize,
        threshold: u8,
    ) -> Result<(), InvariantError> {
        let n = self.oracle_identities.len();
        if signers.len() != n || transmitters.len() != n || encryptions_len != n {
            return Err(InvariantError::MismatchedOracleCount {
                signers: signers.len(),
                transmitters: transmitters.len(),
                identities: n,
                encryptions: encryptions_len,
            });
        }
        if threshold == 0 || threshold > MAX_THRESHOLD || n <= 3 * threshold as usize {
            return Err(InvariantError::InvalidThreshold { n, f: threshold });
        }
        if self.s.len() > MAX_TRANSMISSION_SCHEDULE_LEN {
            return Err(InvariantError::ScheduleTooLong(self.s.len()));
        }
        Ok(())
    }
}

/// A single oracle's identity, as listed in a [`PublicConfig`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleIdentity {
    /// The address this oracle signs reports with.
    pub on_chain_signing_address: Address,
    /// The address this oracle transmits reports from.
    pub transmit_address: Address,
    /// The X25519 public key used to encrypt this oracle's shared-secret share.
    pub offchain_public_key: [u8; 32],
    /// The peer-to-peer transport identity string.
    pub peer_id: String,
}

/// The dealer-encrypted shared secret, one ciphertext per oracle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedSecretEncryptions {
    /// The dealer's ephemeral X25519 public point.
    pub diffie_hellman_point: [u8; 32],
    /// `keccak256` of the plaintext shared secret; the equivocation commitment.
    pub shared_secret_hash: [u8; 32],
    /// Per-oracle ciphertexts, aligned with `PublicConfig::oracle_identities`.
    pub encryptions: Vec<[u8; 16]>,
}

/// A fully resolved session configuration: the decoded [`PublicConfig`] plus
/// the shared secret recovered for this node. Known only to oracles listed in
/// the configuration.
#[derive(Debug)]
pub struct SharedConfig {
    /// The decoded, chain-agnostic session parameters.
    pub public_config: PublicConfig,
    /// The 128-bit secret recovered via [`crate::SharedSecret`] decryption.
    pub shared_secret: SharedSecret,
}

impl SharedConfig {
    /// The session's [`ConfigDigest`].
    #[must_use]
    pub fn config_digest(&self) -> ConfigDigest {
        self.public_config.config_digest
    }
}

/// This node's identity, used by the config resolver to find itself among
/// `PublicConfig::oracle_identities`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeIdentity {
    /// This node's on-chain signing address.
    pub on_chain_signing_address: Address,
    /// This node's off-chain X25519 public key.
    pub offchain_public_key: [u8; 32],
    /// This node's peer-to-peer transport identity string.
    pub peer_id: String,
    /// This node's on-chain transmit address.
    pub transmit_address: Address,
}

/// A resolved oracle's position within `PublicConfig::oracle_identities`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OracleId(pub u8);

impl std::fmt::Display for OracleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::{ContractConfig, InvariantError, OracleIdentity, PublicConfig, MAX_ENCODED_CONFIG_LEN};
    use alloy_primitives::Address;
    use rstest::rstest;
    use std::time::Duration;

    fn identities(n: usize) -> Vec<OracleIdentity> {
        (0..n)
            .map(|i| OracleIdentity {
                on_chain_signing_address: Address::with_last_byte(i as u8),
                transmit_address: Address::with_last_byte(100 + i as u8),
                offchain_public_key: [i as u8; 32],
                peer_id: format!("peer-{i}"),
            })
            .collect()
    }

    fn public_config(n: usize, s_len: usize) -> PublicConfig {
        PublicConfig {
            delta_progress: Duration::from_secs(2),
            delta_resend: Duration::from_secs(5),
            delta_round: Duration::from_millis(2_500),
            delta_grace: Duration::from_millis(500),
            delta_c: Duration::from_secs(1),
            delta_stage: Duration::from_secs(3),
            alpha_ppb: 1_000_000,
            r_max: 3,
            s: vec![0; s_len],
            oracle_identities: identities(n),
            config_digest: super::ConfigDigest::ZERO,
        }
    }

    #[rstest]
    #[case::minimal_quorum(4, 1)]
    #[case::larger_quorum(10, 3)]
    #[case::max_threshold(96, 31)]
    fn accepts_valid_n_and_f(#[case] n: usize, #[case] f: u8) {
        let config = public_config(n, 3);
        let signers: Vec<_> = config.oracle_identities.iter().map(|o| o.on_chain_signing_address).collect();
        let transmitters: Vec<_> = config.oracle_identities.iter().map(|o| o.transmit_address).collect();
        assert!(config.validate(&signers, &transmitters, n, f).is_ok());
    }

    #[rstest]
    #[case::equal_to_3f(3, 1)]
    #[case::zero_threshold(4, 0)]
    #[case::threshold_too_large(4, 32)]
    fn rejects_invalid_n_and_f(#[case] n: usize, #[case] f: u8) {
        let config = public_config(n, 3);
        let signers: Vec<_> = config.oracle_identities.iter().map(|o| o.on_chain_signing_address).collect();
        let transmitters: Vec<_> = config.oracle_identities.iter().map(|o| o.transmit_address).collect();
        assert!(matches!(
            config.validate(&signers, &transmitters, n, f),
            Err(InvariantError::InvalidThreshold { .. })
        ));
    }

    #[test]
    fn rejects_mismatched_oracle_counts() {
        let config = public_config(4, 3);
        let signers: Vec<_> = config.oracle_identities.iter().map(|o| o.on_chain_signing_address).collect();
        let transmitters: Vec<_> = config.oracle_identities.iter().map(|o| o.transmit_address).collect();
        assert!(matches!(
            config.validate(&signers, &transmitters, 3, 1),
            Err(InvariantError::MismatchedOracleCount { .. })
        ));
    }

    #[test]
    fn rejects_overlong_transmission_schedule() {
        let config = public_config(4, 1_001);
        let signers: Vec<_> = config.oracle_identities.iter().map(|o| o.on_chain_signing_address).collect();
        let transmitters: Vec<_> = config.oracle_identities.iter().map(|o| o.transmit_address).collect();
        assert!(matches!(
            config.validate(&signers, &transmitters, 4, 1),
            Err(InvariantError::ScheduleTooLong(1_001))
        ));
    }

    #[test]
    fn validate_size_rejects_oversized_encoded_config() {
        let config = ContractConfig {
            config_digest: super::ConfigDigest::ZERO,
            signers: vec![],
            transmitters: vec![],
            threshold: 1,
            encoded_config_version: 1,
            encoded_config: vec![0u8; MAX_ENCODED_CONFIG_LEN + 1],
        };
        assert!(matches!(
            config.validate_size(),
            Err(InvariantError::EncodedConfigTooLarge(n)) if n == MAX_ENCODED_CONFIG_LEN + 1
        ));
    }
}
