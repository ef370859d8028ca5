#![doc = include_str!("../README.md")]
#![deny(clippy::nursery, clippy::pedantic, missing_docs)]
#![allow(clippy::module_name_repetitions)]

//! Canonical EVM/Solidity ABI tuple encoding for the on-chain config payload,
//! and the `ConfigDigest` computation that binds a session to its
//! configuration.

use std::time::Duration;

use alloy_primitives::{keccak256, Address};
use alloy_sol_types::SolValue;
use ocr_types::{ConfigDigest, OracleIdentity, PublicConfig, SharedSecretEncryptions};

/// Payloads longer than this are rejected outright, mirroring
/// [`ocr_types::MAX_ENCODED_CONFIG_LEN`].
pub const MAX_ENCODED_CONFIG_LEN: usize = ocr_types::MAX_ENCODED_CONFIG_LEN;

/// The only `encoded_config_version` this codec understands.
pub const ENCODED_CONFIG_VERSION: u64 = 1;

alloy_sol_types::sol! {
    struct SharedSecretEncryptionsAbi {
        bytes32 diffieHellmanPoint;
        bytes32 sharedSecretHash;
        bytes16[] encryptions;
    }

    /// Field order and types are the wire contract and must not drift.
    struct ConfigPayload {
        int64 deltaProgress;
        int64 deltaResend;
        int64 deltaRound;
        int64 deltaGrace;
        int64 deltaC;
        uint64 alphaPpb;
        int64 deltaStage;
        uint8 rMax;
        uint8[] s;
        bytes32[] offchainPublicKeys;
        string peerIds;
        SharedSecretEncryptionsAbi sharedSecretEncryptions;
    }

    /// Distinct from [`ConfigPayload`]; used only for digest computation.
    struct DigestPayload {
        address contractAddress;
        uint64 configCount;
        address[] signers;
        address[] transmitters;
        uint8 threshold;
        uint64 encodedConfigVersion;
        bytes encodedConfig;
    }
}

/// Errors raised encoding or decoding a config payload.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The payload exceeds [`MAX_ENCODED_CONFIG_LEN`].
    #[error("encoded config too large: {0} bytes")]
    PayloadTooLarge(usize),
    /// The ABI payload did not parse.
    #[error("malformed ABI payload: {0}")]
    MalformedAbi(#[from] alloy_sol_types::Error),
    /// A duration did not fit in a signed 64-bit nanosecond count.
    #[error("duration out of range: {0:?}")]
    DurationOutOfRange(Duration),
    /// `offchain_public_keys`, `peer_ids` (after split), and
    /// `shared_secret_encryptions.encryptions` disagreed in length.
    #[error("mismatched oracle field lengths in decoded payload")]
    MismatchedOracleFields,
}

/// The decoded halves of [`ConfigPayload`] that are not carried directly on
/// [`PublicConfig`]: per-oracle keys/peer-ids and the encrypted secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedConfig {
    /// The decoded, chain-agnostic session parameters (`oracle_identities`
    /// only has `on_chain_signing_address`/`transmit_address` populated by
    /// the caller; this decoder fills `offchain_public_key` and `peer_id`).
    pub public_config: PublicConfig,
    /// The dealer-encrypted shared secret.
    pub shared_secret_encryptions: SharedSecretEncryptions,
}

fn duration_to_nanos(d: Duration) -> Result<i64, CodecError> {
    i64::try_from(d.as_nanos()).map_err(|_| CodecError::DurationOutOfRange(d))
}

fn nanos_to_duration(nanos: i64) -> Duration {
    Duration::from_nanos(nanos.max(0).unsigned_abs())
}

/// Encodes the `PublicConfig`-adjacent fields into the on-chain tuple
/// described above.
///
/// # Errors
/// Returns [`CodecError::DurationOutOfRange`] if a `Duration` does not fit in
/// a signed 64-bit nanosecond count, or [`CodecError::PayloadTooLarge`] if the
/// resulting payload exceeds [`MAX_ENCODED_CONFIG_LEN`].
pub fn encode_config(
    public_config: &PublicConfig,
    encryptions: &SharedSecretEncryptions,
) -> Result<Vec<u8>, CodecError> {
    let offchain_public_keys = public_config
        .oracle_identities
        .iter()
        .map(|identity| identity.offchain_public_key.into())
        .collect();
    let peer_ids = public_config
        .oracle_identities
        .iter()
        .map(|identity| identity.peer_id.as_str())
        .collect::<Vec<_>>()
        .join(",");

    let payload = ConfigPayload {
        deltaProgress: duration_to_nanos(public_config.delta_progress)?,
        deltaResend: duration_to_nanos(public_config.delta_resend)?,
        deltaRound: duration_to_nanos(public_config.delta_round)?,
        deltaGrace: duration_to_nanos(public_config.delta_grace)?,
        deltaC: duration_to_nanos(public_config.delta_c)?,
        alphaPpb: public_config.alpha_ppb,
        deltaStage: duration_to_nanos(public_config.delta_stage)?,
        rMax: public_config.r_max,
        s: public_config.s.clone(),
        offchainPublicKeys: offchain_public_keys,
        peerIds: peer_ids,
        sharedSecretEncryptions: SharedSecretEncryptionsAbi {
            diffieHellmanPoint: encryptions.diffie_hellman_point.into(),
            sharedSecretHash: encryptions.shared_secret_hash.into(),
            encryptions: encryptions.encryptions.iter().map(|e| (*e).into()).collect(),
        },
    };

    let encoded = payload.abi_encode();
    if encoded.len() > MAX_ENCODED_CONFIG_LEN {
        return Err(CodecError::PayloadTooLarge(encoded.len()));
    }
    Ok(encoded)
}

/// Decodes a payload produced by [`encode_config`], pairing it with the
/// on-chain `signers`/`transmitters` to rebuild full [`OracleIdentity`]
/// entries.
///
/// # Errors
/// Returns [`CodecError::PayloadTooLarge`] if `bytes` exceeds
/// [`MAX_ENCODED_CONFIG_LEN`], [`CodecError::MalformedAbi`] if the payload
/// does not parse, or [`CodecError::MismatchedOracleFields`] if the decoded
/// per-oracle vectors disagree in length with `signers`/`transmitters`.
pub fn decode_config(
    bytes: &[u8],
    config_digest: ConfigDigest,
    signers: &[Address],
    transmitters: &[Address],
) -> Result<DecodedConfig, CodecError> {
    if bytes.len() > MAX_ENCODED_CONFIG_LEN {
        return Err(CodecError::PayloadTooLarge(bytes.len()));
    }
    let payload = ConfigPayload::abi_decode(bytes)?;

    let peer_ids: Vec<&str> = if payload.peerIds.is_empty() {
        Vec::new()
    } else {
        payload.peerIds.split(',').collect()
    };
    let n = signers.len();
    if transmitters.len() != n
        || payload.offchainPublicKeys.len() != n
        || peer_ids.len() != n
        || payload.sharedSecretEncryptions.encryptions.len() != n
    {
        return Err(CodecError::MismatchedOracleFields);
    }

    let oracle_identities = (0..n)
        .map(|i| OracleIdentity {
            on_chain_signing_address: signers[i],
            transmit_address: transmitters[i],
            offchain_public_key: payload.offchainPublicKeys[i].0,
            peer_id: peer_ids[i].to_string(),
        })
        .collect();

    let public_config = PublicConfig {
        delta_progress: nanos_to_duration(payload.deltaProgress),
        delta_resend: nanos_to_duration(payload.deltaResend),
        delta_round: nanos_to_duration(payload.deltaRound),
        delta_grace: nanos_to_duration(payload.deltaGrace),
        delta_c: nanos_to_duration(payload.deltaC),
        delta_stage: nanos_to_duration(payload.deltaStage),
        alpha_ppb: payload.alphaPpb,
        r_max: payload.rMax,
        s: payload.s,
        oracle_identities,
        config_digest,
    };

    let shared_secret_encryptions = SharedSecretEncryptions {
        diffie_hellman_point: payload.sharedSecretEncryptions.diffieHellmanPoint.0,
        shared_secret_hash: payload.sharedSecretEncryptions.sharedSecretHash.0,
        encryptions: payload
            .sharedSecretEncryptions
            .encryptions
            .into_iter()
            .map(|e| e.0)
            .collect(),
    };

    Ok(DecodedConfig {
        public_config,
        shared_secret_encryptions,
    })
}

/// Computes `ConfigDigest`: the first 16 bytes of
/// `keccak256` over a distinct ABI tuple, never the config-payload tuple
/// itself.
#[must_use]
pub fn config_digest(
    contract_address: Address,
    config_count: u64,
    signers: &[Address],
    transmitters: &[Address],
    threshold: u8,
    encoded_config_version: u64,
    encoded_config: &[u8],
) -> ConfigDigest {
    let payload = DigestPayload {
        contractAddress: contract_address,
        configCount: config_count,
        signers: signers.to_vec(),
        transmitters: transmitters.to_vec(),
        threshold,
        encodedConfigVersion: encoded_config_version,
        encodedConfig: encoded_config.to_vec().into(),
    };
    // `abi_encode_params`, not `abi_encode`: this tuple is dynamic (it
    // contains `address[]`/`bytes`), and `abi_encode` would prepend a
    // leading 32-byte offset word the way encoding a single dynamic value
    // does. The digest must match Solidity's `abi.encode(contractAddress,
    // configCount, signers, transmitters, threshold, encodedConfigVersion,
    // encodedConfig)` over the seven arguments directly, with no such offset.
    let hash = keccak256(payload.abi_encode_params());
    let mut digest = [0u8; 16];
    digest.copy_from_slice(&hash[..16]);
    ConfigDigest::from(digest)
}

#[cfg(test)]
mod tests {
    use super::{config_digest, decode_config, encode_config};
    use alloy_primitives::Address;
    use ocr_types::{OracleIdentity, PublicConfig, SharedSecretEncryptions};
    use std::time::Duration;

    fn sample_identities(n: usize) -> Vec<OracleIdentity> {
        (0..n)
            .map(|i| OracleIdentity {
                on_chain_signing_address: Address::with_last_byte(i as u8),
                transmit_address: Address::with_last_byte(100 + i as u8),
                offchain_public_key: [i as u8; 32],
                peer_id: format!("peer-{i}"),
            })
            .collect()
    }

    fn sample_config(n: usize) -> (PublicConfig, SharedSecretEncryptions) {
        let public_config = PublicConfig {
            delta_progress: Duration::from_secs(2),
            delta_resend: Duration::from_secs(5),
            delta_round: Duration::from_millis(2_500),
            delta_grace: Duration::from_millis(500),
            delta_c: Duration::from_secs(1),
            delta_stage: Duration::from_secs(3),
            alpha_ppb: 1_000_000,
            r_max: 3,
            s: vec![0, 1, 2],
            oracle_identities: sample_identities(n),
            config_digest: ocr_types::ConfigDigest::ZERO,
        };
        let encryptions = SharedSecretEncryptions {
            diffie_hellman_point: [7u8; 32],
            shared_secret_hash: [9u8; 32],
            encryptions: (0..n).map(|i| [i as u8; 16]).collect(),
        };
        (public_config, encryptions)
    }

    #[test]
    fn encode_decode_round_trip() {
        let (public_config, encryptions) = sample_config(4);
        let signers: Vec<_> = public_config
            .oracle_identities
            .iter()
            .map(|o| o.on_chain_signing_address)
            .collect();
        let transmitters: Vec<_> = public_config
            .oracle_identities
            .iter()
            .map(|o| o.transmit_address)
            .collect();

        let bytes = encode_config(&public_config, &encryptions).unwrap();
        let decoded = decode_config(&bytes, ocr_types::ConfigDigest::from([1u8; 16]), &signers, &transmitters).unwrap();

        assert_eq!(decoded.public_config.delta_progress, public_config.delta_progress);
        assert_eq!(decoded.public_config.r_max, public_config.r_max);
        assert_eq!(decoded.public_config.oracle_identities, public_config.oracle_identities);
        assert_eq!(decoded.shared_secret_encryptions, encryptions);
    }

    #[test]
    fn empty_peer_ids_round_trip_as_empty_list() {
        let (public_config, encryptions) = sample_config(0);
        let bytes = encode_config(&public_config, &encryptions).unwrap();
        let decoded = decode_config(&bytes, ocr_types::ConfigDigest::ZERO, &[], &[]).unwrap();
        assert!(decoded.public_config.oracle_identities.is_empty());
    }

    #[test]
    fn digest_is_deterministic_and_order_sensitive() {
        let address = Address::with_last_byte(1);
        let signers = vec![Address::with_last_byte(2)];
        let transmitters = vec![Address::with_last_byte(3)];
        let a = config_digest(address, 1, &signers, &transmitters, 1, 1, b"abc");
        let b = config_digest(address, 1, &signers, &transmitters, 1, 1, b"abc");
        let c = config_digest(address, 2, &signers, &transmitters, 1, 1, b"abc");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    /// Fixed-vector regression test for the `abi_encode_params` preimage.
    /// The expected bytes were computed independently (flat ABI encoding of
    /// the seven arguments, no leading dynamic-tuple offset word) against the
    /// inputs below; a switch back to `abi_encode` would prepend a spurious
    /// offset word and shift every value this asserts on.
    #[test]
    fn digest_matches_known_answer_vector() {
        let contract_address = Address::with_last_byte(1);
        let signers = vec![Address::with_last_byte(2), Address::with_last_byte(3)];
        let transmitters = vec![Address::with_last_byte(4)];
        let digest = config_digest(contract_address, 6, &signers, &transmitters, 5, 7, b"abc");
        let expected = ocr_types::ConfigDigest::from([
            0x77, 0x4c, 0x1b, 0x30, 0xf5, 0x03, 0xe0, 0x1d, 0x80, 0x76, 0x8d, 0xf3, 0x37, 0xaa, 0x6a, 0xe6,
        ]);
        assert_eq!(digest, expected);
    }
}
