//! Resolves a freshly read [`ContractConfig`] into this node's
//! [`SharedConfig`], or rejects it.

use ocr_codec::DecodedConfig;
use ocr_types::{ContractConfig, NodeIdentity, OracleId, PublicConfig, SharedConfig};

/// Errors raised resolving a `ContractConfig` for this node.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// `encoded_config_version` was not `1`.
    #[error("unsupported encoded_config_version: {0}")]
    UnsupportedVersion(u64),
    /// Decoding the ABI payload failed.
    #[error(transparent)]
    Codec(#[from] ocr_codec::CodecError),
    /// An invariant over the decoded config's field lengths or threshold was violated.
    #[error(transparent)]
    Invariant(#[from] ocr_types::InvariantError),
    /// This node's signing address is not listed among the config's oracles.
    #[error("node's on-chain signing address is not present in this config")]
    NotInConfig,
    /// The node's signing address was found, but another identity field
    /// (`offchain_public_key`, `peer_id`, or `transmit_address`) disagreed.
    #[error("identity fields at the node's index do not match local identity")]
    IdentityMismatch,
    /// Recovering the shared secret failed.
    #[error(transparent)]
    Crypto(#[from] ocr_crypto::CryptoError),
}

fn decode_and_validate(
    contract_config: &ContractConfig,
) -> Result<DecodedConfig, ResolveError> {
    if contract_config.encoded_config_version != ocr_codec::ENCODED_CONFIG_VERSION {
        return Err(ResolveError::UnsupportedVersion(
            contract_config.encoded_config_version,
        ));
    }
    contract_config.validate_size()?;

    // The digest computation is distinct from decoding; decoding only needs
    // the digest to stamp onto the resulting `PublicConfig`, so we pass
    // through the one already attached to `contract_config`.
    let decoded = ocr_codec::decode_config(
        &contract_config.encoded_config,
        contract_config.config_digest,
        &contract_config.signers,
        &contract_config.transmitters,
    )?;

    decoded.public_config.validate(
        &contract_config.signers,
        &contract_config.transmitters,
        decoded.shared_secret_encryptions.encryptions.len(),
        contract_config.threshold,
    )?;

    Ok(decoded)
}

/// Resolves a `ContractConfig` for a full (non-bootstrap) node: decodes,
/// validates, locates this node among the oracle identities, cross-checks
/// every identity field, and recovers the shared secret.
///
/// # Errors
/// Returns the first applicable [`ResolveError`] variant.
pub fn resolve_config(
    contract_config: &ContractConfig,
    node_identity: &NodeIdentity,
    own_private_key: &[u8; 32],
) -> Result<(SharedConfig, OracleId), ResolveError> {
    let decoded = decode_and_validate(contract_config)?;
    let public_config = decoded.public_config;

    let index = public_config
        .oracle_identities
        .iter()
        .position(|identity| identity.on_chain_signing_address == node_identity.on_chain_signing_address)
        .ok_or(ResolveError::NotInConfig)?;

    let identity = &public_config.oracle_identities[index];
    if identity.offchain_public_key != node_identity.offchain_public_key
        || identity.peer_id != node_identity.peer_id
        || identity.transmit_address != node_identity.transmit_address
    {
        return Err(ResolveError::IdentityMismatch);
    }

    let shared_secret = ocr_crypto::decrypt(own_private_key, &decoded.shared_secret_encryptions, index)?;

    Ok((
        SharedConfig {
            public_config,
            shared_secret,
        },
        OracleId(u8::try_from(index).unwrap_or(u8::MAX)),
    ))
}

/// Resolves a `ContractConfig` for a bootstrap-only node: decode and validate
/// only, no identity lookup and no secret recovery.
///
/// # Errors
/// Returns the first applicable [`ResolveError`] variant.
pub fn resolve_bootstrap_config(contract_config: &ContractConfig) -> Result<PublicConfig, ResolveError> {
    decode_and_validate(contract_config).map(|decoded| decoded.public_config)
}

#[cfg(test)]
mod tests {
    use super::{resolve_bootstrap_config, resolve_config, ResolveError};
    use alloy_primitives::Address;
    use ocr_types::{ConfigDigest, ContractConfig, NodeIdentity, OracleIdentity, PublicConfig, SharedSecretEncryptions};
    use std::time::Duration;

    fn build_contract_config(n: usize, threshold: u8) -> (ContractConfig, Vec<[u8; 32]>) {
        let secret_keys: Vec<[u8; 32]> = (0..n).map(|i| [i as u8 + 1; 32]).collect();
        let public_keys: Vec<[u8; 32]> = secret_keys
            .iter()
            .map(|sk| *x25519_dalek::PublicKey::from(&x25519_dalek::StaticSecret::from(*sk)).as_bytes())
            .collect();

        let identities: Vec<OracleIdentity> = (0..n)
            .map(|i| OracleIdentity {
                on_chain_signing_address: Address::with_last_byte(i as u8),
                transmit_address: Address::with_last_byte(100 + i as u8),
                offchain_public_key: public_keys[i],
                peer_id: format!("peer-{i}"),
            })
            .collect();

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
            oracle_identities: identities.clone(),
            config_digest: ConfigDigest::ZERO,
        };

        let shared_secret = ocr_types::SharedSecret::new([9u8; 16]);
        let encryptions = ocr_crypto::encrypt(&shared_secret, &public_keys);

        let encoded = ocr_codec::encode_config(&public_config, &encryptions).unwrap();
        let signers: Vec<_> = identities.iter().map(|o| o.on_chain_signing_address).collect();
        let transmitters: Vec<_> = identities.iter().map(|o| o.transmit_address).collect();

        let digest = ocr_codec::config_digest(
            Address::with_last_byte(0xaa),
            1,
            &signers,
            &transmitters,
            threshold,
            1,
            &encoded,
        );

        (
            ContractConfig {
                config_digest: digest,
                signers,
                transmitters,
                threshold,
                encoded_config_version: 1,
                encoded_config: encoded,
            },
            secret_keys,
        )
    }

    #[test]
    fn resolves_own_identity_and_secret() {
        let (contract_config, secret_keys) = build_contract_config(4, 1);
        let public_key = *x25519_dalek::PublicKey::from(&x25519_dalek::StaticSecret::from(secret_keys[2])).as_bytes();
        let node_identity = NodeIdentity {
            on_chain_signing_address: contract_config.signers[2],
            offchain_public_key: public_key,
            peer_id: "peer-2".to_string(),
            transmit_address: contract_config.transmitters[2],
        };

        let (shared_config, oracle_id) =
            resolve_config(&contract_config, &node_identity, &secret_keys[2]).unwrap();
        assert_eq!(oracle_id.0, 2);
        assert_eq!(shared_config.shared_secret.as_bytes(), &[9u8; 16]);
    }

    #[test]
    fn rejects_absent_signing_address() {
        let (contract_config, secret_keys) = build_contract_config(4, 1);
        let node_identity = NodeIdentity {
            on_chain_signing_address: Address::with_last_byte(0xff),
            offchain_public_key: [0u8; 32],
            peer_id: "ghost".to_string(),
            transmit_address: Address::with_last_byte(0xff),
        };
        assert!(matches!(
            resolve_config(&contract_config, &node_identity, &secret_keys[0]),
            Err(ResolveError::NotInConfig)
        ));
    }

    #[test]
    fn rejects_identity_mismatch() {
        let (contract_config, secret_keys) = build_contract_config(4, 1);
        let node_identity = NodeIdentity {
            on_chain_signing_address: contract_config.signers[0],
            offchain_public_key: [0u8; 32],
            peer_id: "wrong-peer-id".to_string(),
            transmit_address: contract_config.transmitters[0],
        };
        assert!(matches!(
            resolve_config(&contract_config, &node_identity, &secret_keys[0]),
            Err(ResolveError::IdentityMismatch)
        ));
    }

    #[test]
    fn rejects_unsupported_version() {
        let (mut contract_config, _) = build_contract_config(4, 1);
        contract_config.encoded_config_version = 2;
        assert!(matches!(
            resolve_bootstrap_config(&contract_config),
            Err(ResolveError::UnsupportedVersion(2))
        ));
    }

    #[test]
    fn bootstrap_variant_skips_identity_and_secret() {
        let (contract_config, _) = build_contract_config(4, 1);
        let public_config = resolve_bootstrap_config(&contract_config).unwrap();
        assert_eq!(public_config.n(), 4);
    }
}
