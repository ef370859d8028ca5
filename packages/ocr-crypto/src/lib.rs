#![doc = include_str!("../README.md")]
#![deny(clippy::nursery, clippy::pedantic, missing_docs)]
#![allow(clippy::module_name_repetitions)]

//! `N`-recipient broadcast encryption of a 16-byte shared secret: X25519
//! key agreement per recipient, a bare AES-128 block cipher with no
//! padding/IV/MAC, and a `keccak256` commitment standing in for authenticity.

use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::Aes128;
use alloy_primitives::keccak256;
use ocr_types::{SharedSecret, SharedSecretEncryptions};
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroize;

/// Errors raised encrypting or decrypting a shared secret.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CryptoError {
    /// This oracle's index has no corresponding ciphertext.
    #[error("oracle index {index} out of bounds for {len} encryptions")]
    IndexOutOfBounds {
        /// The requested index.
        index: usize,
        /// The number of available ciphertexts.
        len: usize,
    },
    /// The decrypted plaintext's hash did not match `shared_secret_hash`;
    /// the dealer handed different plaintexts to different recipients.
    #[error("decrypted secret does not match the commitment")]
    DecryptionMismatch,
}

fn derive_block_key(dh: &x25519_dalek::SharedSecret) -> [u8; 16] {
    let hash = keccak256(dh.as_bytes());
    let mut key = [0u8; 16];
    key.copy_from_slice(&hash[..16]);
    key
}

/// Encrypts `secret` for every recipient in `recipient_public_keys`, one
/// AES-128 block per recipient (dealer side).
#[must_use]
pub fn encrypt(
    secret: &SharedSecret,
    recipient_public_keys: &[[u8; 32]],
) -> SharedSecretEncryptions {
    let ephemeral_secret = StaticSecret::random();
    let ephemeral_public = PublicKey::from(&ephemeral_secret);

    let encryptions = recipient_public_keys
        .iter()
        .map(|pk_bytes| {
            let recipient_public = PublicKey::from(*pk_bytes);
            let dh = ephemeral_secret.diffie_hellman(&recipient_public);
            let mut key = derive_block_key(&dh);
            let cipher = Aes128::new_from_slice(&key).expect("16-byte key");
            key.zeroize();

            let mut block = (*secret.as_bytes()).into();
            cipher.encrypt_block(&mut block);
            let mut ct = [0u8; 16];
            ct.copy_from_slice(&block);
            ct
        })
        .collect();

    SharedSecretEncryptions {
        diffie_hellman_point: *ephemeral_public.as_bytes(),
        shared_secret_hash: *keccak256(secret.as_bytes()),
        encryptions,
    }
}

/// Recovers the shared secret for oracle `index`, verifying it against
/// `shared_secret_hash` (oracle side).
///
/// # Errors
/// Returns [`CryptoError::IndexOutOfBounds`] if `index` has no corresponding
/// ciphertext, or [`CryptoError::DecryptionMismatch`] if the recovered
/// plaintext does not hash to `shared_secret_hash`.
pub fn decrypt(
    own_private_key: &[u8; 32],
    encryptions: &SharedSecretEncryptions,
    index: usize,
) -> Result<SharedSecret, CryptoError> {
    let ciphertext = encryptions
        .encryptions
        .get(index)
        .ok_or(CryptoError::IndexOutOfBounds {
            index,
            len: encryptions.encryptions.len(),
        })?;

    let own_secret = StaticSecret::from(*own_private_key);
    let dealer_point = PublicKey::from(encryptions.diffie_hellman_point);
    let dh = own_secret.diffie_hellman(&dealer_point);
    let mut key = derive_block_key(&dh);
    let cipher = Aes128::new_from_slice(&key).expect("16-byte key");
    key.zeroize();

    let mut block = (*ciphertext).into();
    cipher.decrypt_block(&mut block);
    let mut plaintext = [0u8; 16];
    plaintext.copy_from_slice(&block);

    if *keccak256(plaintext) != encryptions.shared_secret_hash {
        plaintext.zeroize();
        return Err(CryptoError::DecryptionMismatch);
    }

    Ok(SharedSecret::new(plaintext))
}

#[cfg(test)]
mod tests {
    use super::{decrypt, encrypt, CryptoError};
    use ocr_types::SharedSecret;
    use x25519_dalek::{PublicKey, StaticSecret};

    fn recipient() -> (StaticSecret, [u8; 32]) {
        let sk = StaticSecret::random();
        let pk = *PublicKey::from(&sk).as_bytes();
        (sk, pk)
    }

    #[test]
    fn round_trip_recovers_secret() {
        let (sk0, pk0) = recipient();
        let (sk1, pk1) = recipient();
        let secret = SharedSecret::new([0x42u8; 16]);

        let encryptions = encrypt(&secret, &[pk0, pk1]);

        let recovered0 = decrypt(&sk0.to_bytes(), &encryptions, 0).unwrap();
        let recovered1 = decrypt(&sk1.to_bytes(), &encryptions, 1).unwrap();
        assert_eq!(recovered0.as_bytes(), secret.as_bytes());
        assert_eq!(recovered1.as_bytes(), secret.as_bytes());
    }

    #[test]
    fn wrong_index_is_out_of_bounds() {
        let (_, pk0) = recipient();
        let secret = SharedSecret::new([1u8; 16]);
        let encryptions = encrypt(&secret, &[pk0]);
        let (other_sk, _) = recipient();
        assert_eq!(
            decrypt(&other_sk.to_bytes(), &encryptions, 5),
            Err(CryptoError::IndexOutOfBounds { index: 5, len: 1 })
        );
    }

    #[test]
    fn tampered_commitment_is_rejected() {
        let (sk0, pk0) = recipient();
        let secret = SharedSecret::new([2u8; 16]);
        let mut encryptions = encrypt(&secret, &[pk0]);
        encryptions.shared_secret_hash[0] ^= 0xff;
        assert_eq!(
            decrypt(&sk0.to_bytes(), &encryptions, 0),
            Err(CryptoError::DecryptionMismatch)
        );
    }

    #[test]
    fn wrong_key_fails_commitment_check() {
        let (_, pk0) = recipient();
        let (wrong_sk, _) = recipient();
        let secret = SharedSecret::new([3u8; 16]);
        let encryptions = encrypt(&secret, &[pk0]);
        assert_eq!(
            decrypt(&wrong_sk.to_bytes(), &encryptions, 0),
            Err(CryptoError::DecryptionMismatch)
        );
    }
}
