//! AES-256-GCM authenticated encryption using the `ring` crate.
//!
//! Every stored secret is sealed under a single device-local key with a
//! fresh random 96-bit nonce per encryption. Callers cannot supply their own
//! nonce; the API shape rules out nonce reuse rather than documenting it
//! away. With random 96-bit nonces, collision probability stays negligible
//! for far more encryptions than a vault of human-managed accounts will ever
//! see.

use ring::aead::{self, Aad, BoundKey, Nonce, NonceSequence, OpeningKey, SealingKey, UnboundKey};
use ring::rand::{SecureRandom, SystemRandom};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Result, VaultError};

/// Length of the AES-256-GCM key in bytes.
pub const KEY_LEN: usize = 32;

/// Length of the AES-256-GCM nonce in bytes (96 bits).
pub const NONCE_LEN: usize = aead::NONCE_LEN;

static AEAD_ALG: &aead::Algorithm = &aead::AES_256_GCM;

// ---------------------------------------------------------------------------
// Device key
// ---------------------------------------------------------------------------

/// The device-local symmetric key protecting every stored secret.
///
/// Generated once per install via the system CSPRNG and persisted in the
/// vault's meta table. The raw bytes are only reachable by the sealing and
/// opening functions in this module and are zeroized when the key handle is
/// dropped; there is no public accessor.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DeviceKey([u8; KEY_LEN]);

impl DeviceKey {
    /// Generate a fresh 256-bit key from the system CSPRNG.
    pub fn generate() -> Result<Self> {
        let mut bytes = [0u8; KEY_LEN];
        SystemRandom::new()
            .fill(&mut bytes)
            .map_err(|_| VaultError::EncryptionFailed {
                reason: "failed to generate device key".into(),
            })?;
        Ok(Self(bytes))
    }

    /// Reconstruct a key loaded from the meta table.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Corrupted`] if `bytes` is not exactly 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let array: [u8; KEY_LEN] = bytes.try_into().map_err(|_| VaultError::Corrupted {
            reason: format!("device key is {} bytes, expected {KEY_LEN}", bytes.len()),
        })?;
        Ok(Self(array))
    }

    /// Raw key material for persistence into the meta table.
    pub(crate) fn material(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for DeviceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceKey").finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Nonce handling
// ---------------------------------------------------------------------------

/// A single-use nonce sequence that yields exactly one nonce and then errors.
///
/// `ring` requires a [`NonceSequence`] for sealing operations. Since we
/// generate a fresh random nonce per encryption call, this wrapper ensures
/// each sealing key is used exactly once.
struct SingleNonce(Option<[u8; NONCE_LEN]>);

impl NonceSequence for SingleNonce {
    fn advance(&mut self) -> std::result::Result<Nonce, ring::error::Unspecified> {
        self.0
            .take()
            .map(Nonce::assume_unique_for_key)
            .ok_or(ring::error::Unspecified)
    }
}

// ---------------------------------------------------------------------------
// Seal / open
// ---------------------------------------------------------------------------

/// Encrypt `plaintext` under the device key.
///
/// Returns `(nonce, ciphertext)` where `nonce` is freshly random and
/// `ciphertext` carries the 128-bit authentication tag appended by `ring`.
pub fn encrypt(key: &DeviceKey, plaintext: &[u8]) -> Result<([u8; NONCE_LEN], Vec<u8>)> {
    let mut nonce_bytes = [0u8; NONCE_LEN];
    SystemRandom::new()
        .fill(&mut nonce_bytes)
        .map_err(|_| VaultError::EncryptionFailed {
            reason: "failed to generate random nonce".into(),
        })?;

    let unbound = UnboundKey::new(AEAD_ALG, key.material()).map_err(|_| {
        VaultError::EncryptionFailed {
            reason: "failed to create AES-256-GCM key".into(),
        }
    })?;
    let mut sealing_key = SealingKey::new(unbound, SingleNonce(Some(nonce_bytes)));

    let mut in_out = plaintext.to_vec();
    sealing_key
        .seal_in_place_append_tag(Aad::empty(), &mut in_out)
        .map_err(|_| VaultError::EncryptionFailed {
            reason: "seal_in_place failed".into(),
        })?;

    tracing::trace!(
        plaintext_len = plaintext.len(),
        ciphertext_len = in_out.len(),
        "sealed secret"
    );

    Ok((nonce_bytes, in_out))
}

/// Decrypt `ciphertext` (including its tag) under the device key.
///
/// # Errors
///
/// Returns [`VaultError::AuthenticationFailed`] if the record was tampered
/// with or sealed under a different key. Garbage plaintext is never returned.
pub fn decrypt(key: &DeviceKey, nonce: &[u8; NONCE_LEN], ciphertext: &[u8]) -> Result<Vec<u8>> {
    let unbound = UnboundKey::new(AEAD_ALG, key.material()).map_err(|_| {
        VaultError::EncryptionFailed {
            reason: "failed to create AES-256-GCM key".into(),
        }
    })?;
    let mut opening_key = OpeningKey::new(unbound, SingleNonce(Some(*nonce)));

    let mut in_out = ciphertext.to_vec();
    let plaintext = opening_key
        .open_in_place(Aad::empty(), &mut in_out)
        .map_err(|_| VaultError::AuthenticationFailed)?;

    Ok(plaintext.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_all_small_lengths() {
        let key = DeviceKey::generate().unwrap();
        for len in 0..=64usize {
            let plaintext: Vec<u8> = (0..len as u8).collect();
            let (nonce, ciphertext) = encrypt(&key, &plaintext).unwrap();
            let decrypted = decrypt(&key, &nonce, &ciphertext).unwrap();
            assert_eq!(decrypted, plaintext, "len {len}");
        }
    }

    #[test]
    fn any_flipped_bit_fails_authentication() {
        let key = DeviceKey::generate().unwrap();
        let (nonce, ciphertext) = encrypt(&key, b"attack at dawn").unwrap();

        for byte_idx in 0..ciphertext.len() {
            for bit in 0..8 {
                let mut tampered = ciphertext.clone();
                tampered[byte_idx] ^= 1 << bit;
                let result = decrypt(&key, &nonce, &tampered);
                assert!(
                    matches!(result, Err(VaultError::AuthenticationFailed)),
                    "byte {byte_idx} bit {bit} should fail"
                );
            }
        }
    }

    #[test]
    fn wrong_key_fails_authentication() {
        let key1 = DeviceKey::generate().unwrap();
        let key2 = DeviceKey::generate().unwrap();
        let (nonce, ciphertext) = encrypt(&key1, b"secret").unwrap();
        assert!(matches!(
            decrypt(&key2, &nonce, &ciphertext),
            Err(VaultError::AuthenticationFailed)
        ));
    }

    #[test]
    fn wrong_nonce_fails_authentication() {
        let key = DeviceKey::generate().unwrap();
        let (mut nonce, ciphertext) = encrypt(&key, b"secret").unwrap();
        nonce[0] ^= 0x01;
        assert!(matches!(
            decrypt(&key, &nonce, &ciphertext),
            Err(VaultError::AuthenticationFailed)
        ));
    }

    #[test]
    fn nonces_are_unique_per_call() {
        let key = DeviceKey::generate().unwrap();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..256 {
            let (nonce, _) = encrypt(&key, b"same plaintext").unwrap();
            assert!(seen.insert(nonce), "nonce repeated");
        }
    }

    #[test]
    fn identical_plaintexts_produce_distinct_ciphertexts() {
        let key = DeviceKey::generate().unwrap();
        let (_, c1) = encrypt(&key, b"same").unwrap();
        let (_, c2) = encrypt(&key, b"same").unwrap();
        assert_ne!(c1, c2);
    }

    #[test]
    fn key_from_bytes_length_checked() {
        assert!(matches!(
            DeviceKey::from_bytes(&[0u8; 16]),
            Err(VaultError::Corrupted { .. })
        ));
        assert!(DeviceKey::from_bytes(&[0u8; 32]).is_ok());
    }

    #[test]
    fn device_key_debug_is_redacted() {
        let key = DeviceKey::generate().unwrap();
        assert_eq!(format!("{key:?}"), "DeviceKey { .. }");
    }
}
