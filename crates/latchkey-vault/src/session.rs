//! Unlocked vault session: device key, decrypted cache, code generation.
//!
//! A [`Session`] is the explicit context object for everything that needs
//! plaintext secrets. It owns the store handle, the active [`DeviceKey`],
//! and one decrypted cache entry per record. The 1 Hz code refresh path
//! ([`Session::codes`]) reads only this cache and performs no storage I/O.
//!
//! Locking and wiping consume the session by value. That ownership shape is
//! what guarantees a periodic refresh cannot observe zeroed secrets: any
//! borrow for `codes` must end before `lock` or `wipe` can run.

use latchkey_otp::descriptor::clamp_period;
use latchkey_otp::{engine, CodeWindow, Descriptor, OtpAlgorithm, OtpDigits, SecretBytes};

use crate::crypto::{self, DeviceKey};
use crate::error::{Result, VaultError};
use crate::store::{
    NewRecord, RecordPatch, StoredRecord, Vault, META_APP_KEY, META_SCHEMA_VERSION, SCHEMA_VERSION,
};

/// One decrypted account, owned exclusively by the running session.
///
/// The secret is zeroized when the entry is dropped (on lock, wipe, removal,
/// or reload).
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub id: String,
    pub label: String,
    pub issuer: Option<String>,
    pub algorithm: OtpAlgorithm,
    pub digits: OtpDigits,
    pub period: u32,
    secret: SecretBytes,
}

/// A code window paired with the account it belongs to.
#[derive(Debug, Clone)]
pub struct AccountCodes {
    pub id: String,
    pub label: String,
    pub issuer: Option<String>,
    pub window: CodeWindow,
}

/// Fields of an account a caller may change; plaintext counterpart of
/// [`RecordPatch`].
#[derive(Debug, Default)]
pub struct AccountPatch {
    pub label: Option<String>,
    pub issuer: Option<Option<String>>,
    pub algorithm: Option<OtpAlgorithm>,
    pub digits: Option<OtpDigits>,
    pub period: Option<u32>,
    pub secret: Option<SecretBytes>,
}

/// An unlocked vault: store handle, device key, and decrypted cache.
pub struct Session {
    vault: Vault,
    key: DeviceKey,
    cache: Vec<CacheEntry>,
}

impl Session {
    /// Unlock the vault: load (or create, on first run) the device key from
    /// the meta table, then decrypt every record into the cache.
    ///
    /// A record that fails authentication is logged and skipped; one
    /// tampered row must not take the rest of the vault down with it.
    ///
    /// # Errors
    ///
    /// Propagates [`VaultError::Storage`] from the underlying store and
    /// [`VaultError::Corrupted`] if the persisted key has the wrong length.
    pub fn unlock(vault: Vault) -> Result<Self> {
        let key = match vault.meta_get(META_APP_KEY)? {
            Some(bytes) => DeviceKey::from_bytes(&bytes)?,
            None => {
                tracing::info!("no device key present, generating one");
                let key = DeviceKey::generate()?;
                vault.meta_put(META_APP_KEY, key.material())?;
                key
            }
        };

        // Upsert, so a vault that predates (or lost) the version marker gets
        // it backfilled on the next unlock.
        vault.meta_put(META_SCHEMA_VERSION, SCHEMA_VERSION.to_string().as_bytes())?;

        let mut session = Self {
            vault,
            key,
            cache: Vec::new(),
        };
        session.reload()?;
        Ok(session)
    }

    /// Rebuild the decrypted cache from the store. Existing entries are
    /// dropped (and zeroized) first.
    pub fn reload(&mut self) -> Result<()> {
        let records = self.vault.list()?;
        let mut cache = Vec::with_capacity(records.len());

        for record in records {
            match self.decrypt_record(&record) {
                Ok(entry) => cache.push(entry),
                Err(VaultError::AuthenticationFailed) => {
                    tracing::warn!(
                        id = %record.id,
                        label = %record.label,
                        "record failed authentication, skipping"
                    );
                }
                Err(other) => return Err(other),
            }
        }

        tracing::debug!(count = cache.len(), "decrypted account cache loaded");
        self.cache = cache;
        Ok(())
    }

    /// Encrypt and persist a new account, then append it to the cache.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::EmptySecret`] if the descriptor carries no
    /// secret bytes.
    pub fn add_account(&mut self, descriptor: Descriptor) -> Result<String> {
        if descriptor.secret.is_empty() {
            return Err(VaultError::EmptySecret);
        }

        let (nonce, enc_secret) = crypto::encrypt(&self.key, descriptor.secret.as_bytes())?;
        let stored = self.vault.add(NewRecord {
            label: descriptor.label,
            issuer: descriptor.issuer,
            algorithm: descriptor.algorithm,
            digits: descriptor.digits,
            period: descriptor.period,
            enc_secret,
            nonce,
        })?;

        let id = stored.id.clone();
        self.cache.push(CacheEntry {
            id: stored.id,
            label: stored.label,
            issuer: stored.issuer,
            algorithm: stored.algorithm,
            digits: stored.digits,
            period: stored.period,
            secret: descriptor.secret,
        });

        Ok(id)
    }

    /// Apply a patch to an account, re-encrypting when the secret changes.
    ///
    /// A patched period is clamped to `[5, 300]` like every other entry
    /// point, so no stored record can ever drive a zero-period division in
    /// the code engine.
    pub fn update_account(&mut self, id: &str, patch: AccountPatch) -> Result<()> {
        if patch.secret.as_ref().is_some_and(SecretBytes::is_empty) {
            return Err(VaultError::EmptySecret);
        }

        let enc_secret = match &patch.secret {
            Some(secret) => {
                let (nonce, ciphertext) = crypto::encrypt(&self.key, secret.as_bytes())?;
                Some((ciphertext, nonce))
            }
            None => None,
        };

        let updated = self.vault.update(
            id,
            RecordPatch {
                label: patch.label,
                issuer: patch.issuer,
                algorithm: patch.algorithm,
                digits: patch.digits,
                period: patch.period.map(clamp_period),
                enc_secret,
            },
        )?;

        if let Some(entry) = self.cache.iter_mut().find(|e| e.id == id) {
            entry.label = updated.label;
            entry.issuer = updated.issuer;
            entry.algorithm = updated.algorithm;
            entry.digits = updated.digits;
            entry.period = updated.period;
            if let Some(secret) = patch.secret {
                entry.secret = secret;
            }
        }

        Ok(())
    }

    /// Delete an account from store and cache. Idempotent.
    pub fn remove_account(&mut self, id: &str) -> Result<()> {
        self.vault.delete(id)?;
        self.cache.retain(|e| e.id != id);
        Ok(())
    }

    /// Apply display-order moves and re-sort the cache to match the store.
    pub fn reorder(&mut self, moves: &[(String, i64)]) -> Result<()> {
        self.vault.reorder(moves)?;

        // The store is the ordering authority; mirror its view.
        let order: Vec<String> = self.vault.list()?.into_iter().map(|r| r.id).collect();
        self.cache
            .sort_by_key(|e| order.iter().position(|id| *id == e.id));
        Ok(())
    }

    /// Ordered view of the decrypted cache. No storage I/O.
    pub fn entries(&self) -> &[CacheEntry] {
        &self.cache
    }

    /// Compute a code window for every cached account at `timestamp_ms`.
    ///
    /// Pure in-memory computation, safe to call on a 1-second cadence.
    pub fn codes(&self, timestamp_ms: u64) -> Vec<AccountCodes> {
        self.cache
            .iter()
            .map(|entry| AccountCodes {
                id: entry.id.clone(),
                label: entry.label.clone(),
                issuer: entry.issuer.clone(),
                window: engine::window(
                    entry.secret.as_bytes(),
                    entry.period,
                    entry.digits,
                    entry.algorithm,
                    timestamp_ms,
                ),
            })
            .collect()
    }

    /// Lock the session: zeroize the cache and the key handle.
    ///
    /// Taking `self` by value ends every outstanding borrow, so no refresh
    /// can still be reading the cache when it is destroyed.
    pub fn lock(self) {
        tracing::info!("session locked");
        // SecretBytes and DeviceKey zeroize on drop.
    }

    /// Wipe the vault: destroy every record, the meta table (device key
    /// included), and the in-memory session.
    ///
    /// After this, nothing encrypted under the old key is recoverable.
    pub fn wipe(self) -> Result<()> {
        self.vault.clear_all()?;
        tracing::warn!("vault wiped and session destroyed");
        Ok(())
    }

    fn decrypt_record(&self, record: &StoredRecord) -> Result<CacheEntry> {
        let plaintext = crypto::decrypt(&self.key, &record.nonce, &record.enc_secret)?;
        Ok(CacheEntry {
            id: record.id.clone(),
            label: record.label.clone(),
            issuer: record.issuer.clone(),
            algorithm: record.algorithm,
            digits: record.digits,
            period: record.period,
            secret: SecretBytes::new(plaintext),
        })
    }
}
