//! Vault error types.
//!
//! All vault subsystems surface errors through [`VaultError`], the single
//! error type returned by every public API in this crate. Decryption
//! failures are deliberately distinct from storage failures: a tampered
//! record must be reportable without aborting the rest of the vault.

use latchkey_otp::OtpError;

/// Unified error type for the Latchkey account vault.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    // -- Crypto errors ------------------------------------------------------
    /// Encryption failed (nonce generation or ring internal error).
    #[error("encryption failed: {reason}")]
    EncryptionFailed { reason: String },

    /// The ciphertext/nonce/key combination did not authenticate: the
    /// record was tampered with or encrypted under a different key.
    #[error("authentication failed: wrong key or corrupted record")]
    AuthenticationFailed,

    /// Persisted crypto material has an impossible shape (key or nonce of
    /// the wrong length). Distinct from a failed tag check.
    #[error("corrupted vault data: {reason}")]
    Corrupted { reason: String },

    // -- Store errors -------------------------------------------------------
    /// The requested record does not exist.
    #[error("record not found: id={id}")]
    RecordNotFound { id: String },

    /// Database schema migration failed.
    #[error("migration failed: {reason}")]
    MigrationFailed { reason: String },

    /// SQLite error from `rusqlite`.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    // -- Input errors -------------------------------------------------------
    /// An account descriptor arrived with no secret bytes.
    #[error("account secret must not be empty")]
    EmptySecret,

    /// Error from the OTP pipeline (secret decoding, URI parsing).
    #[error(transparent)]
    Otp(#[from] OtpError),
}

/// Convenience alias used throughout the vault crate.
pub type Result<T> = std::result::Result<T, VaultError>;
