//! Encrypted account vault for Latchkey.
//!
//! This crate persists TOTP account secrets encrypted at rest. Every secret
//! is sealed with AES-256-GCM under a device-local random key; records live
//! in an ordered SQLite store alongside a small meta table holding the key
//! and schema version. Nothing here ever talks to a network.
//!
//! # Modules
//!
//! - [`crypto`] — AES-256-GCM seal/open with per-record random nonces, the
//!   non-exportable [`crypto::DeviceKey`].
//! - [`store`] — SQLite-backed ordered record CRUD plus the meta table.
//! - [`session`] — the unlocked session: decrypted cache, code generation,
//!   lock and wipe.
//! - [`error`] — unified error types.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use latchkey_vault::{Session, Vault};
//! use latchkey_otp::uri;
//!
//! # fn example() -> latchkey_vault::Result<()> {
//! let vault = Vault::open("data/latchkey.db")?;
//! let mut session = Session::unlock(vault)?;
//!
//! let descriptor = uri::parse("otpauth://totp/Example:alice?secret=JBSWY3DPEHPK3PXP")?;
//! session.add_account(descriptor)?;
//!
//! for account in session.codes(1_700_000_000_000) {
//!     println!("{}: {}", account.label, account.window.current);
//! }
//!
//! session.lock();
//! # Ok(())
//! # }
//! ```

pub mod crypto;
pub mod error;
pub mod session;
pub mod store;

// Re-export the most commonly used types at the crate root for convenience.
pub use crypto::DeviceKey;
pub use error::{Result, VaultError};
pub use session::{AccountCodes, AccountPatch, CacheEntry, Session};
pub use store::{NewRecord, RecordPatch, StoredRecord, Vault};
