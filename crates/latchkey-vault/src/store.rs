//! SQLite-backed ordered record store.
//!
//! The [`Vault`] struct wraps a `rusqlite::Connection` behind a mutex and
//! persists encrypted account records plus a small key/value meta table.
//! Secrets never reach this module in plaintext: callers hand over
//! ciphertext and nonce, produced by [`crate::crypto`].
//!
//! # Schema (v1)
//!
//! - `accounts` — one row per credential: ciphertext, nonce, display
//!   parameters, timestamps, and an explicit `display_order` that induces the
//!   iteration order (ties broken by the time-ordered uuid v7 id).
//! - `meta` — string-keyed blobs: the device key (`appKey`) and
//!   `schemaVersion`.
//!
//! Schema migration is automatic on open. All record operations go through
//! the single connection lock, which serializes concurrent mutations over
//! the record namespace.

use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use uuid::Uuid;

use latchkey_otp::{OtpAlgorithm, OtpDigits};

use crate::crypto::NONCE_LEN;
use crate::error::{Result, VaultError};

/// Meta key holding the raw 32-byte device key.
pub const META_APP_KEY: &str = "appKey";
/// Meta key holding the schema version as ASCII decimal.
pub const META_SCHEMA_VERSION: &str = "schemaVersion";
/// Current schema version.
pub const SCHEMA_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Fields for a record about to be inserted; the store assigns id, order,
/// and timestamps.
#[derive(Debug, Clone)]
pub struct NewRecord {
    pub label: String,
    pub issuer: Option<String>,
    pub algorithm: OtpAlgorithm,
    pub digits: OtpDigits,
    pub period: u32,
    /// Ciphertext plus authentication tag.
    pub enc_secret: Vec<u8>,
    pub nonce: [u8; NONCE_LEN],
}

/// A persisted account record. The secret stays encrypted here; only the
/// session cache holds plaintext.
#[derive(Debug, Clone, Serialize)]
pub struct StoredRecord {
    /// Opaque unique identifier, immutable once created (uuid v7).
    pub id: String,
    pub label: String,
    pub issuer: Option<String>,
    #[serde(rename = "alg")]
    pub algorithm: OtpAlgorithm,
    pub digits: OtpDigits,
    pub period: u32,
    #[serde(skip)]
    pub enc_secret: Vec<u8>,
    #[serde(skip)]
    pub nonce: [u8; NONCE_LEN],
    /// Epoch milliseconds.
    pub created_at: i64,
    /// Epoch milliseconds, never decreases.
    pub updated_at: i64,
    /// Sort key for display; values need not be contiguous.
    #[serde(rename = "order")]
    pub display_order: i64,
}

/// Partial update for a record. `None` fields are left untouched.
///
/// The issuer is doubly optional so a patch can distinguish "leave as-is"
/// (`None`) from "clear it" (`Some(None)`).
#[derive(Debug, Clone, Default)]
pub struct RecordPatch {
    pub label: Option<String>,
    pub issuer: Option<Option<String>>,
    pub algorithm: Option<OtpAlgorithm>,
    pub digits: Option<OtpDigits>,
    pub period: Option<u32>,
    /// Replacement ciphertext and its fresh nonce.
    pub enc_secret: Option<(Vec<u8>, [u8; NONCE_LEN])>,
}

// ---------------------------------------------------------------------------
// Vault
// ---------------------------------------------------------------------------

/// Persistent, ordered collection of encrypted account records.
pub struct Vault {
    conn: Mutex<Connection>,
}

impl Vault {
    /// Open (or create) a vault database at `path` and run migrations.
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::info!(path = %path.display(), "opening vault database");

        let conn = Connection::open(path)?;
        Self::configure_connection(&conn)?;
        let vault = Self {
            conn: Mutex::new(conn),
        };
        vault.run_migrations()?;

        tracing::info!("vault database ready");
        Ok(vault)
    }

    /// Open an in-memory vault (useful for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::configure_connection(&conn)?;
        let vault = Self {
            conn: Mutex::new(conn),
        };
        vault.run_migrations()?;
        Ok(vault)
    }

    /// Configure SQLite pragmas for durability and performance.
    fn configure_connection(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA temp_store = MEMORY;",
        )?;
        Ok(())
    }

    /// Run database schema migrations.
    fn run_migrations(&self) -> Result<()> {
        tracing::debug!("running vault schema migrations");

        self.conn()
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS accounts (
                    id            TEXT PRIMARY KEY,
                    label         TEXT NOT NULL,
                    issuer        TEXT,
                    alg           TEXT NOT NULL CHECK(alg IN ('SHA-1','SHA-256')),
                    digits        INTEGER NOT NULL CHECK(digits IN (6, 8)),
                    period        INTEGER NOT NULL CHECK(period BETWEEN 5 AND 300),
                    enc_secret    BLOB NOT NULL,
                    iv            BLOB NOT NULL,
                    created_at    INTEGER NOT NULL,
                    updated_at    INTEGER NOT NULL,
                    display_order INTEGER NOT NULL
                );

                CREATE TABLE IF NOT EXISTS meta (
                    key   TEXT PRIMARY KEY,
                    value BLOB NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_accounts_order
                    ON accounts(display_order);",
            )
            .map_err(|e| VaultError::MigrationFailed {
                reason: e.to_string(),
            })?;

        Ok(())
    }

    /// Acquire the global record-namespace lock. A poisoned mutex is
    /// recovered rather than propagated: the connection holds no in-flight
    /// transaction state between public calls.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    // -- Record CRUD --------------------------------------------------------

    /// Insert a new record: assigns a fresh id, the next display order, and
    /// creation/update timestamps. Returns the stored record.
    pub fn add(&self, record: NewRecord) -> Result<StoredRecord> {
        let conn = self.conn();

        let next_order: i64 = conn.query_row(
            "SELECT COALESCE(MAX(display_order), 0) + 1 FROM accounts",
            [],
            |row| row.get(0),
        )?;

        let id = Uuid::now_v7().to_string();
        let now = now_ms();

        conn.execute(
            "INSERT INTO accounts
                (id, label, issuer, alg, digits, period, enc_secret, iv,
                 created_at, updated_at, display_order)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                id,
                record.label,
                record.issuer,
                record.algorithm.as_str(),
                record.digits.value(),
                record.period,
                record.enc_secret,
                record.nonce.as_slice(),
                now,
                now,
                next_order,
            ],
        )?;

        tracing::info!(id = %id, label = %record.label, "stored account record");

        Ok(StoredRecord {
            id,
            label: record.label,
            issuer: record.issuer,
            algorithm: record.algorithm,
            digits: record.digits,
            period: record.period,
            enc_secret: record.enc_secret,
            nonce: record.nonce,
            created_at: now,
            updated_at: now,
            display_order: next_order,
        })
    }

    /// Fetch one record by id.
    pub fn get(&self, id: &str) -> Result<StoredRecord> {
        Self::fetch(&self.conn(), id)
    }

    fn fetch(conn: &Connection, id: &str) -> Result<StoredRecord> {
        let row = conn
            .query_row(
                "SELECT id, label, issuer, alg, digits, period, enc_secret, iv,
                        created_at, updated_at, display_order
                 FROM accounts WHERE id = ?1",
                params![id],
                RecordRow::from_sql_row,
            )
            .optional()?;

        row.ok_or_else(|| VaultError::RecordNotFound { id: id.to_string() })?
            .into_record()
    }

    /// Merge the provided fields into an existing record and bump
    /// `updated_at` (monotonically).
    ///
    /// The connection lock is held across the read and the write, so two
    /// concurrent updates to the same record cannot interleave and revert
    /// each other's fields.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::RecordNotFound`] if the id is absent.
    pub fn update(&self, id: &str, patch: RecordPatch) -> Result<StoredRecord> {
        let conn = self.conn();
        let mut record = Self::fetch(&conn, id)?;

        if let Some(label) = patch.label {
            record.label = label;
        }
        if let Some(issuer) = patch.issuer {
            record.issuer = issuer;
        }
        if let Some(algorithm) = patch.algorithm {
            record.algorithm = algorithm;
        }
        if let Some(digits) = patch.digits {
            record.digits = digits;
        }
        if let Some(period) = patch.period {
            record.period = period;
        }
        if let Some((enc_secret, nonce)) = patch.enc_secret {
            record.enc_secret = enc_secret;
            record.nonce = nonce;
        }
        record.updated_at = now_ms().max(record.updated_at);

        let rows = conn.execute(
            "UPDATE accounts
             SET label = ?1, issuer = ?2, alg = ?3, digits = ?4, period = ?5,
                 enc_secret = ?6, iv = ?7, updated_at = ?8
             WHERE id = ?9",
            params![
                record.label,
                record.issuer,
                record.algorithm.as_str(),
                record.digits.value(),
                record.period,
                record.enc_secret,
                record.nonce.as_slice(),
                record.updated_at,
                id,
            ],
        )?;

        if rows == 0 {
            return Err(VaultError::RecordNotFound { id: id.to_string() });
        }

        tracing::info!(id = %id, "updated account record");
        Ok(record)
    }

    /// Remove a record. Idempotent: deleting an absent id is not an error.
    pub fn delete(&self, id: &str) -> Result<()> {
        let rows = self
            .conn()
            .execute("DELETE FROM accounts WHERE id = ?1", params![id])?;
        if rows > 0 {
            tracing::info!(id = %id, "deleted account record");
        }
        Ok(())
    }

    /// All records, ascending by display order. Ties keep insertion order
    /// (uuid v7 ids are time-ordered, so sorting by id is sorting by
    /// creation).
    pub fn list(&self) -> Result<Vec<StoredRecord>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, label, issuer, alg, digits, period, enc_secret, iv,
                    created_at, updated_at, display_order
             FROM accounts
             ORDER BY display_order ASC, id ASC",
        )?;

        let rows = stmt.query_map([], RecordRow::from_sql_row)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?.into_record()?);
        }

        tracing::debug!(count = records.len(), "listed account records");
        Ok(records)
    }

    /// Apply display-order updates in one transaction. Ids that no longer
    /// exist are skipped; the rest of the batch still applies.
    pub fn reorder(&self, moves: &[(String, i64)]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        for (id, new_order) in moves {
            let rows = tx.execute(
                "UPDATE accounts SET display_order = ?1 WHERE id = ?2",
                params![new_order, id],
            )?;
            if rows == 0 {
                tracing::warn!(id = %id, "reorder target missing, skipped");
            }
        }

        tx.commit()?;
        Ok(())
    }

    // -- Meta table ---------------------------------------------------------

    /// Read a meta value.
    pub fn meta_get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let value = self
            .conn()
            .query_row(
                "SELECT value FROM meta WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Write (or overwrite) a meta value.
    pub fn meta_put(&self, key: &str, value: &[u8]) -> Result<()> {
        self.conn().execute(
            "INSERT INTO meta (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    // -- Wipe ---------------------------------------------------------------

    /// Empty both namespaces. Only called from an explicit, user-confirmed
    /// wipe, since this destroys the device key along with every record.
    pub fn clear_all(&self) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM accounts", [])?;
        tx.execute("DELETE FROM meta", [])?;
        tx.commit()?;

        tracing::warn!("vault wiped: all records and meta destroyed");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Internal row type (keeps rusqlite details out of the public structs)
// ---------------------------------------------------------------------------

struct RecordRow {
    id: String,
    label: String,
    issuer: Option<String>,
    alg: String,
    digits: i64,
    period: i64,
    enc_secret: Vec<u8>,
    iv: Vec<u8>,
    created_at: i64,
    updated_at: i64,
    display_order: i64,
}

impl RecordRow {
    fn from_sql_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            label: row.get(1)?,
            issuer: row.get(2)?,
            alg: row.get(3)?,
            digits: row.get(4)?,
            period: row.get(5)?,
            enc_secret: row.get(6)?,
            iv: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
            display_order: row.get(10)?,
        })
    }

    fn into_record(self) -> Result<StoredRecord> {
        let algorithm =
            OtpAlgorithm::parse(&self.alg).ok_or_else(|| VaultError::Corrupted {
                reason: format!("unknown algorithm {:?} in record {}", self.alg, self.id),
            })?;

        let nonce: [u8; NONCE_LEN] =
            self.iv
                .as_slice()
                .try_into()
                .map_err(|_| VaultError::Corrupted {
                    reason: format!(
                        "nonce is {} bytes in record {}, expected {NONCE_LEN}",
                        self.iv.len(),
                        self.id
                    ),
                })?;

        Ok(StoredRecord {
            id: self.id,
            label: self.label,
            issuer: self.issuer,
            algorithm,
            digits: if self.digits == 8 {
                OtpDigits::Eight
            } else {
                OtpDigits::Six
            },
            period: self.period as u32,
            enc_secret: self.enc_secret,
            nonce,
            created_at: self.created_at,
            updated_at: self.updated_at,
            display_order: self.display_order,
        })
    }
}

/// Current wall-clock time as epoch milliseconds.
pub(crate) fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
