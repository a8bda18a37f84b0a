//! CLI entry point for Latchkey.
//!
//! This binary provides the `latchkey` command: a thin presentation layer
//! over the vault and OTP crates. It holds no algorithmic logic; every
//! operation maps onto a library call.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use latchkey_otp::uri;
use latchkey_vault::{Session, Vault};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// Latchkey: offline TOTP codes from an encrypted vault.
#[derive(Parser)]
#[command(
    name = "latchkey",
    version,
    about = "Offline authenticator: TOTP codes from an encrypted local vault",
    long_about = "Stores TOTP account secrets encrypted at rest (AES-256-GCM under a \
                  device-local key) and generates RFC 6238 codes. Fully offline; \
                  never makes a network call."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add an account from an otpauth:// URI or manual fields.
    Add {
        /// Full otpauth://totp/... URI (e.g. from a decoded QR code).
        #[arg(long, conflicts_with_all = ["label", "secret"])]
        uri: Option<String>,

        /// Account label (manual entry).
        #[arg(long, requires = "secret")]
        label: Option<String>,

        /// Base32 secret (manual entry).
        #[arg(long, requires = "label")]
        secret: Option<String>,

        /// Issuing service name.
        #[arg(long)]
        issuer: Option<String>,

        /// Hash algorithm: sha1 or sha256 (unrecognized values fall back to sha1).
        #[arg(long, default_value = "sha1")]
        algorithm: String,

        /// Code length: 6 or 8 (anything else falls back to 6).
        #[arg(long, default_value_t = 6)]
        digits: u32,

        /// Time step in seconds, clamped to 5..=300.
        #[arg(long, default_value_t = 30)]
        period: u32,
    },

    /// List accounts in display order (no codes, no secrets).
    List {
        /// Emit machine-readable JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Show current codes with a countdown.
    Codes {
        /// Refresh every second until interrupted.
        #[arg(long)]
        watch: bool,
    },

    /// Delete an account by id.
    Remove { id: String },

    /// Move an account to a new display position.
    Reorder { id: String, new_order: i64 },

    /// Destroy every account and the device key. Unrecoverable.
    Wipe {
        /// Required confirmation flag.
        #[arg(long)]
        yes: bool,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let cli = Cli::parse();
    let db_path = vault_path()?;

    match cli.command {
        Commands::Add {
            uri,
            label,
            secret,
            issuer,
            algorithm,
            digits,
            period,
        } => cmd_add(&db_path, uri, label, secret, issuer, &algorithm, digits, period),
        Commands::List { json } => cmd_list(&db_path, json),
        Commands::Codes { watch } => cmd_codes(&db_path, watch),
        Commands::Remove { id } => cmd_remove(&db_path, &id),
        Commands::Reorder { id, new_order } => cmd_reorder(&db_path, &id, new_order),
        Commands::Wipe { yes } => cmd_wipe(&db_path, yes),
    }
}

/// Resolve the vault database path: `$LATCHKEY_DATA_DIR` or `./data`.
fn vault_path() -> Result<PathBuf> {
    let dir = std::env::var_os("LATCHKEY_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("data"));
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create data directory {}", dir.display()))?;
    Ok(dir.join("latchkey.db"))
}

fn open_vault(db_path: &PathBuf) -> Result<Vault> {
    // A vault that cannot be opened is a degraded-functionality event, not a
    // panic: surface the error and let the shell report it.
    Vault::open(db_path).with_context(|| format!("failed to open vault at {}", db_path.display()))
}

fn now_ms() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

// ---------------------------------------------------------------------------
// Subcommands
// ---------------------------------------------------------------------------

#[allow(clippy::too_many_arguments)]
fn cmd_add(
    db_path: &PathBuf,
    uri: Option<String>,
    label: Option<String>,
    secret: Option<String>,
    issuer: Option<String>,
    algorithm: &str,
    digits: u32,
    period: u32,
) -> Result<()> {
    let descriptor = match (uri, label, secret) {
        (Some(uri), _, _) => uri::parse(&uri).context("invalid otpauth URI")?,
        (None, Some(label), Some(secret)) => {
            uri::manual_entry(&label, issuer.as_deref(), &secret, algorithm, digits, period)
                .context("invalid manual entry")?
        }
        _ => anyhow::bail!("provide either --uri or both --label and --secret"),
    };

    let mut session = Session::unlock(open_vault(db_path)?)?;
    let id = session.add_account(descriptor)?;
    session.lock();

    println!("added account {id}");
    Ok(())
}

fn cmd_list(db_path: &PathBuf, json: bool) -> Result<()> {
    let vault = open_vault(db_path)?;
    let records = vault.list()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("no accounts");
        return Ok(());
    }

    for record in records {
        let issuer = record.issuer.as_deref().unwrap_or("-");
        println!(
            "{}  {:<24} {:<16} {} {} digits / {}s",
            record.id, record.label, issuer, record.algorithm, record.digits.value(), record.period,
        );
    }
    Ok(())
}

fn cmd_codes(db_path: &PathBuf, watch: bool) -> Result<()> {
    let session = Session::unlock(open_vault(db_path)?)?;
    info!(accounts = session.entries().len(), "session unlocked");

    if session.entries().is_empty() {
        println!("no accounts, add one with `latchkey add`");
        return Ok(());
    }

    loop {
        // The refresh path reads only the decrypted in-memory cache; the
        // vault is not touched again until the session ends.
        for account in session.codes(now_ms()) {
            let issuer = account.issuer.as_deref().unwrap_or("-");
            println!(
                "{:<24} {:<16} {}  ({}s left)",
                account.label,
                issuer,
                account.window.current,
                account.window.remaining_seconds + 1,
            );
        }

        if !watch {
            break;
        }
        std::thread::sleep(std::time::Duration::from_secs(1));
        println!();
    }

    session.lock();
    Ok(())
}

fn cmd_remove(db_path: &PathBuf, id: &str) -> Result<()> {
    let vault = open_vault(db_path)?;
    vault.delete(id)?;
    println!("removed {id}");
    Ok(())
}

fn cmd_reorder(db_path: &PathBuf, id: &str, new_order: i64) -> Result<()> {
    let vault = open_vault(db_path)?;
    vault.reorder(&[(id.to_string(), new_order)])?;
    println!("moved {id} to position {new_order}");
    Ok(())
}

fn cmd_wipe(db_path: &PathBuf, yes: bool) -> Result<()> {
    if !yes {
        anyhow::bail!("refusing to wipe without --yes: this destroys all accounts permanently");
    }

    let session = Session::unlock(open_vault(db_path)?)?;
    session.wipe()?;
    println!("vault wiped");
    Ok(())
}
