//! One-time password pipeline for Latchkey.
//!
//! This crate holds everything that turns external input into verified secret
//! material and secret material into numeric codes. It performs no I/O and
//! keeps no state; persistence and encryption live in `latchkey-vault`.
//!
//! # Modules
//!
//! - [`base32`] — RFC 4648 Base32 decoding/encoding of shared secrets.
//! - [`uri`] — otpauth URI parsing and manual form-entry normalization.
//! - [`descriptor`] — plaintext credential descriptor types.
//! - [`engine`] — RFC 4226 HOTP / RFC 6238 TOTP code generation.
//! - [`error`] — unified error type.
//!
//! # Quick Start
//!
//! ```rust
//! use latchkey_otp::uri;
//! use latchkey_otp::engine;
//!
//! # fn example() -> Result<(), latchkey_otp::OtpError> {
//! let desc = uri::parse("otpauth://totp/Example:alice?secret=JBSWY3DPEHPK3PXP")?;
//! let window = engine::window(
//!     desc.secret.as_bytes(),
//!     desc.period,
//!     desc.digits,
//!     desc.algorithm,
//!     1_700_000_000_000,
//! );
//! assert_eq!(window.current.len(), 6);
//! # Ok(())
//! # }
//! ```

pub mod base32;
pub mod descriptor;
pub mod engine;
pub mod error;
pub mod uri;

// Re-export the most commonly used types at the crate root for convenience.
pub use descriptor::{Descriptor, OtpAlgorithm, OtpDigits, SecretBytes};
pub use engine::CodeWindow;
pub use error::{OtpError, Result};
