//! OTP pipeline error types.
//!
//! Parsing and decoding failures are always surfaced synchronously; no
//! function in this crate produces a partial result alongside an error.

/// Unified error type for the Latchkey OTP pipeline.
#[derive(Debug, thiserror::Error)]
pub enum OtpError {
    /// The Base32 input contained a character outside the RFC 4648 alphabet.
    #[error("invalid Base32 character: {0:?}")]
    InvalidCharacter(char),

    /// The otpauth URI could not be parsed at all (bad syntax, wrong scheme,
    /// missing authority).
    #[error("malformed otpauth URI")]
    MalformedUri,

    /// The URI names an OTP type other than `totp` (e.g. `hotp`).
    #[error("unsupported OTP type: {0}")]
    UnsupportedType(String),

    /// The URI carries no `secret` query parameter.
    #[error("otpauth URI is missing the secret parameter")]
    MissingSecret,
}

/// Convenience alias used throughout the OTP crate.
pub type Result<T> = std::result::Result<T, OtpError>;
