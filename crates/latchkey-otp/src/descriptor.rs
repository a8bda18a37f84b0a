//! Plaintext credential descriptor types.
//!
//! A [`Descriptor`] is the ephemeral, in-memory form of an account: what the
//! URI parser and manual entry produce, and what the vault encrypts before
//! anything touches disk. The secret bytes live in a [`SecretBytes`] buffer
//! that is zeroized on drop and never printed by `Debug`.

use serde::Serialize;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Hash algorithm used for HMAC-based code generation.
///
/// SHA-1 is the interoperability default; SHA-256 is the only other variant
/// issuers use in practice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OtpAlgorithm {
    #[serde(rename = "SHA-1")]
    Sha1,
    #[serde(rename = "SHA-256")]
    Sha256,
}

impl OtpAlgorithm {
    /// Canonical string form, as persisted in the vault schema.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sha1 => "SHA-1",
            Self::Sha256 => "SHA-256",
        }
    }

    /// Parse the canonical persisted form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "SHA-1" => Some(Self::Sha1),
            "SHA-256" => Some(Self::Sha256),
            _ => None,
        }
    }

    /// Normalize free-form input from URIs or manual entry.
    ///
    /// Unrecognized values fall back to SHA-1. This is an intentional
    /// compatibility choice: issuers emit all kinds of junk in the
    /// `algorithm` parameter and a hard error would reject working accounts.
    pub fn normalize(s: &str) -> Self {
        let canon: String = s
            .chars()
            .filter(|c| *c != '-')
            .map(|c| c.to_ascii_uppercase())
            .collect();
        match canon.as_str() {
            "SHA256" => Self::Sha256,
            _ => Self::Sha1,
        }
    }
}

impl std::fmt::Display for OtpAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Number of digits in a generated code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpDigits {
    Six,
    Eight,
}

impl Serialize for OtpDigits {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.value())
    }
}

impl OtpDigits {
    /// The numeric digit count.
    pub const fn value(self) -> u32 {
        match self {
            Self::Six => 6,
            Self::Eight => 8,
        }
    }

    /// The truncation modulus, `10^digits`.
    pub const fn modulus(self) -> u32 {
        match self {
            Self::Six => 1_000_000,
            Self::Eight => 100_000_000,
        }
    }

    /// Normalize free-form input: anything other than 8 becomes 6.
    pub fn normalize(value: u32) -> Self {
        if value == 8 { Self::Eight } else { Self::Six }
    }
}

/// Lower bound for the TOTP period, in seconds.
pub const MIN_PERIOD: u32 = 5;
/// Upper bound for the TOTP period, in seconds.
pub const MAX_PERIOD: u32 = 300;
/// Default TOTP period when none is supplied (RFC 6238 §4).
pub const DEFAULT_PERIOD: u32 = 30;

/// Clamp a period into the accepted `[5, 300]` range.
///
/// Out-of-range values from URIs are sanitized rather than rejected.
pub fn clamp_period(period: u32) -> u32 {
    period.clamp(MIN_PERIOD, MAX_PERIOD)
}

/// Owned secret key material, zeroized on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SecretBytes(Vec<u8>);

impl SecretBytes {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretBytes")
            .field("len", &self.0.len())
            .finish_non_exhaustive()
    }
}

/// A fully normalized account descriptor, ready for code generation or
/// encryption.
///
/// Exists only in memory; the vault persists an encrypted record, never this.
#[derive(Debug, Clone)]
pub struct Descriptor {
    /// Display label, trimmed ("alice@example.com").
    pub label: String,
    /// Issuing service, trimmed ("Example"), when known.
    pub issuer: Option<String>,
    /// Raw decoded secret key.
    pub secret: SecretBytes,
    pub algorithm: OtpAlgorithm,
    pub digits: OtpDigits,
    /// Time step in seconds, always within `[5, 300]`.
    pub period: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn algorithm_normalization_is_lenient() {
        assert_eq!(OtpAlgorithm::normalize("SHA256"), OtpAlgorithm::Sha256);
        assert_eq!(OtpAlgorithm::normalize("sha-256"), OtpAlgorithm::Sha256);
        assert_eq!(OtpAlgorithm::normalize("SHA1"), OtpAlgorithm::Sha1);
        assert_eq!(OtpAlgorithm::normalize("SHA512"), OtpAlgorithm::Sha1);
        assert_eq!(OtpAlgorithm::normalize("MD5"), OtpAlgorithm::Sha1);
        assert_eq!(OtpAlgorithm::normalize(""), OtpAlgorithm::Sha1);
    }

    #[test]
    fn canonical_roundtrip() {
        for alg in [OtpAlgorithm::Sha1, OtpAlgorithm::Sha256] {
            assert_eq!(OtpAlgorithm::parse(alg.as_str()), Some(alg));
        }
        assert_eq!(OtpAlgorithm::parse("SHA-512"), None);
    }

    #[test]
    fn digits_normalization() {
        assert_eq!(OtpDigits::normalize(8), OtpDigits::Eight);
        assert_eq!(OtpDigits::normalize(6), OtpDigits::Six);
        assert_eq!(OtpDigits::normalize(7), OtpDigits::Six);
        assert_eq!(OtpDigits::normalize(0), OtpDigits::Six);
    }

    #[test]
    fn period_clamping() {
        assert_eq!(clamp_period(30), 30);
        assert_eq!(clamp_period(1), 5);
        assert_eq!(clamp_period(4), 5);
        assert_eq!(clamp_period(300), 300);
        assert_eq!(clamp_period(100_000), 300);
    }

    #[test]
    fn secret_debug_is_redacted() {
        let secret = SecretBytes::new(b"super secret".to_vec());
        let rendered = format!("{secret:?}");
        assert!(!rendered.contains("super"));
        assert!(rendered.contains("len"));
    }
}
