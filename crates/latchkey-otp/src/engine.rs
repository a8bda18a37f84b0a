//! RFC 4226 HOTP / RFC 6238 TOTP code generation.
//!
//! Everything here is a pure function of explicit inputs, with no clocks and
//! no state, so calls are trivially safe to run concurrently. Timestamps are
//! epoch milliseconds; the counter is the full 64-bit range RFC 4226
//! requires.

use ring::hmac;

use crate::descriptor::{OtpAlgorithm, OtpDigits};

/// Codes for the time steps adjacent to `timestamp_ms`, plus countdown state.
///
/// Displaying the previous and next codes lets the presentation layer smooth
/// over clock skew without re-deriving anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeWindow {
    /// Code for `step - 1`.
    pub previous: String,
    /// Code for the current step.
    pub current: String,
    /// Code for `step + 1`.
    pub next: String,
    /// Seconds until the current code expires, in `[0, period - 1]`.
    /// Display layers show `remaining_seconds + 1` as the countdown.
    pub remaining_seconds: u32,
    /// The time step the current code was derived from.
    pub step: u64,
}

/// Integer time step for a timestamp: `floor(floor(ms / 1000) / period)`.
pub fn step_index(timestamp_ms: u64, period: u32) -> u64 {
    (timestamp_ms / 1000) / u64::from(period)
}

/// Seconds left in the current step, always in `[0, period - 1]`.
pub fn seconds_remaining(timestamp_ms: u64, period: u32) -> u32 {
    let elapsed = ((timestamp_ms / 1000) % u64::from(period)) as u32;
    period - elapsed - 1
}

/// Generate the code for one counter value (RFC 4226 §5).
///
/// The counter is encoded as 8 big-endian bytes and keyed-hashed with the
/// secret; dynamic truncation (§5.3) then reduces the hash to `digits`
/// decimal digits, left-padded with zeros.
pub fn code_for_step(
    secret: &[u8],
    step: u64,
    digits: OtpDigits,
    algorithm: OtpAlgorithm,
) -> String {
    let alg = match algorithm {
        OtpAlgorithm::Sha1 => hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY,
        OtpAlgorithm::Sha256 => hmac::HMAC_SHA256,
    };

    let key = hmac::Key::new(alg, secret);
    let tag = hmac::sign(&key, &step.to_be_bytes());
    let mac = tag.as_ref();

    // Dynamic truncation: low nibble of the final byte selects a 4-byte
    // window; the sign bit is forced to zero.
    let offset = usize::from(mac[mac.len() - 1] & 0x0f);
    let binary = u32::from_be_bytes([
        mac[offset] & 0x7f,
        mac[offset + 1],
        mac[offset + 2],
        mac[offset + 3],
    ]);

    let code = binary % digits.modulus();
    let width = digits.value() as usize;
    format!("{code:0width$}")
}

/// Compute the previous/current/next codes around `timestamp_ms`.
///
/// At step 0 the previous step saturates, so `previous == current` at the
/// epoch edge rather than wrapping the counter.
pub fn window(
    secret: &[u8],
    period: u32,
    digits: OtpDigits,
    algorithm: OtpAlgorithm,
    timestamp_ms: u64,
) -> CodeWindow {
    let step = step_index(timestamp_ms, period);

    CodeWindow {
        previous: code_for_step(secret, step.saturating_sub(1), digits, algorithm),
        current: code_for_step(secret, step, digits, algorithm),
        next: code_for_step(secret, step + 1, digits, algorithm),
        remaining_seconds: seconds_remaining(timestamp_ms, period),
        step,
    }
}
