//! RFC 4648 Base32 codec for shared secrets.
//!
//! Authenticator secrets arrive as Base32 text copied out of enrollment pages
//! or embedded in otpauth URIs. Real-world input is messy: mixed case, spaces
//! inserted for readability, padding sometimes present and sometimes not.
//! [`decode`] accepts all of those variants and rejects only characters that
//! can never appear in a valid secret.

use crate::error::{OtpError, Result};

const ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// Decode Base32 text into raw secret bytes.
///
/// Whitespace anywhere and trailing `=` padding are stripped before decoding.
/// Decoding is case-insensitive and accepts any input length; a final group
/// of fewer than 8 accumulated bits is discarded rather than rejected, which
/// matches what standard encoders emit for non-padded output.
///
/// Empty input (after stripping) yields an empty byte vector.
///
/// # Errors
///
/// Returns [`OtpError::InvalidCharacter`] if any remaining character is
/// outside the 32-symbol alphabet. A `=` that is not trailing padding is
/// invalid.
pub fn decode(text: &str) -> Result<Vec<u8>> {
    let stripped: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    let stripped = stripped.trim_end_matches('=');

    let mut out = Vec::with_capacity(stripped.len() * 5 / 8);
    let mut buffer: u64 = 0;
    let mut bits: u32 = 0;

    for c in stripped.chars() {
        let value = match c.to_ascii_uppercase() {
            'A'..='Z' => c.to_ascii_uppercase() as u64 - 'A' as u64,
            '2'..='7' => c as u64 - '2' as u64 + 26,
            _ => return Err(OtpError::InvalidCharacter(c)),
        };

        buffer = (buffer << 5) | value;
        bits += 5;

        if bits >= 8 {
            bits -= 8;
            out.push((buffer >> bits) as u8);
        }
    }

    // Any leftover bits (< 8) are encoder padding, not data.
    Ok(out)
}

/// Encode raw bytes as unpadded RFC 4648 Base32.
///
/// Output uses the uppercase alphabet. [`decode`] accepts it unchanged, with
/// padding appended, or lowercased.
pub fn encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len().div_ceil(5) * 8);
    let mut buffer: u64 = 0;
    let mut bits: u32 = 0;

    for &byte in bytes {
        buffer = (buffer << 8) | u64::from(byte);
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(ALPHABET[((buffer >> bits) & 0x1f) as usize] as char);
        }
    }

    if bits > 0 {
        out.push(ALPHABET[((buffer << (5 - bits)) & 0x1f) as usize] as char);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_canonical_input() {
        assert_eq!(decode("JBSWY3DP").unwrap(), b"Hello");
    }

    #[test]
    fn whitespace_and_padding_are_equivalent() {
        let spaced = decode("JBSW Y3DP").unwrap();
        let padded = decode("jbswy3dp==").unwrap();
        assert_eq!(spaced, padded);
        assert_eq!(spaced, b"Hello");
    }

    #[test]
    fn lowercase_accepted() {
        assert_eq!(decode("jbswy3dp").unwrap(), decode("JBSWY3DP").unwrap());
    }

    #[test]
    fn empty_input_yields_empty_bytes() {
        assert_eq!(decode("").unwrap(), Vec::<u8>::new());
        assert_eq!(decode("  \t ").unwrap(), Vec::<u8>::new());
        assert_eq!(decode("====").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn invalid_character_rejected() {
        for bad in ["JBSW!3DP", "JBSW13DP", "JBSW03DP", "JBSW83DP"] {
            assert!(
                matches!(decode(bad), Err(OtpError::InvalidCharacter(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn interior_padding_rejected() {
        assert!(matches!(
            decode("JB==SWY3DP"),
            Err(OtpError::InvalidCharacter('='))
        ));
    }

    #[test]
    fn partial_trailing_group_discarded() {
        // "JBSWY3DPE" carries 45 bits: 5 full bytes plus 5 leftover bits.
        let bytes = decode("JBSWY3DPE").unwrap();
        assert_eq!(bytes, b"Hello");
    }

    #[test]
    fn roundtrip_against_reference_encoder() {
        let samples: [&[u8]; 6] = [
            b"",
            b"f",
            b"fo",
            b"foobar",
            b"12345678901234567890",
            &[0x00, 0xff, 0x10, 0x80, 0x7f],
        ];

        for sample in samples {
            // Our encoder round-trips.
            assert_eq!(decode(&encode(sample)).unwrap(), sample);

            // And we accept standard encoder output, padded and unpadded.
            let padded = data_encoding::BASE32.encode(sample);
            let unpadded = data_encoding::BASE32_NOPAD.encode(sample);
            assert_eq!(decode(&padded).unwrap(), sample);
            assert_eq!(decode(&unpadded).unwrap(), sample);
            assert_eq!(decode(&unpadded.to_lowercase()).unwrap(), sample);
        }
    }

    #[test]
    fn known_vector() {
        // The canonical demo secret used by most TOTP documentation.
        let bytes = decode("JBSWY3DPEHPK3PXP").unwrap();
        assert_eq!(bytes, b"Hello!\xde\xad\xbe\xef");
    }
}
