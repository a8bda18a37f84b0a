//! otpauth URI parsing and manual entry normalization.
//!
//! The `otpauth://` scheme is the de-facto enrollment format emitted by QR
//! codes: `otpauth://totp/<label>?secret=<base32>&issuer=...&algorithm=...`.
//! Parsing here is deliberately forgiving about everything except the parts
//! that matter: the type must be `totp` and a secret must be present.
//! Unknown algorithms, odd digit counts, and out-of-range periods are
//! normalized to working defaults instead of rejected, because issuers
//! routinely emit noncompliant parameters.

use percent_encoding::percent_decode_str;
use url::Url;

use crate::base32;
use crate::descriptor::{
    clamp_period, Descriptor, OtpAlgorithm, OtpDigits, SecretBytes, DEFAULT_PERIOD,
};
use crate::error::{OtpError, Result};

/// Parse an `otpauth://totp/...` URI into a normalized [`Descriptor`].
///
/// # Errors
///
/// - [`OtpError::MalformedUri`] for unparsable syntax, a non-`otpauth`
///   scheme, or a missing authority.
/// - [`OtpError::UnsupportedType`] when the authority segment is anything
///   other than `totp` (case-insensitive), counter-based `hotp` included.
/// - [`OtpError::MissingSecret`] when no `secret` parameter is present.
/// - [`OtpError::InvalidCharacter`] when the secret is not valid Base32.
pub fn parse(uri: &str) -> Result<Descriptor> {
    let url = Url::parse(uri).map_err(|_| OtpError::MalformedUri)?;

    if !url.scheme().eq_ignore_ascii_case("otpauth") {
        return Err(OtpError::MalformedUri);
    }

    let otp_type = url.host_str().ok_or(OtpError::MalformedUri)?;
    if !otp_type.eq_ignore_ascii_case("totp") {
        return Err(OtpError::UnsupportedType(otp_type.to_ascii_lowercase()));
    }

    let (mut label, mut issuer) = split_label(&decode_path(url.path()));

    let mut secret: Option<SecretBytes> = None;
    let mut algorithm = OtpAlgorithm::Sha1;
    let mut digits = OtpDigits::Six;
    let mut period = DEFAULT_PERIOD;

    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "secret" => secret = Some(SecretBytes::new(base32::decode(&value)?)),
            "issuer" => {
                let value = value.trim();
                if !value.is_empty() {
                    issuer = Some(value.to_string());
                }
            }
            "algorithm" => algorithm = OtpAlgorithm::normalize(&value),
            "digits" => {
                digits = value
                    .trim()
                    .parse::<u32>()
                    .map(OtpDigits::normalize)
                    .unwrap_or(OtpDigits::Six);
            }
            "period" => period = normalize_period(&value),
            _ => {}
        }
    }

    let secret = secret.ok_or(OtpError::MissingSecret)?;

    if label.is_empty() {
        // Fall back to the issuer so the account still has a display name.
        label = issuer.clone().unwrap_or_default();
    }

    tracing::debug!(
        label = %label,
        issuer = issuer.as_deref().unwrap_or("-"),
        %algorithm,
        digits = digits.value(),
        period,
        "parsed otpauth URI"
    );

    Ok(Descriptor {
        label,
        issuer,
        secret,
        algorithm,
        digits,
        period,
    })
}

/// Build a [`Descriptor`] from manual form input.
///
/// Applies the same normalization as [`parse`]: trimmed label and issuer,
/// Base32 secret decoding, lenient algorithm/digits handling, period clamped
/// to `[5, 300]`.
///
/// # Errors
///
/// Returns [`OtpError::InvalidCharacter`] if the secret is not valid Base32.
pub fn manual_entry(
    label: &str,
    issuer: Option<&str>,
    secret_base32: &str,
    algorithm: &str,
    digits: u32,
    period: u32,
) -> Result<Descriptor> {
    let issuer = issuer
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    Ok(Descriptor {
        label: label.trim().to_string(),
        issuer,
        secret: SecretBytes::new(base32::decode(secret_base32)?),
        algorithm: OtpAlgorithm::normalize(algorithm),
        digits: OtpDigits::normalize(digits),
        period: clamp_period(period),
    })
}

/// Percent-decode the URI path and strip the leading slash.
fn decode_path(path: &str) -> String {
    let path = path.strip_prefix('/').unwrap_or(path);
    percent_decode_str(path).decode_utf8_lossy().into_owned()
}

/// Split a raw label of the form `Issuer:account` into issuer and label.
///
/// The issuer prefix is only honored when non-empty after trimming; a label
/// like `:alice` keeps the whole remainder as the label with no issuer.
fn split_label(raw: &str) -> (String, Option<String>) {
    match raw.split_once(':') {
        Some((candidate, rest)) => {
            let candidate = candidate.trim();
            if candidate.is_empty() {
                (rest.trim().to_string(), None)
            } else {
                (rest.trim().to_string(), Some(candidate.to_string()))
            }
        }
        None => (raw.trim().to_string(), None),
    }
}

/// Normalize a `period` query value: floor to an integer, clamp to `[5, 300]`,
/// default to 30 for anything non-numeric or non-finite.
fn normalize_period(value: &str) -> u32 {
    let parsed: f64 = match value.trim().parse() {
        Ok(v) => v,
        Err(_) => return DEFAULT_PERIOD,
    };
    if !parsed.is_finite() {
        return DEFAULT_PERIOD;
    }
    let floored = parsed.floor();
    let bounded = if floored < 0.0 {
        0
    } else if floored > f64::from(u32::MAX) {
        u32::MAX
    } else {
        floored as u32
    };
    clamp_period(bounded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_uri() {
        let desc = parse(
            "otpauth://totp/Example:alice@example.com?secret=JBSWY3DPEHPK3PXP&issuer=Example&algorithm=SHA256&digits=8&period=60",
        )
        .unwrap();

        assert_eq!(desc.label, "alice@example.com");
        assert_eq!(desc.issuer.as_deref(), Some("Example"));
        assert_eq!(desc.secret.as_bytes(), b"Hello!\xde\xad\xbe\xef");
        assert_eq!(desc.algorithm, OtpAlgorithm::Sha256);
        assert_eq!(desc.digits, OtpDigits::Eight);
        assert_eq!(desc.period, 60);
    }

    #[test]
    fn minimal_uri_gets_defaults() {
        let desc = parse("otpauth://totp/alice?secret=JBSWY3DP").unwrap();
        assert_eq!(desc.label, "alice");
        assert_eq!(desc.issuer, None);
        assert_eq!(desc.algorithm, OtpAlgorithm::Sha1);
        assert_eq!(desc.digits, OtpDigits::Six);
        assert_eq!(desc.period, 30);
    }

    #[test]
    fn label_issuer_split_from_path() {
        let desc = parse("otpauth://totp/GitHub:octocat?secret=JBSWY3DP").unwrap();
        assert_eq!(desc.issuer.as_deref(), Some("GitHub"));
        assert_eq!(desc.label, "octocat");
    }

    #[test]
    fn query_issuer_overrides_label_issuer() {
        let desc =
            parse("otpauth://totp/Old:alice?secret=JBSWY3DP&issuer=New").unwrap();
        assert_eq!(desc.issuer.as_deref(), Some("New"));
        assert_eq!(desc.label, "alice");
    }

    #[test]
    fn empty_query_issuer_keeps_label_issuer() {
        let desc = parse("otpauth://totp/Old:alice?secret=JBSWY3DP&issuer=").unwrap();
        assert_eq!(desc.issuer.as_deref(), Some("Old"));
    }

    #[test]
    fn empty_issuer_prefix_dropped() {
        let desc = parse("otpauth://totp/:alice?secret=JBSWY3DP").unwrap();
        assert_eq!(desc.issuer, None);
        assert_eq!(desc.label, "alice");
    }

    #[test]
    fn percent_encoded_label_decoded() {
        let desc =
            parse("otpauth://totp/Big%20Corp%3Aalice%40example.com?secret=JBSWY3DP").unwrap();
        assert_eq!(desc.issuer.as_deref(), Some("Big Corp"));
        assert_eq!(desc.label, "alice@example.com");
    }

    #[test]
    fn hotp_rejected() {
        let err = parse("otpauth://hotp/alice?secret=JBSWY3DP&counter=0").unwrap_err();
        assert!(matches!(err, OtpError::UnsupportedType(t) if t == "hotp"));
    }

    #[test]
    fn totp_type_case_insensitive() {
        assert!(parse("otpauth://TOTP/alice?secret=JBSWY3DP").is_ok());
    }

    #[test]
    fn wrong_scheme_rejected() {
        assert!(matches!(
            parse("https://totp/alice?secret=JBSWY3DP"),
            Err(OtpError::MalformedUri)
        ));
        assert!(matches!(parse("not a uri"), Err(OtpError::MalformedUri)));
    }

    #[test]
    fn missing_secret_rejected() {
        assert!(matches!(
            parse("otpauth://totp/alice?issuer=Example"),
            Err(OtpError::MissingSecret)
        ));
    }

    #[test]
    fn bad_secret_surfaces_codec_error() {
        assert!(matches!(
            parse("otpauth://totp/alice?secret=NOT!BASE32"),
            Err(OtpError::InvalidCharacter('!'))
        ));
    }

    #[test]
    fn unknown_algorithm_defaults_to_sha1() {
        let desc = parse("otpauth://totp/a?secret=JBSWY3DP&algorithm=SHA512").unwrap();
        assert_eq!(desc.algorithm, OtpAlgorithm::Sha1);
    }

    #[test]
    fn odd_digits_default_to_six() {
        let desc = parse("otpauth://totp/a?secret=JBSWY3DP&digits=7").unwrap();
        assert_eq!(desc.digits, OtpDigits::Six);
        let desc = parse("otpauth://totp/a?secret=JBSWY3DP&digits=banana").unwrap();
        assert_eq!(desc.digits, OtpDigits::Six);
    }

    #[test]
    fn period_is_sanitized_not_validated() {
        let cases = [
            ("1", 5),
            ("4.9", 5),
            ("29.7", 29),
            ("30", 30),
            ("301", 300),
            ("99999", 300),
            ("NaN", 30),
            ("inf", 30),
            ("-12", 5),
            ("soon", 30),
        ];
        for (input, expected) in cases {
            let uri = format!("otpauth://totp/a?secret=JBSWY3DP&period={input}");
            let desc = parse(&uri).unwrap();
            assert_eq!(desc.period, expected, "period={input}");
        }
    }

    #[test]
    fn manual_entry_normalizes() {
        let desc = manual_entry(
            "  alice  ",
            Some("  Example "),
            "jbsw y3dp==",
            "sha256",
            9,
            2,
        )
        .unwrap();
        assert_eq!(desc.label, "alice");
        assert_eq!(desc.issuer.as_deref(), Some("Example"));
        assert_eq!(desc.secret.as_bytes(), b"Hello");
        assert_eq!(desc.algorithm, OtpAlgorithm::Sha256);
        assert_eq!(desc.digits, OtpDigits::Six);
        assert_eq!(desc.period, 5);
    }

    #[test]
    fn manual_entry_blank_issuer_is_none() {
        let desc = manual_entry("alice", Some("   "), "JBSWY3DP", "SHA1", 6, 30).unwrap();
        assert_eq!(desc.issuer, None);
    }
}
