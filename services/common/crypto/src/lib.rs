use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Prefix carried by the signature header value.
pub const SIGNATURE_PREFIX: &str = "sha256=";

/// Errors produced while checking a webhook delivery signature.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature header missing or empty")]
    MissingSignature,
    #[error("timestamp header missing or not a unix epoch integer")]
    InvalidTimestamp,
    #[error("timestamp outside allowed skew window ({skew_secs}s)")]
    SkewExceeded { skew_secs: i64 },
    #[error("signature mismatch")]
    Mismatch,
    #[error("invalid HMAC key")]
    InvalidKey,
}

/// Canonical string signed by the payment provider: the delivery timestamp
/// and a digest of the raw body, never the parsed payload.
pub fn canonical_string(ts: i64, body: &[u8]) -> String {
    let body_hash = format!("{:x}", Sha256::digest(body));
    format!("ts:{ts}\nbody_sha256:{body_hash}")
}

/// Produce the signature header value for a delivery. Used by provider
/// stubs and by tests to build valid deliveries.
pub fn sign(secret: &[u8], ts: i64, body: &[u8]) -> Result<String, SignatureError> {
    let mut mac =
        <HmacSha256 as Mac>::new_from_slice(secret).map_err(|_| SignatureError::InvalidKey)?;
    mac.update(canonical_string(ts, body).as_bytes());
    Ok(format!(
        "{SIGNATURE_PREFIX}{}",
        hex::encode(mac.finalize().into_bytes())
    ))
}

/// Verify a delivery signature in constant time and enforce the timestamp
/// skew window. `now` is the receiver's clock in unix epoch seconds.
pub fn verify(
    secret: &[u8],
    ts_header: &str,
    signature_header: &str,
    body: &[u8],
    now: i64,
    max_skew_secs: i64,
) -> Result<(), SignatureError> {
    if signature_header.is_empty() {
        return Err(SignatureError::MissingSignature);
    }
    let ts: i64 = ts_header
        .trim()
        .parse()
        .map_err(|_| SignatureError::InvalidTimestamp)?;
    if (now - ts).abs() > max_skew_secs {
        return Err(SignatureError::SkewExceeded {
            skew_secs: max_skew_secs,
        });
    }

    let expected = sign(secret, ts, body)?;
    let provided = signature_header
        .strip_prefix(SIGNATURE_PREFIX)
        .unwrap_or(signature_header);
    let expected_hex = expected
        .strip_prefix(SIGNATURE_PREFIX)
        .unwrap_or(expected.as_str());
    if expected_hex.as_bytes().ct_eq(provided.as_bytes()).unwrap_u8() != 1 {
        return Err(SignatureError::Mismatch);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"whsec_test_secret";

    #[test]
    fn round_trip_signature_verifies() {
        let body = br#"{"event_id":"evt_1"}"#;
        let sig = sign(SECRET, 1_700_000_000, body).expect("sign");
        verify(SECRET, "1700000000", &sig, body, 1_700_000_010, 300).expect("verify");
    }

    #[test]
    fn tampered_body_rejected() {
        let sig = sign(SECRET, 1_700_000_000, b"original").expect("sign");
        let err = verify(SECRET, "1700000000", &sig, b"tampered", 1_700_000_000, 300).unwrap_err();
        assert_eq!(err, SignatureError::Mismatch);
    }

    #[test]
    fn wrong_secret_rejected() {
        let body = b"payload";
        let sig = sign(b"other_secret", 1_700_000_000, body).expect("sign");
        let err = verify(SECRET, "1700000000", &sig, body, 1_700_000_000, 300).unwrap_err();
        assert_eq!(err, SignatureError::Mismatch);
    }

    #[test]
    fn skew_window_enforced() {
        let body = b"payload";
        let sig = sign(SECRET, 1_700_000_000, body).expect("sign");
        let err = verify(SECRET, "1700000000", &sig, body, 1_700_000_000 + 301, 300).unwrap_err();
        assert!(matches!(err, SignatureError::SkewExceeded { .. }));
    }

    #[test]
    fn garbage_timestamp_rejected() {
        let err = verify(SECRET, "not-a-ts", "sha256=00", b"x", 0, 300).unwrap_err();
        assert_eq!(err, SignatureError::InvalidTimestamp);
    }

    #[test]
    fn unprefixed_signature_accepted() {
        let body = b"payload";
        let sig = sign(SECRET, 42, body).expect("sign");
        let raw = sig.strip_prefix(SIGNATURE_PREFIX).unwrap();
        verify(SECRET, "42", raw, body, 42, 300).expect("verify");
    }
}
