//! Webhook signature verification and outbound signing.
//!
//! Header format: `t=<unix seconds>,v1=<hex hmac>[,v1=...]`. The signed
//! message is `"{t}.{payload}"` under HMAC-SHA256 with the endpoint secret.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use paycore_types::ProcessorError;

type HmacSha256 = Hmac<Sha256>;

/// Accepted clock skew between the signer and us, in seconds.
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// Scheme tag of live signatures.
pub const LIVE_SCHEME: &str = "v1";
/// Scheme tag used in non-live mode; never accepted by live verifiers.
pub const TEST_SCHEME: &str = "v0";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub timestamp: i64,
    pub signatures: Vec<String>,
}

/// Parses a signature header, keeping only `scheme` signatures.
pub fn parse_header(header: &str, scheme: &str) -> Result<SignatureHeader, ProcessorError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => {
                timestamp = Some(value.parse::<i64>().map_err(|_| {
                    ProcessorError::SignatureMismatch("invalid timestamp".into())
                })?);
            }
            k if k == scheme => signatures.push(value.to_string()),
            _ => {}
        }
    }

    match timestamp {
        Some(timestamp) if !signatures.is_empty() => Ok(SignatureHeader {
            timestamp,
            signatures,
        }),
        _ => Err(ProcessorError::SignatureMismatch(
            "invalid signature header format".into(),
        )),
    }
}

/// Hex HMAC-SHA256 of `"{timestamp}.{payload}"`.
pub fn compute_signature(payload: &[u8], timestamp: i64, secret: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Checks `header` against `payload` at time `now`.
pub fn verify(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance_secs: i64,
    now: i64,
) -> Result<(), ProcessorError> {
    let parsed = parse_header(header, LIVE_SCHEME)?;

    if (now - parsed.timestamp).abs() > tolerance_secs {
        return Err(ProcessorError::SignatureMismatch(
            "timestamp outside tolerance window".into(),
        ));
    }

    let expected = compute_signature(payload, parsed.timestamp, secret);
    let matched = parsed
        .signatures
        .iter()
        .any(|candidate| bool::from(expected.as_bytes().ct_eq(candidate.as_bytes())));

    if matched {
        Ok(())
    } else {
        Err(ProcessorError::SignatureMismatch(
            "no matching signature".into(),
        ))
    }
}

/// Builds a signature header for an outbound payload.
pub fn sign(payload: &[u8], secret: &str, timestamp: i64, livemode: bool) -> String {
    let scheme = if livemode { LIVE_SCHEME } else { TEST_SCHEME };
    format!(
        "t={},{}={}",
        timestamp,
        scheme,
        compute_signature(payload, timestamp, secret)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";
    const NOW: i64 = 1_700_000_000;

    #[test]
    fn test_parse_header() {
        let parsed = parse_header("t=1609459200,v1=abcdef,v0=ignored", LIVE_SCHEME).unwrap();
        assert_eq!(parsed.timestamp, 1_609_459_200);
        assert_eq!(parsed.signatures, vec!["abcdef".to_string()]);
    }

    #[test]
    fn test_parse_header_invalid() {
        assert!(parse_header("invalid", LIVE_SCHEME).is_err());
        assert!(parse_header("t=12", LIVE_SCHEME).is_err());
        assert!(parse_header("t=abc,v1=ff", LIVE_SCHEME).is_err());
    }

    #[test]
    fn test_sign_then_verify() {
        let payload = br#"{"id":"evt_1"}"#;
        let header = sign(payload, SECRET, NOW, true);

        assert!(verify(payload, &header, SECRET, DEFAULT_TOLERANCE_SECS, NOW + 10).is_ok());
        assert!(verify(b"tampered", &header, SECRET, DEFAULT_TOLERANCE_SECS, NOW).is_err());
        assert!(verify(payload, &header, "other", DEFAULT_TOLERANCE_SECS, NOW).is_err());
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let payload = br#"{"id":"evt_1"}"#;
        let header = sign(payload, SECRET, NOW, true);

        let result = verify(payload, &header, SECRET, DEFAULT_TOLERANCE_SECS, NOW + 301);
        assert!(matches!(result, Err(ProcessorError::SignatureMismatch(_))));
    }

    #[test]
    fn test_test_mode_signature_never_verifies_as_live() {
        let payload = br#"{"id":"evt_1"}"#;
        let header = sign(payload, SECRET, NOW, false);

        assert!(header.contains(",v0="));
        assert!(verify(payload, &header, SECRET, DEFAULT_TOLERANCE_SECS, NOW).is_err());
    }

    #[test]
    fn test_any_of_several_signatures_matches() {
        let payload = b"{}";
        let good = compute_signature(payload, NOW, SECRET);
        let header = format!("t={},v1=deadbeef,v1={}", NOW, good);

        assert!(verify(payload, &header, SECRET, DEFAULT_TOLERANCE_SECS, NOW).is_ok());
    }
}
