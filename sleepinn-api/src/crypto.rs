use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("malformed signature header")]
    Malformed,
    #[error("signature timestamp outside tolerance")]
    Stale,
    #[error("no matching signature")]
    Mismatch,
}

fn keyed(secret: &str, timestamp: i64, payload: &[u8]) -> Result<HmacSha256, SignatureError> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::Malformed)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

/// Builds a `t=<unix>,v1=<hex>` header the way the provider signs webhooks.
pub fn signature_header(secret: &str, timestamp: i64, payload: &[u8]) -> Result<String, SignatureError> {
    let digest = keyed(secret, timestamp, payload)?.finalize().into_bytes();
    Ok(format!("t={},v1={}", timestamp, hex::encode(digest)))
}

/// Checks a webhook signature header against the raw request body.
///
/// The header may carry several `v1` entries during secret rotation; any one
/// matching is enough. Returns the signed timestamp.
pub fn verify_signature(
    header: &str,
    payload: &[u8],
    secret: &str,
    now: i64,
    tolerance_seconds: i64,
) -> Result<i64, SignatureError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => {
                timestamp = Some(value.parse::<i64>().map_err(|_| SignatureError::Malformed)?)
            }
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
    if signatures.is_empty() {
        return Err(SignatureError::Malformed);
    }
    // Skew that does not even fit in an i64 is as stale as it gets.
    let skew = now.checked_sub(timestamp).map(i64::unsigned_abs);
    if !skew.is_some_and(|skew| skew <= tolerance_seconds.unsigned_abs()) {
        return Err(SignatureError::Stale);
    }

    let mac = keyed(secret, timestamp, payload)?;
    let matched = signatures
        .iter()
        .filter_map(|sig| hex::decode(sig).ok())
        .any(|bytes| mac.clone().verify_slice(&bytes).is_ok());

    if matched {
        Ok(timestamp)
    } else {
        Err(SignatureError::Mismatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";
    const BODY: &[u8] = br#"{"id":"evt_1"}"#;

    #[test]
    fn test_accepts_own_signature() {
        let header = signature_header(SECRET, 1_700_000_000, BODY).unwrap();
        assert_eq!(
            verify_signature(&header, BODY, SECRET, 1_700_000_010, 300),
            Ok(1_700_000_000)
        );
    }

    #[test]
    fn test_rejects_tampered_body() {
        let header = signature_header(SECRET, 1_700_000_000, BODY).unwrap();
        assert_eq!(
            verify_signature(&header, br#"{"id":"evt_2"}"#, SECRET, 1_700_000_000, 300),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_rejects_wrong_secret() {
        let header = signature_header("whsec_other", 1_700_000_000, BODY).unwrap();
        assert_eq!(
            verify_signature(&header, BODY, SECRET, 1_700_000_000, 300),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_rejects_stale_timestamp() {
        let header = signature_header(SECRET, 1_700_000_000, BODY).unwrap();
        assert_eq!(
            verify_signature(&header, BODY, SECRET, 1_700_000_301, 300),
            Err(SignatureError::Stale)
        );
    }

    #[test]
    fn test_extreme_timestamps_are_stale() {
        for header in [
            "t=-9223372036854775808,v1=aa",
            "t=9223372036854775807,v1=aa",
        ] {
            assert_eq!(
                verify_signature(header, BODY, SECRET, 1_700_000_000, 300),
                Err(SignatureError::Stale),
                "{header}"
            );
        }
        assert_eq!(
            verify_signature("t=0,v1=aa", BODY, SECRET, i64::MIN, 300),
            Err(SignatureError::Stale)
        );
    }

    #[test]
    fn test_any_rotated_signature_matches() {
        let good = signature_header(SECRET, 1_700_000_000, BODY).unwrap();
        let v1 = good.split_once("v1=").unwrap().1;
        let header = format!("t=1700000000,v1=deadbeef,v1={v1}");
        assert!(verify_signature(&header, BODY, SECRET, 1_700_000_000, 300).is_ok());
    }

    #[test]
    fn test_malformed_headers() {
        for header in ["", "v1=abc", "t=abc,v1=abc", "t=1700000000"] {
            assert_eq!(
                verify_signature(header, BODY, SECRET, 1_700_000_000, 300),
                Err(SignatureError::Malformed),
                "{header}"
            );
        }
    }
}
