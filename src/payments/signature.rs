//! Webhook signature verification.
//!
//! Header format: `t=<unix seconds>,v1=<hex hmac>[,v1=<hex hmac>...]`. The MAC
//! is HMAC-SHA256 over `"<t>." ++ raw body`, keyed by the endpoint secret.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "stripe-signature";

#[derive(Clone, Debug)]
pub struct WebhookVerifier {
    secret: String,
    tolerance: Duration,
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<String>, tolerance: Duration) -> Self {
        Self { secret: secret.into(), tolerance }
    }

    pub fn verify(&self, payload: &[u8], signature: &str) -> bool {
        verify_webhook_signature(payload, signature, &self.secret, self.tolerance, Utc::now())
    }
}

/// True when any `v1` entry is a valid MAC of the payload and `t` is within
/// `tolerance` of `now`.
pub fn verify_webhook_signature(
    payload: &[u8],
    signature: &str,
    secret: &str,
    tolerance: Duration,
    now: DateTime<Utc>,
) -> bool {
    let mut timestamp = None;
    let mut candidates = Vec::new();
    for part in signature.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => candidates.push(value),
            _ => {}
        }
    }

    let Some(timestamp) = timestamp else { return false };
    if now.timestamp().abs_diff(timestamp) > tolerance.as_secs() {
        return false;
    }

    candidates.into_iter().filter_map(|c| hex::decode(c).ok()).any(|expected| {
        signed_mac(payload, secret, timestamp).is_some_and(|mac| mac.verify_slice(&expected).is_ok())
    })
}

/// Builds a header value for `payload`; the inverse of verification.
pub fn sign_payload(payload: &[u8], secret: &str, at: DateTime<Utc>) -> Option<String> {
    let timestamp = at.timestamp();
    let mac = signed_mac(payload, secret, timestamp)?;
    Some(format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes())))
}

fn signed_mac(payload: &[u8], secret: &str, timestamp: i64) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Some(mac)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";
    const TOLERANCE: Duration = Duration::from_secs(300);

    #[test]
    fn accepts_own_signature() {
        let now = Utc::now();
        let header = sign_payload(b"{\"type\":\"x\"}", SECRET, now).unwrap();
        assert!(verify_webhook_signature(b"{\"type\":\"x\"}", &header, SECRET, TOLERANCE, now));
    }

    #[test]
    fn rejects_tampered_payload_and_wrong_secret() {
        let now = Utc::now();
        let header = sign_payload(b"original", SECRET, now).unwrap();
        assert!(!verify_webhook_signature(b"tampered", &header, SECRET, TOLERANCE, now));
        assert!(!verify_webhook_signature(b"original", &header, "other", TOLERANCE, now));
    }

    #[test]
    fn rejects_stale_timestamp() {
        let then = Utc::now() - chrono::Duration::seconds(301);
        let header = sign_payload(b"body", SECRET, then).unwrap();
        assert!(!verify_webhook_signature(b"body", &header, SECRET, TOLERANCE, Utc::now()));
    }

    #[test]
    fn any_v1_entry_may_match() {
        let now = Utc::now();
        let valid = sign_payload(b"body", SECRET, now).unwrap();
        let rotated = format!("{},v1=deadbeef", valid);
        let reordered = format!("v1=00ff,{}", valid);
        assert!(verify_webhook_signature(b"body", &rotated, SECRET, TOLERANCE, now));
        assert!(verify_webhook_signature(b"body", &reordered, SECRET, TOLERANCE, now));
    }

    #[test]
    fn rejects_malformed_headers() {
        let now = Utc::now();
        for header in ["", "garbage", "t=abc,v1=00", "v1=00", "t=-9223372036854775808,v1=00", "t=9223372036854775807,v1=00"] {
            assert!(!verify_webhook_signature(b"body", header, SECRET, TOLERANCE, now));
        }
    }
}
