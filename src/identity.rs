//! Signature verification for identity-provider (Clerk) webhooks.
//!
//! Clerk delivers webhooks through svix: the signed content is
//! `{msg_id}.{timestamp}.{body}`, the secret is base64 after a `whsec_`
//! prefix, and the signature header carries one or more space-separated
//! `v1,<base64 hmac>` candidates.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Maximum accepted clock skew between the provider and us
const TIMESTAMP_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, PartialEq, Eq)]
pub enum IdentityWebhookError {
    MissingHeader(&'static str),
    MalformedSecret,
    StaleTimestamp,
    SignatureMismatch,
}

impl std::fmt::Display for IdentityWebhookError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdentityWebhookError::MissingHeader(name) => write!(f, "missing header: {name}"),
            IdentityWebhookError::MalformedSecret => write!(f, "malformed webhook secret"),
            IdentityWebhookError::StaleTimestamp => write!(f, "webhook timestamp outside tolerance"),
            IdentityWebhookError::SignatureMismatch => write!(f, "webhook signature mismatch"),
        }
    }
}

impl std::error::Error for IdentityWebhookError {}

pub struct IdentityWebhookVerifier {
    key: Vec<u8>,
}

impl IdentityWebhookVerifier {
    pub fn new(secret: &str) -> Result<Self, IdentityWebhookError> {
        let encoded = secret.strip_prefix("whsec_").unwrap_or(secret);
        let key = BASE64
            .decode(encoded)
            .map_err(|_| IdentityWebhookError::MalformedSecret)?;
        Ok(Self { key })
    }

    /// Verify a webhook delivery against the raw body bytes
    pub fn verify(
        &self,
        msg_id: &str,
        timestamp: &str,
        signature_header: &str,
        body: &[u8],
    ) -> Result<(), IdentityWebhookError> {
        self.verify_at(msg_id, timestamp, signature_header, body, Utc::now().timestamp())
    }

    fn verify_at(
        &self,
        msg_id: &str,
        timestamp: &str,
        signature_header: &str,
        body: &[u8],
        now: i64,
    ) -> Result<(), IdentityWebhookError> {
        let ts: i64 = timestamp
            .parse()
            .map_err(|_| IdentityWebhookError::StaleTimestamp)?;
        if (now - ts).abs() > TIMESTAMP_TOLERANCE_SECS {
            return Err(IdentityWebhookError::StaleTimestamp);
        }

        // The header may list several versioned signatures; any v1 match passes
        for candidate in signature_header.split_whitespace() {
            let Some(encoded) = candidate.strip_prefix("v1,") else {
                continue;
            };
            let Ok(given) = BASE64.decode(encoded) else {
                continue;
            };
            let mut mac = HmacSha256::new_from_slice(&self.key)
                .map_err(|_| IdentityWebhookError::MalformedSecret)?;
            mac.update(msg_id.as_bytes());
            mac.update(b".");
            mac.update(timestamp.as_bytes());
            mac.update(b".");
            mac.update(body);
            if mac.verify_slice(&given).is_ok() {
                return Ok(());
            }
        }

        Err(IdentityWebhookError::SignatureMismatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_MfKQ9r8GKYqrTwjUPD8ILPZIo2LaLaSw";

    fn sign(secret: &str, msg_id: &str, timestamp: &str, body: &[u8]) -> String {
        let encoded = secret.strip_prefix("whsec_").unwrap();
        let key = BASE64.decode(encoded).unwrap();
        let mut mac = HmacSha256::new_from_slice(&key).unwrap();
        mac.update(format!("{msg_id}.{timestamp}.").as_bytes());
        mac.update(body);
        format!("v1,{}", BASE64.encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn valid_signature_verifies() {
        let verifier = IdentityWebhookVerifier::new(SECRET).unwrap();
        let body = br#"{"type":"user.created","data":{"id":"user_1"}}"#;
        let sig = sign(SECRET, "msg_1", "1700000000", body);

        verifier
            .verify_at("msg_1", "1700000000", &sig, body, 1_700_000_010)
            .unwrap();
    }

    #[test]
    fn tampered_body_is_rejected() {
        let verifier = IdentityWebhookVerifier::new(SECRET).unwrap();
        let sig = sign(SECRET, "msg_1", "1700000000", b"original");

        let err = verifier
            .verify_at("msg_1", "1700000000", &sig, b"tampered", 1_700_000_010)
            .unwrap_err();
        assert_eq!(err, IdentityWebhookError::SignatureMismatch);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let verifier = IdentityWebhookVerifier::new(SECRET).unwrap();
        let body = b"payload";
        let sig = sign("whsec_t3BLPTo2ZArOlQgN2ZD1o9RnlDG5YU3r", "msg_1", "1700000000", body);

        let err = verifier
            .verify_at("msg_1", "1700000000", &sig, body, 1_700_000_010)
            .unwrap_err();
        assert_eq!(err, IdentityWebhookError::SignatureMismatch);
    }

    #[test]
    fn stale_timestamp_is_rejected() {
        let verifier = IdentityWebhookVerifier::new(SECRET).unwrap();
        let body = b"payload";
        let sig = sign(SECRET, "msg_1", "1700000000", body);

        let err = verifier
            .verify_at("msg_1", "1700000000", &sig, body, 1_700_001_000)
            .unwrap_err();
        assert_eq!(err, IdentityWebhookError::StaleTimestamp);
    }

    #[test]
    fn second_candidate_signature_passes() {
        let verifier = IdentityWebhookVerifier::new(SECRET).unwrap();
        let body = b"payload";
        let good = sign(SECRET, "msg_1", "1700000000", body);
        let header = format!("v1,AAAA {good}");

        verifier
            .verify_at("msg_1", "1700000000", &header, body, 1_700_000_010)
            .unwrap();
    }
}
