//! Webhook events pushed by the payment processor.
//!
//! Events arrive as JSON `{id, type, data: {object}}` with a `t=<unix>,v1=<hex>`
//! signature header. The signature is an HMAC-SHA256 over `"<t>.<payload>"`
//! keyed with the endpoint secret.

use crate::errors::{Error, Result};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

/// Maximum age of a signed payload, in seconds.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Event type: a payment intent collected its money.
pub const PAYMENT_INTENT_SUCCEEDED: &str = "payment_intent.succeeded";
/// Event type: a payment attempt failed.
pub const PAYMENT_INTENT_FAILED: &str = "payment_intent.payment_failed";
/// Event type: a manual-capture intent is now holding funds.
pub const PAYMENT_INTENT_CAPTURABLE: &str = "payment_intent.amount_capturable_updated";
/// Event type: an intent was canceled.
pub const PAYMENT_INTENT_CANCELED: &str = "payment_intent.canceled";
/// Event type: a refund changed status.
pub const REFUND_UPDATED: &str = "charge.refund.updated";

/// A webhook event as delivered by the processor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEvent {
    /// Processor event id
    pub id: String,
    /// Event type, e.g. `"payment_intent.succeeded"`
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event payload
    pub data: WebhookEventData,
}

/// Payload wrapper of a webhook event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEventData {
    /// The processor object the event is about
    pub object: serde_json::Value,
}

impl WebhookEvent {
    /// Id of the object the event is about.
    #[must_use]
    pub fn object_id(&self) -> Option<&str> {
        self.object_str("id")
    }

    /// A top-level string field of the event object.
    #[must_use]
    pub fn object_str(&self, key: &str) -> Option<&str> {
        self.data.object.get(key).and_then(serde_json::Value::as_str)
    }

    /// A metadata entry of the event object.
    #[must_use]
    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.data
            .object
            .get("metadata")
            .and_then(|m| m.get(key))
            .and_then(serde_json::Value::as_str)
    }
}

/// What handling a webhook event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// A rental payment was confirmed; carries the local transaction id
    PaymentConfirmed(i64),
    /// A rental payment failed; carries the local transaction id
    PaymentFailed(i64),
    /// A refund changed status; carries the local transaction id
    RefundUpdated(i64),
    /// A known event with no local state change
    Acknowledged,
    /// An unknown event type
    Ignored,
}

fn signature_error(message: &str) -> Error {
    Error::WebhookSignature {
        message: message.to_string(),
    }
}

/// Splits a signature header into its timestamp and `v1` signatures.
pub fn parse_signature_header(header: &str) -> Result<(i64, Vec<String>)> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => {
                timestamp = Some(
                    value
                        .parse::<i64>()
                        .map_err(|_| signature_error("invalid timestamp"))?,
                );
            }
            "v1" => signatures.push(value.to_string()),
            _ => {}
        }
    }

    match timestamp {
        Some(t) if !signatures.is_empty() => Ok((t, signatures)),
        _ => Err(signature_error("invalid signature header format")),
    }
}

/// Hex HMAC-SHA256 of `"<timestamp>.<payload>"`.
pub fn compute_signature(secret: &str, timestamp: i64, payload: &[u8]) -> Result<String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|_| signature_error("invalid secret key"))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Checks a payload against its signature header at time `now` (unix seconds).
pub fn verify_signature(payload: &[u8], header: &str, secret: &str, now: i64) -> Result<()> {
    let (timestamp, signatures) = parse_signature_header(header)?;

    if (now - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(signature_error("timestamp outside tolerance window"));
    }

    let expected = compute_signature(secret, timestamp, payload)?;
    let matched = signatures
        .iter()
        .any(|sig| bool::from(expected.as_bytes().ct_eq(sig.as_bytes())));
    if matched {
        Ok(())
    } else {
        Err(signature_error("no matching signature"))
    }
}

/// Verifies and parses a raw webhook delivery.
pub fn construct_event(payload: &[u8], header: &str, secret: &str) -> Result<WebhookEvent> {
    verify_signature(payload, header, secret, chrono::Utc::now().timestamp())?;
    Ok(serde_json::from_slice(payload)?)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    const SECRET: &str = "whsec_test";
    const PAYLOAD: &[u8] =
        br#"{"id":"evt_1","type":"payment_intent.succeeded","data":{"object":{"id":"pi_1","metadata":{"kind":"rental_payment"}}}}"#;

    fn header(timestamp: i64, payload: &[u8]) -> String {
        format!("t={timestamp},v1={}", compute_signature(SECRET, timestamp, payload).unwrap())
    }

    #[test]
    fn test_parse_signature_header() {
        let (timestamp, sigs) = parse_signature_header("t=1609459200,v1=abc,v0=zzz,v1=def").unwrap();
        assert_eq!(timestamp, 1_609_459_200);
        assert_eq!(sigs, vec!["abc", "def"]);
    }

    #[test]
    fn test_parse_signature_header_invalid() {
        assert!(parse_signature_header("invalid").is_err());
        assert!(parse_signature_header("t=123").is_err());
        assert!(parse_signature_header("t=abc,v1=def").is_err());
    }

    #[test]
    fn test_valid_signature_is_accepted() {
        let now = 1_700_000_000;
        assert!(verify_signature(PAYLOAD, &header(now, PAYLOAD), SECRET, now + 10).is_ok());
    }

    #[test]
    fn test_tampered_payload_is_rejected() {
        let now = 1_700_000_000;
        let tampered = br#"{"id":"evt_1","type":"payment_intent.succeeded","data":{"object":{"id":"pi_2"}}}"#;
        let result = verify_signature(tampered, &header(now, PAYLOAD), SECRET, now);
        assert!(matches!(result, Err(Error::WebhookSignature { .. })));
    }

    #[test]
    fn test_stale_signature_is_rejected() {
        let now = 1_700_000_000;
        let result = verify_signature(
            PAYLOAD,
            &header(now, PAYLOAD),
            SECRET,
            now + SIGNATURE_TOLERANCE_SECS + 1,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_construct_event_parses_payload() {
        let now = chrono::Utc::now().timestamp();
        let event = construct_event(PAYLOAD, &header(now, PAYLOAD), SECRET).unwrap();
        assert_eq!(event.event_type, PAYMENT_INTENT_SUCCEEDED);
        assert_eq!(event.object_id(), Some("pi_1"));
        assert_eq!(event.metadata("kind"), Some("rental_payment"));
        assert_eq!(event.metadata("missing"), None);
    }
}
