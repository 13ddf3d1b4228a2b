//! The seam between the marketplace and the hosted payment API.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

/// Errors reported by a payment processor.
#[derive(Debug, Error)]
pub enum ProcessorError {
    /// The request was rejected before it reached the processor
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    /// The processor answered with an error status
    #[error("processor rejected request ({status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Processor error code, e.g. `"card_declined"`
        code: Option<String>,
        /// Processor error message
        message: String,
    },

    /// The referenced processor object does not exist
    #[error("processor object not found: {0}")]
    NotFound(String),

    /// The processor could not be reached or answered with garbage
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// When the processor moves the money of a payment intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureMethod {
    /// Charge as soon as the customer confirms
    Automatic,
    /// Only authorize; a later capture call moves the money
    Manual,
}

impl CaptureMethod {
    /// Wire value of the capture method.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Automatic => "automatic",
            Self::Manual => "manual",
        }
    }
}

/// Input for creating a payment intent.
#[derive(Debug, Clone)]
pub struct PaymentIntentParams {
    /// Amount in minor currency units
    pub amount: i64,
    /// ISO currency code, lowercase
    pub currency: String,
    /// Charge immediately or hold for later capture
    pub capture_method: CaptureMethod,
    /// Key-value pairs echoed back on webhook events
    pub metadata: BTreeMap<String, String>,
}

/// A processor payment intent.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PaymentIntent {
    /// Processor identifier
    pub id: String,
    /// Amount in minor currency units
    pub amount: i64,
    /// ISO currency code
    pub currency: String,
    /// Processor status, e.g. `"requires_payment_method"`, `"succeeded"`
    pub status: String,
    /// Secret the client uses to complete payment
    #[serde(default)]
    pub client_secret: Option<String>,
    /// Amount actually collected, in minor units
    #[serde(default)]
    pub amount_received: i64,
    /// Metadata attached at creation
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Input for refunding (part of) a payment intent.
#[derive(Debug, Clone)]
pub struct RefundParams {
    /// Payment intent to refund
    pub payment_intent: String,
    /// Amount in minor currency units
    pub amount: i64,
    /// Free-text reason, sent as metadata
    pub reason: Option<String>,
}

/// A processor refund.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Refund {
    /// Processor identifier
    pub id: String,
    /// Amount in minor currency units
    pub amount: i64,
    /// Processor status, e.g. `"pending"`, `"succeeded"`
    pub status: String,
    /// Refunded payment intent
    #[serde(default)]
    pub payment_intent: Option<String>,
}

/// Operations the marketplace needs from a hosted payment API.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Creates a payment intent the client can confirm.
    async fn create_payment_intent(
        &self,
        params: PaymentIntentParams,
    ) -> Result<PaymentIntent, ProcessorError>;

    /// Captures a manually-captured intent, optionally for less than authorized.
    async fn capture_payment_intent(
        &self,
        id: &str,
        amount_to_capture: Option<i64>,
    ) -> Result<PaymentIntent, ProcessorError>;

    /// Cancels an intent, dropping any authorization hold.
    async fn cancel_payment_intent(&self, id: &str) -> Result<PaymentIntent, ProcessorError>;

    /// Refunds money collected by a payment intent.
    async fn create_refund(&self, params: RefundParams) -> Result<Refund, ProcessorError>;
}

/// Converts a major-unit amount into minor units (cents), rounding to the nearest unit.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn to_minor_units(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

/// Converts minor units back into a major-unit amount.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn from_minor_units(amount: i64) -> f64 {
    amount as f64 / 100.0
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;

    #[test]
    fn test_minor_unit_conversion_rounds() {
        assert_eq!(to_minor_units(12.5), 1250);
        assert_eq!(to_minor_units(0.29), 29);
        assert_eq!(to_minor_units(19.999), 2000);
        assert_eq!(from_minor_units(1250), 12.5);
    }

    #[test]
    fn test_payment_intent_deserializes_with_missing_optionals() {
        let json = r#"{"id":"pi_1","amount":500,"currency":"usd","status":"succeeded"}"#;
        let intent: PaymentIntent = serde_json::from_str(json).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(intent.id, "pi_1");
        assert!(intent.client_secret.is_none());
        assert_eq!(intent.amount_received, 0);
        assert!(intent.metadata.is_empty());
    }
}
