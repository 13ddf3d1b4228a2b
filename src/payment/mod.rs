//! Payment layer - Money movement through a hosted payment processor.
//!
//! [`PaymentService`] ties processor calls to the local `payment_transactions`
//! and `security_deposits` tables. The processor itself sits behind the
//! [`PaymentProcessor`] trait so the service can run against the real HTTP
//! client ([`StripeProcessor`]) or an in-memory double in tests.

mod processor;
mod refund;
mod service;
mod stripe;
pub mod webhook;

pub use processor::{
    CaptureMethod, PaymentIntent, PaymentIntentParams, PaymentProcessor, ProcessorError, Refund,
    RefundParams, from_minor_units, to_minor_units,
};
pub use refund::calculate_prorated_refund;
pub use service::{DepositAuthorization, PaymentService, RefundOutcome, RentalPayment};
pub use stripe::StripeProcessor;
pub use webhook::{WebhookEvent, WebhookOutcome};
