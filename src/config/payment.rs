//! Payment processor settings loaded from environment variables.
//!
//! Secrets never live in config.toml; they come from the process environment
//! (or `.env`, loaded by `dotenvy` at startup).

use crate::errors::{Error, Result};

/// Base URL of the hosted payment API when `PAYMENT_API_BASE` is not set.
pub const DEFAULT_API_BASE: &str = "https://api.stripe.com";

/// Credentials and endpoint for the payment processor.
#[derive(Clone)]
pub struct PaymentConfig {
    /// Secret API key sent as a bearer token
    pub api_key: String,
    /// Base URL of the processor API
    pub api_base: String,
    /// Secret used to verify webhook signatures, if webhooks are enabled
    pub webhook_secret: Option<String>,
}

impl std::fmt::Debug for PaymentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentConfig")
            .field("api_key", &"<redacted>")
            .field("api_base", &self.api_base)
            .field(
                "webhook_secret",
                &self.webhook_secret.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

impl PaymentConfig {
    /// Reads `PAYMENT_API_KEY`, `PAYMENT_API_BASE` and `PAYMENT_WEBHOOK_SECRET`.
    ///
    /// # Errors
    /// Returns `Error::EnvVar` when `PAYMENT_API_KEY` is missing and
    /// `Error::Config` when it is blank.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("PAYMENT_API_KEY")?;
        if api_key.trim().is_empty() {
            return Err(Error::Config {
                message: "PAYMENT_API_KEY is empty".to_string(),
            });
        }

        let api_base =
            std::env::var("PAYMENT_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string());
        let webhook_secret = std::env::var("PAYMENT_WEBHOOK_SECRET")
            .ok()
            .filter(|s| !s.trim().is_empty());

        Ok(Self {
            api_key,
            api_base,
            webhook_secret,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_secrets() {
        let config = PaymentConfig {
            api_key: "sk_test_123".to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            webhook_secret: Some("whsec_abc".to_string()),
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("sk_test_123"));
        assert!(!rendered.contains("whsec_abc"));
        assert!(rendered.contains("api.stripe.com"));
    }
}
