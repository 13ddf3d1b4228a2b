//! HTTP client for a Stripe-compatible hosted payment API.
//!
//! Requests are form-encoded and authenticated with the secret key as a bearer
//! token. Error bodies have the shape `{"error": {"message": ..., "code": ...}}`.

use super::processor::{
    PaymentIntent, PaymentIntentParams, PaymentProcessor, ProcessorError, Refund, RefundParams,
};
use crate::config::payment::PaymentConfig;
use crate::errors::{Error, Result};
use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

/// Payment processor backed by the hosted REST API.
#[derive(Debug, Clone)]
pub struct StripeProcessor {
    base_url: Url,
    api_key: String,
    http: reqwest::Client,
}

impl StripeProcessor {
    /// Builds a client from processor settings.
    ///
    /// # Errors
    /// Returns `Error::Config` when the configured base URL does not parse.
    pub fn new(config: &PaymentConfig) -> Result<Self> {
        // `Url::join` drops the last path segment unless the base ends with '/'
        let mut base = config.api_base.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base).map_err(|err| Error::Config {
            message: format!("invalid PAYMENT_API_BASE: {err}"),
        })?;
        Ok(Self {
            base_url,
            api_key: config.api_key.clone(),
            http: reqwest::Client::new(),
        })
    }

    fn endpoint(&self, path: &str) -> std::result::Result<Url, ProcessorError> {
        self.base_url
            .join(&format!("v1/{path}"))
            .map_err(|err| ProcessorError::InvalidParameters(format!("invalid endpoint: {err}")))
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        form: &[(String, String)],
    ) -> std::result::Result<T, ProcessorError> {
        let endpoint = self.endpoint(path)?;
        debug!("POST {endpoint}");

        let res = self
            .http
            .post(endpoint)
            .bearer_auth(&self.api_key)
            .form(form)
            .send()
            .await?;

        if res.status().is_success() {
            return res.json::<T>().await.map_err(ProcessorError::Transport);
        }

        let status = res.status().as_u16();
        let body = res.json::<ErrorEnvelope>().await.ok().map(|e| e.error);
        let (message, code) = body.map_or_else(
            || ("unknown error".to_string(), None),
            |b| (b.message.unwrap_or_else(|| "unknown error".to_string()), b.code),
        );
        warn!("Processor rejected POST {path} with {status}: {message}");

        let err = match status {
            404 => ProcessorError::NotFound(message),
            _ => ProcessorError::Api {
                status,
                code,
                message,
            },
        };
        Err(err)
    }
}

/// Form fields for creating a payment intent.
pub(crate) fn payment_intent_form(params: &PaymentIntentParams) -> Vec<(String, String)> {
    let mut form = vec![
        ("amount".to_string(), params.amount.to_string()),
        ("currency".to_string(), params.currency.clone()),
        (
            "capture_method".to_string(),
            params.capture_method.as_str().to_string(),
        ),
        (
            "automatic_payment_methods[enabled]".to_string(),
            "true".to_string(),
        ),
    ];
    for (key, value) in &params.metadata {
        form.push((format!("metadata[{key}]"), value.clone()));
    }
    form
}

/// Form fields for creating a refund. The processor only accepts a fixed set of
/// reason codes, so the free-text reason travels as metadata.
pub(crate) fn refund_form(params: &RefundParams) -> Vec<(String, String)> {
    let mut form = vec![
        ("payment_intent".to_string(), params.payment_intent.clone()),
        ("amount".to_string(), params.amount.to_string()),
    ];
    if let Some(reason) = &params.reason {
        form.push(("metadata[reason]".to_string(), reason.clone()));
    }
    form
}

#[async_trait]
impl PaymentProcessor for StripeProcessor {
    async fn create_payment_intent(
        &self,
        params: PaymentIntentParams,
    ) -> std::result::Result<PaymentIntent, ProcessorError> {
        if params.amount <= 0 {
            return Err(ProcessorError::InvalidParameters(
                "amount must be greater than zero".to_string(),
            ));
        }
        self.post_form("payment_intents", &payment_intent_form(&params))
            .await
    }

    async fn capture_payment_intent(
        &self,
        id: &str,
        amount_to_capture: Option<i64>,
    ) -> std::result::Result<PaymentIntent, ProcessorError> {
        let form: Vec<(String, String)> = amount_to_capture
            .map(|amount| vec![("amount_to_capture".to_string(), amount.to_string())])
            .unwrap_or_default();
        self.post_form(&format!("payment_intents/{id}/capture"), &form)
            .await
    }

    async fn cancel_payment_intent(
        &self,
        id: &str,
    ) -> std::result::Result<PaymentIntent, ProcessorError> {
        self.post_form(&format!("payment_intents/{id}/cancel"), &[])
            .await
    }

    async fn create_refund(
        &self,
        params: RefundParams,
    ) -> std::result::Result<Refund, ProcessorError> {
        if params.amount <= 0 {
            return Err(ProcessorError::InvalidParameters(
                "refund amount must be greater than zero".to_string(),
            ));
        }
        self.post_form("refunds", &refund_form(&params)).await
    }
}
