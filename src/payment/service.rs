use super::{
    CaptureMethod, PaymentIntentParams, PaymentProcessor, RefundParams, calculate_prorated_refund,
    to_minor_units,
    webhook::{self, WebhookEvent, WebhookOutcome},
};
use crate::{
    config::marketplace::MarketplaceSettings,
    core::receipts,
    entities::{
        PaymentTransaction, Receipt, SecurityDeposit, payment_transaction,
        payment_transaction::{TransactionStatus, TransactionType},
        receipt::{self, ReceiptStatus},
        security_deposit::{self, DepositStatus},
    },
    errors::{Error, Result},
};
use chrono::{Duration, Utc};
use sea_orm::{QueryOrder, Set, prelude::*, sea_query::Expr};
use std::{collections::BTreeMap, sync::Arc};
use tracing::{debug, error, info, instrument, warn};

/// Metadata key naming what an intent pays for.
pub const METADATA_KIND: &str = "kind";
/// `kind` of rental payment intents.
pub const KIND_RENTAL_PAYMENT: &str = "rental_payment";
/// `kind` of security deposit intents.
pub const KIND_SECURITY_DEPOSIT: &str = "security_deposit";

/// A freshly created rental payment.
#[derive(Debug, Clone, PartialEq)]
pub struct RentalPayment {
    /// Secret the client uses to complete payment
    pub client_secret: Option<String>,
    /// The pending `payment` transaction
    pub transaction: payment_transaction::Model,
}

/// Result of a refund.
#[derive(Debug, Clone, PartialEq)]
pub struct RefundOutcome {
    /// The recorded `refund` transaction
    pub transaction: payment_transaction::Model,
    /// Amount refunded, in major units
    pub amount: f64,
}

/// A freshly authorized security deposit.
#[derive(Debug, Clone, PartialEq)]
pub struct DepositAuthorization {
    /// Secret the client uses to confirm the hold
    pub client_secret: Option<String>,
    /// The `authorized` deposit row
    pub deposit: security_deposit::Model,
}

/// Payments, refunds and deposits for rentals.
///
/// Owns the database connection and the processor. Processor calls and the
/// database writes that follow them are not coordinated: when the write fails
/// after a successful processor call, the error is returned and nothing is
/// undone at the processor.
pub struct PaymentService {
    db: DatabaseConnection,
    processor: Arc<dyn PaymentProcessor>,
    settings: MarketplaceSettings,
    webhook_secret: Option<String>,
}

fn validate_amount(amount: f64) -> Result<f64> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(Error::InvalidAmount { amount });
    }
    Ok(amount)
}

impl PaymentService {
    /// Creates a service over an open connection.
    pub fn new(
        db: DatabaseConnection,
        processor: Arc<dyn PaymentProcessor>,
        settings: MarketplaceSettings,
    ) -> Self {
        Self {
            db,
            processor,
            settings,
            webhook_secret: None,
        }
    }

    /// Sets the secret webhook deliveries are signed with.
    #[must_use]
    pub fn with_webhook_secret(mut self, secret: Option<String>) -> Self {
        self.webhook_secret = secret;
        self
    }

    /// The underlying connection.
    #[must_use]
    pub const fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    fn currency_or_default(&self, currency: Option<&str>) -> String {
        currency
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(&self.settings.default_currency)
            .to_lowercase()
    }

    async fn find_receipt(&self, receipt_id: i64) -> Result<receipt::Model> {
        Receipt::find_by_id(receipt_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| Error::not_found("receipt", receipt_id))
    }

    async fn find_transaction(
        &self,
        processor_ref: &str,
        kind: TransactionType,
    ) -> Result<payment_transaction::Model> {
        PaymentTransaction::find()
            .filter(payment_transaction::Column::ProcessorRef.eq(processor_ref))
            .filter(payment_transaction::Column::TransactionType.eq(kind.as_str()))
            .one(&self.db)
            .await?
            .ok_or_else(|| Error::not_found("payment transaction", processor_ref))
    }

    async fn set_transaction_status(
        &self,
        existing: payment_transaction::Model,
        status: TransactionStatus,
    ) -> Result<payment_transaction::Model> {
        let mut active: payment_transaction::ActiveModel = existing.into();
        active.status = Set(status.as_str().to_string());
        active.updated_at = Set(Utc::now());
        active.update(&self.db).await.map_err(Into::into)
    }

    /// Starts payment of a rental: creates an automatically captured intent and
    /// records a pending `payment` transaction keyed by the intent id.
    #[instrument(skip(self))]
    pub async fn create_rental_payment(
        &self,
        receipt_id: i64,
        user_id: i64,
        amount: f64,
        currency: Option<&str>,
    ) -> Result<RentalPayment> {
        let amount = validate_amount(amount)?;
        let receipt = self.find_receipt(receipt_id).await?;
        if receipt.renter_id != user_id {
            return Err(Error::PermissionDenied {
                message: format!("user {user_id} is not the renter of receipt {receipt_id}"),
            });
        }
        let currency = self.currency_or_default(currency);

        let metadata = BTreeMap::from([
            (METADATA_KIND.to_string(), KIND_RENTAL_PAYMENT.to_string()),
            ("receipt_id".to_string(), receipt_id.to_string()),
            ("user_id".to_string(), user_id.to_string()),
        ]);
        let intent = self
            .processor
            .create_payment_intent(PaymentIntentParams {
                amount: to_minor_units(amount),
                currency: currency.clone(),
                capture_method: CaptureMethod::Automatic,
                metadata,
            })
            .await
            .inspect_err(|e| error!("Failed to create payment intent: {}", e))?;

        let now = Utc::now();
        let transaction = payment_transaction::ActiveModel {
            receipt_id: Set(receipt_id),
            user_id: Set(user_id),
            transaction_type: Set(TransactionType::Payment.as_str().to_string()),
            amount: Set(amount),
            currency: Set(currency),
            processor_ref: Set(intent.id.clone()),
            status: Set(TransactionStatus::Pending.as_str().to_string()),
            reason: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .inspect_err(|e| error!("Failed to record payment intent {}: {}", intent.id, e))?;

        info!(
            "Created payment intent {} for receipt {} ({} {})",
            intent.id, receipt_id, amount, transaction.currency
        );
        Ok(RentalPayment {
            client_secret: intent.client_secret,
            transaction,
        })
    }

    /// Marks a rental payment as succeeded and copies the paid amount and intent
    /// id onto its receipt. Runs again in full on repeated delivery.
    #[instrument(skip(self))]
    pub async fn confirm_rental_payment(
        &self,
        payment_intent_id: &str,
    ) -> Result<payment_transaction::Model> {
        let existing = self
            .find_transaction(payment_intent_id, TransactionType::Payment)
            .await?;
        let confirmed = self
            .set_transaction_status(existing, TransactionStatus::Succeeded)
            .await?;

        Receipt::update_many()
            .col_expr(receipt::Column::AmountPaid, Expr::value(confirmed.amount))
            .col_expr(
                receipt::Column::TransactionId,
                Expr::value(payment_intent_id.to_string()),
            )
            .filter(receipt::Column::Id.eq(confirmed.receipt_id))
            .exec(&self.db)
            .await
            .inspect_err(|e| {
                error!(
                    "Payment {} confirmed but receipt {} not updated: {}",
                    payment_intent_id, confirmed.receipt_id, e
                );
            })?;

        info!(
            "Payment {} confirmed for receipt {}",
            payment_intent_id, confirmed.receipt_id
        );
        Ok(confirmed)
    }

    /// Marks a rental payment as failed.
    #[instrument(skip(self))]
    pub async fn mark_payment_failed(
        &self,
        payment_intent_id: &str,
    ) -> Result<payment_transaction::Model> {
        let existing = self
            .find_transaction(payment_intent_id, TransactionType::Payment)
            .await?;
        let failed = self
            .set_transaction_status(existing, TransactionStatus::Failed)
            .await?;
        warn!(
            "Payment {} failed for receipt {}",
            payment_intent_id, failed.receipt_id
        );
        Ok(failed)
    }

    /// Refunds an active rental and recalls its receipt.
    ///
    /// Without `custom_amount` the refund covers the unused days counted from
    /// now. The amount must be positive and no larger than what was paid.
    #[instrument(skip(self))]
    pub async fn process_refund(
        &self,
        receipt_id: i64,
        reason: Option<&str>,
        custom_amount: Option<f64>,
    ) -> Result<RefundOutcome> {
        let receipt = self.find_receipt(receipt_id).await?;
        if receipt.status()? != ReceiptStatus::Active {
            return Err(Error::validation(format!(
                "receipt {receipt_id} is {} and cannot be refunded",
                receipt.status
            )));
        }

        let payment = PaymentTransaction::find()
            .filter(payment_transaction::Column::ReceiptId.eq(receipt_id))
            .filter(
                payment_transaction::Column::TransactionType.eq(TransactionType::Payment.as_str()),
            )
            .filter(
                payment_transaction::Column::Status.eq(TransactionStatus::Succeeded.as_str()),
            )
            .order_by_desc(payment_transaction::Column::CreatedAt)
            .one(&self.db)
            .await?
            .ok_or_else(|| {
                Error::validation(format!("receipt {receipt_id} has no successful payment"))
            })?;

        let amount = custom_amount.unwrap_or_else(|| {
            calculate_prorated_refund(
                receipt.start_date,
                receipt.end_date,
                payment.amount,
                Utc::now(),
            )
        });
        let amount = validate_amount(amount)?;
        if amount > payment.amount {
            return Err(Error::InvalidAmount { amount });
        }

        let refund = self
            .processor
            .create_refund(RefundParams {
                payment_intent: payment.processor_ref.clone(),
                amount: to_minor_units(amount),
                reason: reason.map(str::to_string),
            })
            .await
            .inspect_err(|e| error!("Refund of {} failed: {}", payment.processor_ref, e))?;

        let now = Utc::now();
        let transaction = payment_transaction::ActiveModel {
            receipt_id: Set(receipt_id),
            user_id: Set(payment.user_id),
            transaction_type: Set(TransactionType::Refund.as_str().to_string()),
            amount: Set(amount),
            currency: Set(payment.currency.clone()),
            processor_ref: Set(refund.id.clone()),
            status: Set(TransactionStatus::from_processor(&refund.status)
                .as_str()
                .to_string()),
            reason: Set(reason.map(str::to_string)),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .inspect_err(|e| error!("Refund {} issued but not recorded: {}", refund.id, e))?;

        receipts::recall_receipt(&self.db, receipt_id).await?;

        info!(
            "Refunded {} {} on receipt {} (refund {})",
            amount, transaction.currency, receipt_id, refund.id
        );
        Ok(RefundOutcome {
            transaction,
            amount,
        })
    }

    /// Places a hold on the renter's payment method for a rental.
    #[instrument(skip(self))]
    pub async fn authorize_security_deposit(
        &self,
        receipt_id: i64,
        renter_id: i64,
        amount: f64,
        currency: Option<&str>,
    ) -> Result<DepositAuthorization> {
        let amount = validate_amount(amount)?;
        let receipt = self.find_receipt(receipt_id).await?;
        if receipt.renter_id != renter_id {
            return Err(Error::PermissionDenied {
                message: format!("user {renter_id} is not the renter of receipt {receipt_id}"),
            });
        }
        let currency = self.currency_or_default(currency);

        let metadata = BTreeMap::from([
            (METADATA_KIND.to_string(), KIND_SECURITY_DEPOSIT.to_string()),
            ("receipt_id".to_string(), receipt_id.to_string()),
            ("renter_id".to_string(), renter_id.to_string()),
        ]);
        let intent = self
            .processor
            .create_payment_intent(PaymentIntentParams {
                amount: to_minor_units(amount),
                currency: currency.clone(),
                capture_method: CaptureMethod::Manual,
                metadata,
            })
            .await
            .inspect_err(|e| error!("Failed to authorize deposit: {}", e))?;

        let now = Utc::now();
        let deposit = security_deposit::ActiveModel {
            receipt_id: Set(receipt_id),
            renter_id: Set(renter_id),
            amount: Set(amount),
            currency: Set(currency),
            processor_ref: Set(intent.id.clone()),
            status: Set(DepositStatus::Authorized.as_str().to_string()),
            captured_amount: Set(None),
            expires_at: Set(now + Duration::days(self.settings.deposit_hold_days)),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .inspect_err(|e| error!("Deposit hold {} not recorded: {}", intent.id, e))?;

        info!(
            "Authorized deposit {} of {} for receipt {}",
            deposit.id, amount, receipt_id
        );
        Ok(DepositAuthorization {
            client_secret: intent.client_secret,
            deposit,
        })
    }

    async fn find_authorized_deposit(&self, deposit_id: i64) -> Result<security_deposit::Model> {
        let deposit = SecurityDeposit::find_by_id(deposit_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| Error::not_found("security deposit", deposit_id))?;
        if deposit.status()? != DepositStatus::Authorized {
            return Err(Error::validation(format!(
                "deposit {deposit_id} is {}, not authorized",
                deposit.status
            )));
        }
        Ok(deposit)
    }

    /// Captures an authorized deposit, in full or for `amount`.
    #[instrument(skip(self))]
    pub async fn capture_security_deposit(
        &self,
        deposit_id: i64,
        amount: Option<f64>,
    ) -> Result<security_deposit::Model> {
        let deposit = self.find_authorized_deposit(deposit_id).await?;
        if Utc::now() > deposit.expires_at {
            return Err(Error::validation(format!(
                "deposit {deposit_id} hold expired at {}",
                deposit.expires_at
            )));
        }

        let captured = match amount {
            Some(requested) => {
                let requested = validate_amount(requested)?;
                if requested > deposit.amount {
                    return Err(Error::InvalidAmount { amount: requested });
                }
                requested
            }
            None => deposit.amount,
        };

        self.processor
            .capture_payment_intent(&deposit.processor_ref, amount.map(to_minor_units))
            .await
            .inspect_err(|e| error!("Capture of {} failed: {}", deposit.processor_ref, e))?;

        let mut active: security_deposit::ActiveModel = deposit.into();
        active.status = Set(DepositStatus::Captured.as_str().to_string());
        active.captured_amount = Set(Some(captured));
        active.updated_at = Set(Utc::now());
        let updated = active.update(&self.db).await?;

        info!("Captured {} of deposit {}", captured, deposit_id);
        Ok(updated)
    }

    /// Drops the hold of an authorized deposit.
    #[instrument(skip(self))]
    pub async fn release_security_deposit(
        &self,
        deposit_id: i64,
    ) -> Result<security_deposit::Model> {
        let deposit = self.find_authorized_deposit(deposit_id).await?;

        self.processor
            .cancel_payment_intent(&deposit.processor_ref)
            .await
            .inspect_err(|e| error!("Release of {} failed: {}", deposit.processor_ref, e))?;

        let mut active: security_deposit::ActiveModel = deposit.into();
        active.status = Set(DepositStatus::Released.as_str().to_string());
        active.updated_at = Set(Utc::now());
        let updated = active.update(&self.db).await?;

        info!("Released deposit {}", deposit_id);
        Ok(updated)
    }

    /// Latest deposit placed for a receipt.
    pub async fn get_deposit_for_receipt(
        &self,
        receipt_id: i64,
    ) -> Result<Option<security_deposit::Model>> {
        SecurityDeposit::find()
            .filter(security_deposit::Column::ReceiptId.eq(receipt_id))
            .order_by_desc(security_deposit::Column::CreatedAt)
            .order_by_desc(security_deposit::Column::Id)
            .one(&self.db)
            .await
            .map_err(Into::into)
    }

    /// Payments and refunds recorded for a receipt, oldest first.
    pub async fn list_transactions_for_receipt(
        &self,
        receipt_id: i64,
    ) -> Result<Vec<payment_transaction::Model>> {
        PaymentTransaction::find()
            .filter(payment_transaction::Column::ReceiptId.eq(receipt_id))
            .order_by_asc(payment_transaction::Column::CreatedAt)
            .order_by_asc(payment_transaction::Column::Id)
            .all(&self.db)
            .await
            .map_err(Into::into)
    }

    /// Verifies a raw delivery against the configured webhook secret and parses it.
    pub fn construct_webhook_event(&self, payload: &[u8], signature: &str) -> Result<WebhookEvent> {
        let secret = self.webhook_secret.as_deref().ok_or_else(|| Error::Config {
            message: "PAYMENT_WEBHOOK_SECRET is not set".to_string(),
        })?;
        webhook::construct_event(payload, signature, secret)
    }

    /// Applies a processor event to local state.
    ///
    /// Events are not deduplicated; a redelivered event is applied again.
    #[instrument(skip(self, event), fields(event_id = %event.id, event_type = %event.event_type))]
    pub async fn handle_webhook(&self, event: &WebhookEvent) -> Result<WebhookOutcome> {
        let is_deposit = event.metadata(METADATA_KIND) == Some(KIND_SECURITY_DEPOSIT);
        let object_id = || {
            event.object_id().ok_or_else(|| {
                Error::validation(format!("event {} has no object id", event.id))
            })
        };

        match event.event_type.as_str() {
            webhook::PAYMENT_INTENT_SUCCEEDED if is_deposit => {
                debug!("Deposit intent succeeded, nothing to confirm");
                Ok(WebhookOutcome::Acknowledged)
            }
            webhook::PAYMENT_INTENT_SUCCEEDED => {
                let confirmed = self.confirm_rental_payment(object_id()?).await?;
                Ok(WebhookOutcome::PaymentConfirmed(confirmed.id))
            }
            webhook::PAYMENT_INTENT_FAILED if is_deposit => {
                warn!("Deposit authorization {} failed", object_id()?);
                Ok(WebhookOutcome::Acknowledged)
            }
            webhook::PAYMENT_INTENT_FAILED => {
                let failed = self.mark_payment_failed(object_id()?).await?;
                Ok(WebhookOutcome::PaymentFailed(failed.id))
            }
            webhook::REFUND_UPDATED => {
                let refund_id = object_id()?;
                let status = event.object_str("status").ok_or_else(|| {
                    Error::validation(format!("refund event {} has no status", event.id))
                })?;
                let existing = self
                    .find_transaction(refund_id, TransactionType::Refund)
                    .await?;
                let updated = self
                    .set_transaction_status(existing, TransactionStatus::from_processor(status))
                    .await?;
                info!("Refund {} is now {}", refund_id, updated.status);
                Ok(WebhookOutcome::RefundUpdated(updated.id))
            }
            webhook::PAYMENT_INTENT_CANCELED | webhook::PAYMENT_INTENT_CAPTURABLE => {
                info!("Payment intent {:?} event acknowledged", event.object_id());
                Ok(WebhookOutcome::Acknowledged)
            }
            other => {
                debug!("Ignoring webhook event type {}", other);
                Ok(WebhookOutcome::Ignored)
            }
        }
    }
}
