//! Shared test utilities for e-mart.
//!
//! This module provides helpers for setting up in-memory databases, creating
//! users, listings and rentals with sensible defaults, and an in-memory
//! payment processor.

use crate::{
    core::{
        items::{self, NewItem},
        receipts, users,
    },
    entities::{
        self,
        item::{Category, Condition},
    },
    errors::Result,
    payment::{
        CaptureMethod, PaymentIntent, PaymentIntentParams, PaymentProcessor, ProcessorError,
        Refund, RefundParams,
    },
};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use sea_orm::DatabaseConnection;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Creates a test user.
///
/// # Defaults
/// * `email`: `"{username}@example.com"`
/// * `display_name`: the username with its first letter capitalized
pub async fn create_test_user(
    db: &DatabaseConnection,
    username: &str,
) -> Result<entities::user::Model> {
    let mut chars = username.chars();
    let display_name = chars
        .next()
        .map(|first| first.to_uppercase().chain(chars).collect::<String>())
        .unwrap_or_default();
    users::create_user(db, username, &format!("{username}@example.com"), &display_name).await
}

/// Creates a test listing with sensible defaults.
///
/// # Defaults
/// * `name`: `"Test Item"`
/// * `price`: 10.0
/// * `condition`: good
/// * `tags`: tools
pub async fn create_test_item(
    db: &DatabaseConnection,
    owner_id: i64,
) -> Result<entities::item::Model> {
    create_custom_item(db, owner_id, "Test Item", 10.0).await
}

/// Creates a test listing with a custom name and price.
pub async fn create_custom_item(
    db: &DatabaseConnection,
    owner_id: i64,
    name: &str,
    price: f64,
) -> Result<entities::item::Model> {
    items::create_item(
        db,
        owner_id,
        NewItem {
            name: name.to_string(),
            description: String::new(),
            price,
            condition: Condition::Good,
            tags: vec![Category::Tools],
        },
    )
    .await
}

/// Sets up a database with one owner and one listing.
/// Returns (db, owner, item).
pub async fn setup_with_item() -> Result<(
    DatabaseConnection,
    entities::user::Model,
    entities::item::Model,
)> {
    let db = setup_test_db().await?;
    let owner = create_test_user(&db, "owner").await?;
    let item = create_test_item(&db, owner.id).await?;
    Ok((db, owner, item))
}

/// Rents `item_id` to `renter_id`: the rental started an hour ago and runs ten
/// days, priced at the item's price.
pub async fn start_test_rental(
    db: &DatabaseConnection,
    item_id: i64,
    renter_id: i64,
) -> Result<entities::receipt::Model> {
    let item = items::get_item(db, item_id)
        .await?
        .ok_or_else(|| crate::errors::Error::not_found("item", item_id))?;
    items::mark_item_rented(db, item_id, renter_id).await?;
    let start = Utc::now() - Duration::hours(1);
    receipts::create_receipt(db, &item, renter_id, start, start + Duration::days(10), item.price)
        .await
}

/// Rents `item_id` to `renter_id` and immediately completes the rental.
pub async fn complete_test_rental(
    db: &DatabaseConnection,
    item_id: i64,
    renter_id: i64,
) -> Result<entities::receipt::Model> {
    let receipt = start_test_rental(db, item_id, renter_id).await?;
    receipts::complete_rental(db, receipt.id).await
}

/// Everything created by [`setup_with_rental`].
pub type RentalSetup = (
    DatabaseConnection,
    entities::user::Model,
    entities::user::Model,
    entities::item::Model,
    entities::receipt::Model,
);

/// Sets up an active rental. Returns (db, owner, renter, item, receipt).
pub async fn setup_with_rental() -> Result<RentalSetup> {
    let (db, owner, item) = setup_with_item().await?;
    let renter = create_test_user(&db, "renter").await?;
    let receipt = start_test_rental(&db, item.id, renter.id).await?;
    Ok((db, owner, renter, item, receipt))
}

/// Sets up a rental that has already been completed.
/// Returns (db, owner, renter, item, receipt).
pub async fn setup_with_completed_rental() -> Result<RentalSetup> {
    let (db, owner, item) = setup_with_item().await?;
    let renter = create_test_user(&db, "renter").await?;
    let receipt = complete_test_rental(&db, item.id, renter.id).await?;
    Ok((db, owner, renter, item, receipt))
}

/// The parties of a test rental, for tests that hand the connection elsewhere.
pub struct TestRental {
    /// Item owner
    pub owner: entities::user::Model,
    /// Renter
    pub renter: entities::user::Model,
    /// Rented item
    pub item: entities::item::Model,
    /// Active receipt
    pub receipt: entities::receipt::Model,
}

/// In-memory payment processor.
///
/// Stores intents and refunds in memory and can be told to fail the next call.
#[derive(Default)]
pub struct MockProcessor {
    payment_intents: Arc<RwLock<HashMap<String, PaymentIntent>>>,
    refunds: Arc<RwLock<HashMap<String, Refund>>>,
    fail_next: Arc<RwLock<bool>>,
    next_refund_status: Arc<RwLock<Option<String>>>,
}

impl MockProcessor {
    /// Creates an empty mock processor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next call fail with a card decline.
    pub async fn set_fail_next(&self, fail: bool) {
        *self.fail_next.write().await = fail;
    }

    /// Status reported for the next refund instead of `"succeeded"`.
    pub async fn set_next_refund_status(&self, status: &str) {
        *self.next_refund_status.write().await = Some(status.to_string());
    }

    /// A stored payment intent.
    pub async fn payment_intent(&self, id: &str) -> Option<PaymentIntent> {
        self.payment_intents.read().await.get(id).cloned()
    }

    /// A stored refund.
    pub async fn refund(&self, id: &str) -> Option<Refund> {
        self.refunds.read().await.get(id).cloned()
    }

    /// Number of stored payment intents.
    pub async fn payment_intent_count(&self) -> usize {
        self.payment_intents.read().await.len()
    }

    async fn check_fail(&self) -> std::result::Result<(), ProcessorError> {
        let mut fail = self.fail_next.write().await;
        if *fail {
            *fail = false;
            return Err(ProcessorError::Api {
                status: 402,
                code: Some("card_declined".to_string()),
                message: "Mock configured to fail".to_string(),
            });
        }
        Ok(())
    }

    async fn update_intent(
        &self,
        id: &str,
        apply: impl FnOnce(&mut PaymentIntent),
    ) -> std::result::Result<PaymentIntent, ProcessorError> {
        let mut intents = self.payment_intents.write().await;
        let intent = intents
            .get_mut(id)
            .ok_or_else(|| ProcessorError::NotFound(id.to_string()))?;
        apply(intent);
        Ok(intent.clone())
    }
}

#[async_trait]
impl PaymentProcessor for MockProcessor {
    async fn create_payment_intent(
        &self,
        params: PaymentIntentParams,
    ) -> std::result::Result<PaymentIntent, ProcessorError> {
        self.check_fail().await?;
        if params.amount <= 0 {
            return Err(ProcessorError::InvalidParameters(
                "Amount must be greater than zero".to_string(),
            ));
        }

        let id = format!("pi_mock_{}", Uuid::new_v4().simple());
        let intent = PaymentIntent {
            id: id.clone(),
            amount: params.amount,
            currency: params.currency,
            status: match params.capture_method {
                CaptureMethod::Automatic => "requires_payment_method",
                CaptureMethod::Manual => "requires_capture",
            }
            .to_string(),
            client_secret: Some(format!("{id}_secret_{}", Uuid::new_v4().simple())),
            amount_received: 0,
            metadata: params.metadata.into_iter().collect(),
        };

        self.payment_intents.write().await.insert(id, intent.clone());
        Ok(intent)
    }

    async fn capture_payment_intent(
        &self,
        id: &str,
        amount_to_capture: Option<i64>,
    ) -> std::result::Result<PaymentIntent, ProcessorError> {
        self.check_fail().await?;
        self.update_intent(id, |intent| {
            intent.amount_received = amount_to_capture.unwrap_or(intent.amount);
            intent.status = "succeeded".to_string();
        })
        .await
    }

    async fn cancel_payment_intent(
        &self,
        id: &str,
    ) -> std::result::Result<PaymentIntent, ProcessorError> {
        self.check_fail().await?;
        self.update_intent(id, |intent| intent.status = "canceled".to_string())
            .await
    }

    async fn create_refund(
        &self,
        params: RefundParams,
    ) -> std::result::Result<Refund, ProcessorError> {
        self.check_fail().await?;
        if !self
            .payment_intents
            .read()
            .await
            .contains_key(&params.payment_intent)
        {
            return Err(ProcessorError::NotFound(params.payment_intent));
        }

        let status = self
            .next_refund_status
            .write()
            .await
            .take()
            .unwrap_or_else(|| "succeeded".to_string());
        let id = format!("re_mock_{}", Uuid::new_v4().simple());
        let refund = Refund {
            id: id.clone(),
            amount: params.amount,
            status,
            payment_intent: Some(params.payment_intent),
        };

        self.refunds.write().await.insert(id, refund.clone());
        Ok(refund)
    }
}
