//! Payment transaction entity - A charge or refund recorded against a receipt.
//!
//! `processor_ref` holds the processor's identifier (payment intent id for
//! charges, refund id for refunds) and is how webhook events find their row.

use crate::errors;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Payment transaction database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payment_transactions")]
pub struct Model {
    /// Unique identifier for the transaction
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Receipt being paid for or refunded
    pub receipt_id: i64,
    /// User who paid or is being refunded
    pub user_id: i64,
    /// `"payment"` or `"refund"`, see [`TransactionType`]
    pub transaction_type: String,
    /// Amount in major currency units
    pub amount: f64,
    /// ISO currency code, lowercase
    pub currency: String,
    /// Processor-side identifier
    #[sea_orm(unique)]
    pub processor_ref: String,
    /// `"pending"`, `"succeeded"` or `"failed"`, see [`TransactionStatus`]
    pub status: String,
    /// Why a refund was issued
    pub reason: Option<String>,
    /// When the row was created
    pub created_at: DateTimeUtc,
    /// When the status last changed
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between transactions and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each transaction belongs to one receipt
    #[sea_orm(
        belongs_to = "super::receipt::Entity",
        from = "Column::ReceiptId",
        to = "super::receipt::Column::Id"
    )]
    Receipt,
}

impl Related<super::receipt::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Receipt.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Whether money moved towards the owner or back to the renter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// Renter paid for a rental
    Payment,
    /// Renter was refunded
    Refund,
}

impl TransactionType {
    /// Storage label for the type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Payment => "payment",
            Self::Refund => "refund",
        }
    }
}

/// Processor outcome of a transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Waiting on the processor
    Pending,
    /// Processor confirmed the money moved
    Succeeded,
    /// Processor reported a failure
    Failed,
}

impl TransactionStatus {
    /// Storage label for the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    /// Maps a processor status string onto ours. Anything not final is pending.
    #[must_use]
    pub fn from_processor(status: &str) -> Self {
        match status {
            "succeeded" => Self::Succeeded,
            "failed" | "canceled" => Self::Failed,
            _ => Self::Pending,
        }
    }
}

impl TryFrom<&str> for TransactionStatus {
    type Error = errors::Error;

    fn try_from(value: &str) -> errors::Result<Self> {
        match value {
            "pending" => Ok(Self::Pending),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            other => Err(errors::Error::validation(format!(
                "unknown transaction status: {other}"
            ))),
        }
    }
}
