//! Security deposit entity - A hold placed on the renter's payment method.
//!
//! The hold is authorized up front and later either captured (damage) or
//! released (clean return). Both are terminal.

use crate::errors;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Security deposit database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "security_deposits")]
pub struct Model {
    /// Unique identifier for the deposit
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Receipt the deposit secures
    pub receipt_id: i64,
    /// Renter whose payment method is held
    pub renter_id: i64,
    /// Authorized amount in major currency units
    pub amount: f64,
    /// ISO currency code, lowercase
    pub currency: String,
    /// Processor payment intent holding the funds
    #[sea_orm(unique)]
    pub processor_ref: String,
    /// `"authorized"`, `"captured"` or `"released"`, see [`DepositStatus`]
    pub status: String,
    /// Amount kept on capture
    pub captured_amount: Option<f64>,
    /// When the processor drops the hold on its own
    pub expires_at: DateTimeUtc,
    /// When the hold was placed
    pub created_at: DateTimeUtc,
    /// When the status last changed
    pub updated_at: DateTimeUtc,
}

impl Model {
    /// Parsed deposit status.
    pub fn status(&self) -> errors::Result<DepositStatus> {
        DepositStatus::try_from(self.status.as_str())
    }
}

/// Defines relationships between deposits and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each deposit belongs to one receipt
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

/// Phase of the deposit hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepositStatus {
    /// Funds held, decision pending
    Authorized,
    /// Funds kept to cover damage
    Captured,
    /// Hold dropped after a clean return
    Released,
}

impl DepositStatus {
    /// Storage label for the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Authorized => "authorized",
            Self::Captured => "captured",
            Self::Released => "released",
        }
    }
}

impl TryFrom<&str> for DepositStatus {
    type Error = errors::Error;

    fn try_from(value: &str) -> errors::Result<Self> {
        match value {
            "authorized" => Ok(Self::Authorized),
            "captured" => Ok(Self::Captured),
            "released" => Ok(Self::Released),
            other => Err(errors::Error::validation(format!("unknown deposit status: {other}"))),
        }
    }
}
