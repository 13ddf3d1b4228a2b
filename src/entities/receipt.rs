//! Receipt entity - The persisted record of one rental between an owner and a renter.
//!
//! Status moves one way only: `active` to `completed`, `cancelled` or `recalled`.
//! Being overdue is derived from the rental window and never stored.

use crate::errors;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Receipt database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "receipts")]
pub struct Model {
    /// Unique identifier for the receipt
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Rented item
    pub item_id: i64,
    /// Item owner at the time of rental
    pub owner_id: i64,
    /// User renting the item
    pub renter_id: i64,
    /// Start of the rental window
    pub start_date: DateTimeUtc,
    /// End of the rental window
    pub end_date: DateTimeUtc,
    /// Agreed rental price
    pub price: f64,
    /// Lifecycle status, see [`ReceiptStatus`]
    pub status: String,
    /// Amount actually paid, filled in once the processor confirms the charge
    pub amount_paid: Option<f64>,
    /// Processor reference of the confirmed charge
    pub transaction_id: Option<String>,
    /// When the receipt was created
    pub created_at: DateTimeUtc,
}

impl Model {
    /// Parsed lifecycle status.
    pub fn status(&self) -> errors::Result<ReceiptStatus> {
        ReceiptStatus::try_from(self.status.as_str())
    }

    /// A receipt is overdue while it is still active after its end date.
    #[must_use]
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status == ReceiptStatus::Active.as_str() && now > self.end_date
    }
}

/// Defines relationships between Receipt and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each receipt belongs to one item
    #[sea_orm(
        belongs_to = "super::item::Entity",
        from = "Column::ItemId",
        to = "super::item::Column::Id"
    )]
    Item,
}

impl Related<super::item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Item.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Lifecycle status of a rental receipt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptStatus {
    /// Rental in progress
    Active,
    /// Item returned
    Completed,
    /// Rental called off before it ran its course
    Cancelled,
    /// Owner recalled the item and the renter was refunded
    Recalled,
}

impl ReceiptStatus {
    /// Storage label for the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Recalled => "recalled",
        }
    }

    /// Only `active` receipts may move, and only to a terminal status.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self == Self::Active && next != Self::Active
    }
}

impl TryFrom<&str> for ReceiptStatus {
    type Error = errors::Error;

    fn try_from(value: &str) -> errors::Result<Self> {
        match value {
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            "recalled" => Ok(Self::Recalled),
            other => Err(errors::Error::validation(format!("unknown receipt status: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn receipt(status: ReceiptStatus, end_date: DateTime<Utc>) -> Model {
        Model {
            id: 1,
            item_id: 1,
            owner_id: 1,
            renter_id: 2,
            start_date: end_date - Duration::days(3),
            end_date,
            price: 30.0,
            status: status.as_str().to_string(),
            amount_paid: None,
            transaction_id: None,
            created_at: end_date - Duration::days(3),
        }
    }

    #[test]
    fn test_overdue_is_derived_from_status_and_end_date() {
        let now = Utc::now();
        assert!(receipt(ReceiptStatus::Active, now - Duration::hours(1)).is_overdue(now));
        assert!(!receipt(ReceiptStatus::Active, now + Duration::hours(1)).is_overdue(now));
        assert!(!receipt(ReceiptStatus::Completed, now - Duration::days(5)).is_overdue(now));
    }

    #[test]
    fn test_transitions_are_one_directional() {
        use ReceiptStatus::{Active, Cancelled, Completed, Recalled};
        assert!(Active.can_transition_to(Completed));
        assert!(Active.can_transition_to(Cancelled));
        assert!(Active.can_transition_to(Recalled));
        assert!(!Active.can_transition_to(Active));
        assert!(!Completed.can_transition_to(Active));
        assert!(!Recalled.can_transition_to(Completed));
        assert!(!Cancelled.can_transition_to(Recalled));
    }
}
