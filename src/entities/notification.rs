//! Notification entity - A rental lifecycle event addressed to one user.

use crate::errors;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Notification database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "notifications")]
pub struct Model {
    /// Unique identifier for the notification
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Recipient
    pub user_id: i64,
    /// Event type, see [`NotificationType`]
    pub notification_type: String,
    /// Human-readable text
    pub message: String,
    /// Item the event concerns
    pub item_id: Option<i64>,
    /// Receipt the event concerns
    pub receipt_id: Option<i64>,
    /// Whether the recipient has seen it
    pub is_read: bool,
    /// When the event happened
    pub created_at: DateTimeUtc,
}

/// Defines relationships between notifications and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each notification belongs to one user
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// The fixed set of rental lifecycle events users are notified about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    /// Sent to the renter when a rental begins
    RentalStarted,
    /// Sent to the owner when their item is rented
    ItemRentedOut,
    /// Sent to the renter when a rental is closed
    RentalEnded,
    /// Sent to the owner when their item comes back
    ItemReturned,
    /// Sent to the renter when the item has been handed over
    ItemArrived,
}

impl NotificationType {
    /// Storage label for the type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RentalStarted => "rental_started",
            Self::ItemRentedOut => "item_rented_out",
            Self::RentalEnded => "rental_ended",
            Self::ItemReturned => "item_returned",
            Self::ItemArrived => "item_arrived",
        }
    }
}

impl TryFrom<&str> for NotificationType {
    type Error = errors::Error;

    fn try_from(value: &str) -> errors::Result<Self> {
        match value {
            "rental_started" => Ok(Self::RentalStarted),
            "item_rented_out" => Ok(Self::ItemRentedOut),
            "rental_ended" => Ok(Self::RentalEnded),
            "item_returned" => Ok(Self::ItemReturned),
            "item_arrived" => Ok(Self::ItemArrived),
            other => Err(errors::Error::validation(format!(
                "unknown notification type: {other}"
            ))),
        }
    }
}
