//! Message entity - A direct message between two users, optionally about a listing.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Message database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "messages")]
pub struct Model {
    /// Unique identifier for the message
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Author
    pub sender_id: i64,
    /// Addressee
    pub recipient_id: i64,
    /// Listing the conversation is about, if any
    pub item_id: Option<i64>,
    /// Message text, never blank
    pub body: String,
    /// Whether the recipient has opened it
    pub is_read: bool,
    /// When it was sent
    pub created_at: DateTimeUtc,
}

/// Defines relationships between messages and users
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// The user who wrote the message
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::SenderId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Sender,
    /// The user it was sent to
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::RecipientId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Recipient,
}

impl ActiveModelBehavior for ActiveModel {}
