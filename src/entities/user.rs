//! User entity - A marketplace member who can both list and rent items.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// User database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// Unique identifier for the user
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Login handle, unique across the marketplace
    #[sea_orm(unique)]
    pub username: String,
    /// Contact email, unique across the marketplace
    #[sea_orm(unique)]
    pub email: String,
    /// Name shown next to listings and messages
    pub display_name: String,
    /// When the account was created
    pub created_at: DateTimeUtc,
}

/// Users are referenced by other tables but own no relations themselves
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
