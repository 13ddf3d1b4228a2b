//! Item rating entity - One renter's star rating of one item.
//! There is at most one row per (item, renter); re-rating replaces it.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Item rating database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "item_ratings")]
pub struct Model {
    /// Unique identifier for the rating
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Rated item
    pub item_id: i64,
    /// Renter who left the rating
    pub renter_id: i64,
    /// Stars, 0 to 5 inclusive
    pub rating: i32,
    /// When the rating was first left
    pub created_at: DateTimeUtc,
    /// When the rating was last changed
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between ratings and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// The rated item
    #[sea_orm(
        belongs_to = "super::item::Entity",
        from = "Column::ItemId",
        to = "super::item::Column::Id",
        on_delete = "Cascade"
    )]
    Item,
}

impl Related<super::item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Item.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
