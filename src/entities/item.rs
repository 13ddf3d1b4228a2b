//! Item entity - A listing that an owner offers for rent.
//!
//! Availability is tracked with two flags: `is_renting` (listed for rent) and
//! `is_rented` (currently out with a renter). An item can only be rented while it
//! is listed. Tags are drawn from the fixed [`Category`] set and stored as a
//! comma-separated string.

use crate::errors;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Item database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "items")]
pub struct Model {
    /// Unique identifier for the item
    #[sea_orm(primary_key)]
    pub id: i64,
    /// User who listed the item
    pub owner_id: i64,
    /// User currently renting the item, if any
    pub renter_id: Option<i64>,
    /// Listing title
    pub name: String,
    /// Free-text listing description
    pub description: String,
    /// Rental price for one rental window
    pub price: f64,
    /// Condition label, see [`Condition`]
    pub condition: String,
    /// Comma-separated category labels, see [`Category`]
    pub tags: String,
    /// Whether the owner has listed the item for rent
    pub is_renting: bool,
    /// Whether the item is currently rented out
    pub is_rented: bool,
    /// Average rating, rounded to one decimal
    pub rating: f64,
    /// Number of renters who rated the item
    pub rating_count: i32,
    /// Sum of all current ratings
    pub total_rating_points: i64,
    /// When the item was listed
    pub created_at: DateTimeUtc,
}

impl Model {
    /// Parses the stored tag string back into categories.
    pub fn categories(&self) -> errors::Result<Vec<Category>> {
        Category::parse_list(&self.tags)
    }

    /// True when the item is listed and nobody is renting it.
    #[must_use]
    pub const fn is_available(&self) -> bool {
        self.is_renting && !self.is_rented
    }
}

/// Defines relationships between Item and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// The listing owner
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::OwnerId",
        to = "super::user::Column::Id"
    )]
    Owner,
    /// The current renter
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::RenterId",
        to = "super::user::Column::Id"
    )]
    Renter,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Owner.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Fixed set of catalog categories an item can be tagged with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Phones, cameras, consoles
    Electronics,
    /// Power and hand tools
    Tools,
    /// Sporting goods
    Sports,
    /// Camping and hiking gear
    Outdoors,
    /// Books
    Books,
    /// Instruments and audio gear
    Music,
    /// Clothing and costumes
    Clothing,
    /// Furniture and appliances
    Home,
    /// Bikes, scooters, trailers
    Vehicles,
    /// Anything else
    Other,
}

impl Category {
    /// Every category, in display order.
    pub const ALL: [Self; 10] = [
        Self::Electronics,
        Self::Tools,
        Self::Sports,
        Self::Outdoors,
        Self::Books,
        Self::Music,
        Self::Clothing,
        Self::Home,
        Self::Vehicles,
        Self::Other,
    ];

    /// Storage label for the category.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Electronics => "electronics",
            Self::Tools => "tools",
            Self::Sports => "sports",
            Self::Outdoors => "outdoors",
            Self::Books => "books",
            Self::Music => "music",
            Self::Clothing => "clothing",
            Self::Home => "home",
            Self::Vehicles => "vehicles",
            Self::Other => "other",
        }
    }

    /// Parses a comma-separated tag list. Blank entries are skipped, duplicates
    /// collapse, unknown labels are rejected.
    pub fn parse_list(tags: &str) -> errors::Result<Vec<Self>> {
        let mut categories = Vec::new();
        for label in tags.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let category = Self::try_from(label)?;
            if !categories.contains(&category) {
                categories.push(category);
            }
        }
        Ok(categories)
    }

    /// Joins categories into the stored comma-separated form.
    #[must_use]
    pub fn join(categories: &[Self]) -> String {
        categories
            .iter()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl TryFrom<&str> for Category {
    type Error = errors::Error;

    fn try_from(value: &str) -> errors::Result<Self> {
        let lowered = value.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == lowered)
            .ok_or_else(|| errors::Error::validation(format!("unknown category: {value}")))
    }
}

/// Physical condition of a listed item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// Unused
    New,
    /// Used but indistinguishable from new
    LikeNew,
    /// Normal wear
    Good,
    /// Visible wear, fully functional
    Fair,
    /// Heavy wear
    Poor,
}

impl Condition {
    /// Storage label for the condition.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::LikeNew => "like_new",
            Self::Good => "good",
            Self::Fair => "fair",
            Self::Poor => "poor",
        }
    }
}

impl TryFrom<&str> for Condition {
    type Error = errors::Error;

    fn try_from(value: &str) -> errors::Result<Self> {
        match value {
            "new" => Ok(Self::New),
            "like_new" => Ok(Self::LikeNew),
            "good" => Ok(Self::Good),
            "fair" => Ok(Self::Fair),
            "poor" => Ok(Self::Poor),
            other => Err(errors::Error::validation(format!("unknown condition: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_parse_list_trims_and_dedups() {
        let parsed = Category::parse_list(" tools, Outdoors ,tools,,").unwrap();
        assert_eq!(parsed, vec![Category::Tools, Category::Outdoors]);
        assert_eq!(Category::join(&parsed), "tools,outdoors");
    }

    #[test]
    fn test_parse_list_rejects_unknown_label() {
        let result = Category::parse_list("tools,spaceships");
        assert!(matches!(result, Err(errors::Error::Validation { .. })));
    }

    #[test]
    fn test_empty_tag_string_is_no_categories() {
        assert!(Category::parse_list("").unwrap().is_empty());
    }

    #[test]
    fn test_condition_labels() {
        for condition in [
            Condition::New,
            Condition::LikeNew,
            Condition::Good,
            Condition::Fair,
            Condition::Poor,
        ] {
            assert_eq!(Condition::try_from(condition.as_str()).unwrap(), condition);
        }
        assert!(Condition::try_from("mint").is_err());
    }
}
