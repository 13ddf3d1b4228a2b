//! Catalog business logic - Listing, browsing and availability of items.
//!
//! Availability follows two flags on the item: `is_renting` (the owner offers it)
//! and `is_rented` (a renter has it). The helpers here never let an item be rented
//! unless it is also listed.

use crate::{
    entities::{
        Item, Receipt, User, item,
        item::{Category, Condition},
        receipt,
    },
    errors::{Error, Result},
};
use sea_orm::{Condition as Where, QueryOrder, Set, prelude::*, sea_query::Expr};
use tracing::{debug, info};

/// Fields for a new listing.
#[derive(Debug, Clone)]
pub struct NewItem {
    /// Listing title
    pub name: String,
    /// Listing description
    pub description: String,
    /// Rental price for one window
    pub price: f64,
    /// Physical condition
    pub condition: Condition,
    /// Catalog categories
    pub tags: Vec<Category>,
}

/// Partial update of a listing; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct ItemUpdate {
    /// New title
    pub name: Option<String>,
    /// New description
    pub description: Option<String>,
    /// New price
    pub price: Option<f64>,
    /// New condition
    pub condition: Option<Condition>,
    /// New categories
    pub tags: Option<Vec<Category>>,
}

/// Ordering of catalog results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ItemSort {
    /// Most recently listed first
    #[default]
    Newest,
    /// Cheapest first
    PriceAsc,
    /// Most expensive first
    PriceDesc,
    /// Best rated first
    RatingDesc,
}

/// Catalog query. The default matches every item, newest first.
#[derive(Debug, Clone, Default)]
pub struct ItemFilter {
    /// Only items tagged with this category
    pub category: Option<Category>,
    /// Case-insensitive match against name or description
    pub search: Option<String>,
    /// Inclusive lower price bound
    pub min_price: Option<f64>,
    /// Inclusive upper price bound
    pub max_price: Option<f64>,
    /// Only items that are listed and not rented out
    pub available_only: bool,
    /// Only items listed by this user
    pub owner_id: Option<i64>,
    /// Result ordering
    pub sort: ItemSort,
}

fn validate_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::validation("Item name cannot be empty"));
    }
    Ok(name.to_string())
}

fn validate_price(price: f64) -> Result<f64> {
    if !price.is_finite() || price < 0.0 {
        return Err(Error::InvalidAmount { amount: price });
    }
    Ok(price)
}

/// Loads an item owned by `owner_id`, failing when it is missing or owned by someone else.
async fn get_owned_item(
    db: &DatabaseConnection,
    item_id: i64,
    owner_id: i64,
) -> Result<item::Model> {
    let item = Item::find_by_id(item_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("item", item_id))?;
    if item.owner_id != owner_id {
        return Err(Error::PermissionDenied {
            message: format!("user {owner_id} does not own item {item_id}"),
        });
    }
    Ok(item)
}

/// Lists a new item for rent on behalf of `owner_id`.
pub async fn create_item(
    db: &DatabaseConnection,
    owner_id: i64,
    new_item: NewItem,
) -> Result<item::Model> {
    let name = validate_name(&new_item.name)?;
    let price = validate_price(new_item.price)?;

    User::find_by_id(owner_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("user", owner_id))?;

    let created = item::ActiveModel {
        owner_id: Set(owner_id),
        renter_id: Set(None),
        name: Set(name),
        description: Set(new_item.description.trim().to_string()),
        price: Set(price),
        condition: Set(new_item.condition.as_str().to_string()),
        tags: Set(Category::join(&new_item.tags)),
        is_renting: Set(true),
        is_rented: Set(false),
        rating: Set(0.0),
        rating_count: Set(0),
        total_rating_points: Set(0),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(
        "Listed item '{}' (ID: {}) for owner {} at {}",
        created.name, created.id, owner_id, created.price
    );
    Ok(created)
}

/// Finds an item by primary key.
pub async fn get_item(db: &DatabaseConnection, item_id: i64) -> Result<Option<item::Model>> {
    Item::find_by_id(item_id).one(db).await.map_err(Into::into)
}

/// Applies an owner's edits to a listing.
pub async fn update_item(
    db: &DatabaseConnection,
    item_id: i64,
    owner_id: i64,
    update: ItemUpdate,
) -> Result<item::Model> {
    let existing = get_owned_item(db, item_id, owner_id).await?;
    let mut active: item::ActiveModel = existing.into();

    if let Some(name) = update.name {
        active.name = Set(validate_name(&name)?);
    }
    if let Some(description) = update.description {
        active.description = Set(description.trim().to_string());
    }
    if let Some(price) = update.price {
        active.price = Set(validate_price(price)?);
    }
    if let Some(condition) = update.condition {
        active.condition = Set(condition.as_str().to_string());
    }
    if let Some(tags) = update.tags {
        active.tags = Set(Category::join(&tags));
    }

    active.update(db).await.map_err(Into::into)
}

/// Lists or unlists an item. An item that is out with a renter cannot be unlisted.
pub async fn set_item_renting(
    db: &DatabaseConnection,
    item_id: i64,
    owner_id: i64,
    renting: bool,
) -> Result<item::Model> {
    let existing = get_owned_item(db, item_id, owner_id).await?;
    if !renting && existing.is_rented {
        return Err(Error::validation(format!(
            "item {item_id} is rented out and cannot be unlisted"
        )));
    }

    let mut active: item::ActiveModel = existing.into();
    active.is_renting = Set(renting);
    let updated = active.update(db).await?;
    info!("Item {} is_renting set to {}", item_id, renting);
    Ok(updated)
}

/// Removes a listing that is not rented and has no rental history.
pub async fn delete_item(db: &DatabaseConnection, item_id: i64, owner_id: i64) -> Result<()> {
    let existing = get_owned_item(db, item_id, owner_id).await?;
    if existing.is_rented {
        return Err(Error::validation(format!(
            "item {item_id} is rented out and cannot be deleted"
        )));
    }

    let receipts = Receipt::find()
        .filter(receipt::Column::ItemId.eq(item_id))
        .count(db)
        .await?;
    if receipts > 0 {
        return Err(Error::validation(format!(
            "item {item_id} has rental history and cannot be deleted"
        )));
    }

    existing.delete(db).await?;
    info!("Deleted item {}", item_id);
    Ok(())
}

fn category_condition(category: Category) -> Where {
    let label = category.as_str();
    Where::any()
        .add(item::Column::Tags.eq(label))
        .add(item::Column::Tags.like(format!("{label},%")))
        .add(item::Column::Tags.like(format!("%,{label}")))
        .add(item::Column::Tags.like(format!("%,{label},%")))
}

/// Browses the catalog.
pub async fn list_items(db: &DatabaseConnection, filter: &ItemFilter) -> Result<Vec<item::Model>> {
    let mut condition = Where::all();

    if let Some(category) = filter.category {
        condition = condition.add(category_condition(category));
    }
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{search}%");
        condition = condition.add(
            Where::any()
                .add(item::Column::Name.like(pattern.as_str()))
                .add(item::Column::Description.like(pattern.as_str())),
        );
    }
    if let Some(min_price) = filter.min_price {
        condition = condition.add(item::Column::Price.gte(min_price));
    }
    if let Some(max_price) = filter.max_price {
        condition = condition.add(item::Column::Price.lte(max_price));
    }
    if filter.available_only {
        condition = condition
            .add(item::Column::IsRenting.eq(true))
            .add(item::Column::IsRented.eq(false));
    }
    if let Some(owner_id) = filter.owner_id {
        condition = condition.add(item::Column::OwnerId.eq(owner_id));
    }

    let query = Item::find().filter(condition);
    let query = match filter.sort {
        ItemSort::Newest => query
            .order_by_desc(item::Column::CreatedAt)
            .order_by_desc(item::Column::Id),
        ItemSort::PriceAsc => query
            .order_by_asc(item::Column::Price)
            .order_by_asc(item::Column::Id),
        ItemSort::PriceDesc => query
            .order_by_desc(item::Column::Price)
            .order_by_asc(item::Column::Id),
        ItemSort::RatingDesc => query
            .order_by_desc(item::Column::Rating)
            .order_by_desc(item::Column::RatingCount)
            .order_by_asc(item::Column::Id),
    };

    let items = query.all(db).await?;
    debug!("Catalog query {:?} matched {} items", filter, items.len());
    Ok(items)
}

/// Items currently rented by `renter_id`.
pub async fn list_items_rented_by(
    db: &DatabaseConnection,
    renter_id: i64,
) -> Result<Vec<item::Model>> {
    Item::find()
        .filter(item::Column::RenterId.eq(renter_id))
        .filter(item::Column::IsRented.eq(true))
        .order_by_asc(item::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Hands an item to a renter. The item must be listed and not already rented.
pub(crate) async fn mark_item_rented<C>(db: &C, item_id: i64, renter_id: i64) -> Result<()>
where
    C: ConnectionTrait,
{
    let item = Item::find_by_id(item_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("item", item_id))?;
    if !item.is_available() {
        return Err(Error::validation(format!(
            "item {item_id} is not available for rent"
        )));
    }

    Item::update_many()
        .col_expr(item::Column::IsRented, Expr::value(true))
        .col_expr(item::Column::RenterId, Expr::value(Some(renter_id)))
        .filter(item::Column::Id.eq(item_id))
        .exec(db)
        .await?;
    Ok(())
}

/// Takes an item back from its renter. Listing status is left as the owner set it.
pub(crate) async fn release_item<C>(db: &C, item_id: i64) -> Result<()>
where
    C: ConnectionTrait,
{
    Item::update_many()
        .col_expr(item::Column::IsRented, Expr::value(false))
        .col_expr(item::Column::RenterId, Expr::value(Option::<i64>::None))
        .filter(item::Column::Id.eq(item_id))
        .exec(db)
        .await?;
    Ok(())
}
