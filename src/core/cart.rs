//! Cart business logic - Collecting items before checkout.
//!
//! Lines are joined with their item and owner when listed, and totals are computed
//! by aggregate queries rather than stored. Availability is checked when an item
//! first enters the cart and again at checkout, not when its quantity changes.

use crate::{
    core::{items, notifications, receipts},
    entities::{
        CartItem, Item, cart_item, item, notification::NotificationType, receipt, user,
    },
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{
    FromQueryResult, JoinType, QueryOrder, QuerySelect, RelationTrait, Set, TransactionTrait,
    prelude::*,
    sea_query::{Expr, OnConflict},
};
use tracing::{debug, info};

/// A cart line joined with its item and the item's owner.
#[derive(Debug, Clone, PartialEq, FromQueryResult)]
pub struct CartLine {
    /// Cart row id
    pub cart_id: i64,
    /// Item id
    pub item_id: i64,
    /// Item title
    pub item_name: String,
    /// Item price for one rental window
    pub price: f64,
    /// Windows requested
    pub quantity: i32,
    /// Whether the item is still listed
    pub is_renting: bool,
    /// Whether the item is rented out by now
    pub is_rented: bool,
    /// Owner id
    pub owner_id: i64,
    /// Owner display name
    pub owner_name: String,
}

impl CartLine {
    /// Price of the line, `price * quantity`.
    #[must_use]
    pub fn subtotal(&self) -> f64 {
        self.price * f64::from(self.quantity)
    }
}

#[derive(Debug, FromQueryResult)]
struct CartAggregate {
    total: Option<f64>,
    count: Option<i64>,
}

fn find_line(user_id: i64, item_id: i64) -> Select<CartItem> {
    CartItem::find()
        .filter(cart_item::Column::UserId.eq(user_id))
        .filter(cart_item::Column::ItemId.eq(item_id))
}

/// Adds an item to the user's cart, or bumps its quantity if already there.
///
/// The `(user, item)` pair is unique in the table; a concurrent first add
/// lands on the conflict clause and increments instead of inserting twice.
pub async fn add_to_cart(
    db: &DatabaseConnection,
    user_id: i64,
    item_id: i64,
) -> Result<cart_item::Model> {
    let bump_quantity = Expr::col((cart_item::Entity, cart_item::Column::Quantity)).add(1);

    if find_line(user_id, item_id).one(db).await?.is_some() {
        CartItem::update_many()
            .col_expr(cart_item::Column::Quantity, bump_quantity)
            .filter(cart_item::Column::UserId.eq(user_id))
            .filter(cart_item::Column::ItemId.eq(item_id))
            .exec(db)
            .await?;
    } else {
        let item = Item::find_by_id(item_id)
            .one(db)
            .await?
            .ok_or_else(|| Error::not_found("item", item_id))?;
        if item.owner_id == user_id {
            return Err(Error::validation("You cannot rent your own item"));
        }
        if !item.is_available() {
            return Err(Error::validation(format!(
                "item {item_id} is not available for rent"
            )));
        }

        let line = cart_item::ActiveModel {
            user_id: Set(user_id),
            item_id: Set(item_id),
            quantity: Set(1),
            added_at: Set(Utc::now()),
            ..Default::default()
        };
        CartItem::insert(line)
            .on_conflict(
                OnConflict::columns([cart_item::Column::UserId, cart_item::Column::ItemId])
                    .value(cart_item::Column::Quantity, bump_quantity)
                    .to_owned(),
            )
            .exec_without_returning(db)
            .await?;
        info!("User {} added item {} to cart", user_id, item_id);
    }

    let line = find_line(user_id, item_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("cart item", item_id))?;
    debug!("Cart line {} for user {} now x{}", line.id, user_id, line.quantity);
    Ok(line)
}

/// Sets the quantity of a cart line. Zero removes the line.
pub async fn update_cart_quantity(
    db: &DatabaseConnection,
    user_id: i64,
    item_id: i64,
    quantity: i32,
) -> Result<Option<cart_item::Model>> {
    if quantity < 0 {
        return Err(Error::validation("Quantity cannot be negative"));
    }
    if quantity == 0 {
        remove_from_cart(db, user_id, item_id).await?;
        return Ok(None);
    }

    let line = find_line(user_id, item_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("cart item", item_id))?;

    let mut active: cart_item::ActiveModel = line.into();
    active.quantity = Set(quantity);
    Ok(Some(active.update(db).await?))
}

/// Removes an item from the user's cart. Returns whether a line was removed.
pub async fn remove_from_cart(db: &DatabaseConnection, user_id: i64, item_id: i64) -> Result<bool> {
    let result = CartItem::delete_many()
        .filter(cart_item::Column::UserId.eq(user_id))
        .filter(cart_item::Column::ItemId.eq(item_id))
        .exec(db)
        .await?;
    Ok(result.rows_affected > 0)
}

/// Empties the user's cart. Returns the number of lines removed.
pub async fn clear_cart<C>(db: &C, user_id: i64) -> Result<u64>
where
    C: ConnectionTrait,
{
    let result = CartItem::delete_many()
        .filter(cart_item::Column::UserId.eq(user_id))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

/// The user's cart lines with item and owner details, oldest first.
pub async fn list_cart<C>(db: &C, user_id: i64) -> Result<Vec<CartLine>>
where
    C: ConnectionTrait,
{
    CartItem::find()
        .select_only()
        .column_as(cart_item::Column::Id, "cart_id")
        .column_as(cart_item::Column::ItemId, "item_id")
        .column_as(item::Column::Name, "item_name")
        .column_as(item::Column::Price, "price")
        .column_as(cart_item::Column::Quantity, "quantity")
        .column_as(item::Column::IsRenting, "is_renting")
        .column_as(item::Column::IsRented, "is_rented")
        .column_as(item::Column::OwnerId, "owner_id")
        .column_as(user::Column::DisplayName, "owner_name")
        .join(JoinType::InnerJoin, cart_item::Relation::Item.def())
        .join(JoinType::InnerJoin, item::Relation::Owner.def())
        .filter(cart_item::Column::UserId.eq(user_id))
        .order_by_asc(cart_item::Column::AddedAt)
        .order_by_asc(cart_item::Column::Id)
        .into_model::<CartLine>()
        .all(db)
        .await
        .map_err(Into::into)
}

async fn cart_aggregate(db: &DatabaseConnection, user_id: i64) -> Result<CartAggregate> {
    let aggregate = CartItem::find()
        .select_only()
        .column_as(Expr::cust("SUM(items.price * cart.quantity)"), "total")
        .column_as(
            Expr::col((cart_item::Entity, cart_item::Column::Quantity)).sum(),
            "count",
        )
        .join(JoinType::InnerJoin, cart_item::Relation::Item.def())
        .filter(cart_item::Column::UserId.eq(user_id))
        .into_model::<CartAggregate>()
        .one(db)
        .await?;
    Ok(aggregate.unwrap_or(CartAggregate {
        total: None,
        count: None,
    }))
}

/// Sum of `price * quantity` over the user's cart.
pub async fn cart_total(db: &DatabaseConnection, user_id: i64) -> Result<f64> {
    Ok(cart_aggregate(db, user_id).await?.total.unwrap_or(0.0))
}

/// Number of rental windows in the user's cart (sum of quantities).
pub async fn cart_count(db: &DatabaseConnection, user_id: i64) -> Result<i64> {
    Ok(cart_aggregate(db, user_id).await?.count.unwrap_or(0))
}

/// Turns the user's cart into active rentals for `[start_date, end_date]`.
///
/// Each line becomes one receipt priced at `price * quantity`; its item is
/// marked rented and both parties are notified. The cart is emptied. Everything
/// happens in one database transaction, so an unavailable item aborts the whole
/// checkout.
pub async fn checkout(
    db: &DatabaseConnection,
    user_id: i64,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
) -> Result<Vec<receipt::Model>> {
    if end_date <= start_date {
        return Err(Error::validation("Rental end date must be after its start date"));
    }

    let txn = db.begin().await?;

    let lines = list_cart(&txn, user_id).await?;
    if lines.is_empty() {
        return Err(Error::validation("Cart is empty"));
    }

    let mut created = Vec::with_capacity(lines.len());
    for line in &lines {
        let item = Item::find_by_id(line.item_id)
            .one(&txn)
            .await?
            .ok_or_else(|| Error::not_found("item", line.item_id))?;

        items::mark_item_rented(&txn, item.id, user_id).await?;
        let receipt =
            receipts::create_receipt(&txn, &item, user_id, start_date, end_date, line.subtotal())
                .await?;

        notifications::notify(
            &txn,
            user_id,
            NotificationType::RentalStarted,
            format!("Your rental of '{}' has started", item.name),
            Some(item.id),
            Some(receipt.id),
        )
        .await?;
        notifications::notify(
            &txn,
            item.owner_id,
            NotificationType::ItemRentedOut,
            format!("Your item '{}' has been rented", item.name),
            Some(item.id),
            Some(receipt.id),
        )
        .await?;

        created.push(receipt);
    }

    clear_cart(&txn, user_id).await?;
    txn.commit().await?;

    info!(
        "User {} checked out {} items into receipts {:?}",
        user_id,
        created.len(),
        created.iter().map(|r| r.id).collect::<Vec<_>>()
    );
    Ok(created)
}
