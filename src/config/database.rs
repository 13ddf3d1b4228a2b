//! Database configuration module for the marketplace.
//!
//! This module handles the `SQLite` connection pool lifecycle and table creation using
//! `SeaORM`. The pool is created once by [`connect`], handed to every component that
//! needs it, and shut down with [`close`]. Tables are generated from the entity
//! definitions with `Schema::create_table_from_entity`, so the schema always matches
//! the Rust structs.

use crate::entities::{
    cart_item, item_rating, CartItem, Item, ItemRating, Message, Notification, PaymentTransaction, Receipt,
    SecurityDeposit, User,
};
use crate::errors::Result;
use sea_orm::{
    ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema, sea_query::Index,
};
use tracing::{debug, info};

/// Default database location when `DATABASE_URL` is not set.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/emart.sqlite?mode=rwc";

/// Gets the database URL from the environment, falling back to a local `SQLite` file.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Opens the connection pool for `database_url`.
pub async fn connect(database_url: &str) -> Result<DatabaseConnection> {
    let db = Database::connect(database_url).await?;
    info!("Connected to database at {database_url}");
    Ok(db)
}

/// Closes the connection pool. The connection must not be used afterwards.
pub async fn close(db: DatabaseConnection) -> Result<()> {
    db.close().await?;
    info!("Database connection closed");
    Ok(())
}

async fn create_table<E, C>(db: &C, schema: &Schema, entity: E) -> Result<()>
where
    E: EntityTrait,
    C: ConnectionTrait,
{
    let builder = db.get_database_backend();
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();
    db.execute(builder.build(&statement)).await?;
    debug!("Ensured table {}", entity.table_name());
    Ok(())
}

/// Creates all marketplace tables that do not exist yet.
///
/// Referenced tables are created before the tables pointing at them.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let schema = Schema::new(db.get_database_backend());

    create_table(db, &schema, User).await?;
    create_table(db, &schema, Item).await?;
    create_table(db, &schema, Receipt).await?;
    create_table(db, &schema, CartItem).await?;
    create_table(db, &schema, Notification).await?;
    create_table(db, &schema, Message).await?;
    create_table(db, &schema, ItemRating).await?;
    create_table(db, &schema, PaymentTransaction).await?;
    create_table(db, &schema, SecurityDeposit).await?;

    // One cart line per (user, item) and one rating per (item, renter)
    let builder = db.get_database_backend();
    let cart_line = Index::create()
        .if_not_exists()
        .name("idx_cart_user_item")
        .table(CartItem)
        .col(cart_item::Column::UserId)
        .col(cart_item::Column::ItemId)
        .unique()
        .to_owned();
    db.execute(builder.build(&cart_line)).await?;

    let renter_rating = Index::create()
        .if_not_exists()
        .name("idx_item_ratings_item_renter")
        .table(ItemRating)
        .col(item_rating::Column::ItemId)
        .col(item_rating::Column::RenterId)
        .unique()
        .to_owned();
    db.execute(builder.build(&renter_rating)).await?;
    debug!("Ensured unique indexes on cart and item_ratings");

    Ok(())
}
