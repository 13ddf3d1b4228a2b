//! Framework-agnostic marketplace operations over a `DatabaseConnection`.

/// Cart lines, totals and checkout
pub mod cart;
/// Listings, availability and catalog search
pub mod items;
/// Direct messages between users
pub mod messages;
/// Lifecycle notifications
pub mod notifications;
/// Renter ratings and per-item aggregates
pub mod ratings;
/// Rental receipts and their lifecycle
pub mod receipts;
/// Seeding users and listings from config.toml
pub mod seed;
/// Marketplace members
pub mod users;
