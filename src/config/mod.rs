/// Database connection lifecycle and table creation
pub mod database;

/// Marketplace settings and seed data loaded from config.toml
pub mod marketplace;

/// Payment processor credentials from environment variables
pub mod payment;
