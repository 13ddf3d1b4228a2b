//! Marketplace configuration loading from config.toml
//!
//! The `[marketplace]` table carries runtime settings for the payment flows.
//! Optional `[[users]]` and `[[listings]]` tables describe demo data used to seed
//! a fresh database.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Runtime settings
    #[serde(default)]
    pub marketplace: MarketplaceSettings,
    /// Users to create on first run
    #[serde(default)]
    pub users: Vec<SeedUser>,
    /// Listings to create on first run
    #[serde(default)]
    pub listings: Vec<SeedListing>,
}

/// Runtime settings for the payment flows
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MarketplaceSettings {
    /// Currency used when the caller does not name one
    pub default_currency: String,
    /// How long a deposit authorization stays valid at the processor
    pub deposit_hold_days: i64,
}

impl Default for MarketplaceSettings {
    fn default() -> Self {
        Self {
            default_currency: "usd".to_string(),
            deposit_hold_days: 7,
        }
    }
}

/// A user to seed
#[derive(Debug, Deserialize, Clone)]
pub struct SeedUser {
    /// Unique login handle
    pub username: String,
    /// Unique contact email
    pub email: String,
    /// Name shown to other users
    pub display_name: String,
}

/// A listing to seed
#[derive(Debug, Deserialize, Clone)]
pub struct SeedListing {
    /// Username of the owner, must appear in `[[users]]` or already exist
    pub owner: String,
    /// Listing title
    pub name: String,
    /// Listing description
    #[serde(default)]
    pub description: String,
    /// Rental price
    pub price: f64,
    /// Condition label, e.g. `"good"`
    pub condition: String,
    /// Category labels, e.g. `["tools"]`
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Loads marketplace configuration from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - Required fields are missing
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read config file: {e}"),
    })?;

    parse_config(&contents)
}

/// Parses marketplace configuration from TOML text.
pub fn parse_config(contents: &str) -> Result<Config> {
    toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })
}

/// Loads configuration from `./config.toml`, or defaults when the file is absent.
pub fn load_default_config() -> Result<Config> {
    let path = Path::new("config.toml");
    if path.exists() {
        load_config(path)
    } else {
        tracing::warn!("config.toml not found, using default marketplace settings");
        Ok(Config::default())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;

    #[test]
    fn test_parse_marketplace_config() {
        let toml_str = r#"
            [marketplace]
            default_currency = "eur"
            deposit_hold_days = 5

            [[users]]
            username = "alice"
            email = "alice@example.com"
            display_name = "Alice"

            [[listings]]
            owner = "alice"
            name = "Cordless drill"
            price = 12.5
            condition = "good"
            tags = ["tools", "home"]
        "#;

        let config = parse_config(toml_str).unwrap();
        assert_eq!(config.marketplace.default_currency, "eur");
        assert_eq!(config.marketplace.deposit_hold_days, 5);
        assert_eq!(config.users.len(), 1);
        assert_eq!(config.listings[0].owner, "alice");
        assert_eq!(config.listings[0].price, 12.5);
        assert_eq!(config.listings[0].tags, vec!["tools", "home"]);
        assert!(config.listings[0].description.is_empty());
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.marketplace.default_currency, "usd");
        assert_eq!(config.marketplace.deposit_hold_days, 7);
        assert!(config.users.is_empty());
        assert!(config.listings.is_empty());
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let result = parse_config("[marketplace");
        assert!(matches!(result, Err(Error::Config { .. })));
    }
}
