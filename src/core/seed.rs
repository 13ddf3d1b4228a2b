//! Seeding a fresh database from the `[[users]]` and `[[listings]]` tables of
//! config.toml. Entries that already exist are skipped, so seeding is safe to
//! run on every start.

use crate::{
    config::marketplace::Config,
    core::{
        items::{self, NewItem},
        users,
    },
    entities::{Item, item, item::Category, item::Condition},
    errors::{Error, Result},
};
use sea_orm::prelude::*;
use tracing::{debug, info, instrument, warn};

/// What a seeding run created.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    /// Users inserted
    pub users_created: usize,
    /// Listings inserted
    pub listings_created: usize,
}

/// Creates the configured users and listings that are not in the database yet.
///
/// A listing is considered present when its owner already has an item with the
/// same name.
#[instrument(skip(db, config))]
pub async fn seed_from_config(db: &DatabaseConnection, config: &Config) -> Result<SeedSummary> {
    info!(
        "Seeding {} users and {} listings from config",
        config.users.len(),
        config.listings.len()
    );
    let mut summary = SeedSummary::default();

    for seed in &config.users {
        if users::get_user_by_username(db, &seed.username).await?.is_some() {
            debug!("User '{}' already exists, skipping", seed.username);
            continue;
        }
        users::create_user(db, &seed.username, &seed.email, &seed.display_name).await?;
        summary.users_created += 1;
    }

    for seed in &config.listings {
        let owner = users::get_user_by_username(db, &seed.owner)
            .await?
            .ok_or_else(|| Error::Config {
                message: format!(
                    "listing '{}' names unknown owner '{}'",
                    seed.name, seed.owner
                ),
            })?;

        let existing = Item::find()
            .filter(item::Column::OwnerId.eq(owner.id))
            .filter(item::Column::Name.eq(seed.name.trim()))
            .one(db)
            .await?;
        if existing.is_some() {
            debug!("Listing '{}' of '{}' already exists, skipping", seed.name, seed.owner);
            continue;
        }

        let tags = seed
            .tags
            .iter()
            .map(|t| Category::try_from(t.as_str()))
            .collect::<Result<Vec<_>>>()?;
        let condition = Condition::try_from(seed.condition.as_str())?;

        items::create_item(
            db,
            owner.id,
            NewItem {
                name: seed.name.clone(),
                description: seed.description.clone(),
                price: seed.price,
                condition,
                tags,
            },
        )
        .await?;
        summary.listings_created += 1;
    }

    if summary == SeedSummary::default() {
        warn!("Seeding created nothing; database already up to date");
    } else {
        info!(
            "Seeded {} users and {} listings",
            summary.users_created, summary.listings_created
        );
    }
    Ok(summary)
}
