//! User business logic - Account creation and lookup.

use crate::{
    entities::{User, user},
    errors::{Error, Result},
};
use sea_orm::{Set, prelude::*};
use tracing::info;

/// Creates a user after checking that username and email are present and unused.
pub async fn create_user(
    db: &DatabaseConnection,
    username: &str,
    email: &str,
    display_name: &str,
) -> Result<user::Model> {
    let username = username.trim();
    let email = email.trim().to_lowercase();

    if username.is_empty() {
        return Err(Error::validation("Username cannot be empty"));
    }
    if email.is_empty() || !email.contains('@') {
        return Err(Error::validation(format!("Invalid email address: {email}")));
    }

    let taken = User::find()
        .filter(
            user::Column::Username
                .eq(username)
                .or(user::Column::Email.eq(email.as_str())),
        )
        .one(db)
        .await?;
    if taken.is_some() {
        return Err(Error::validation("Username or email already registered"));
    }

    let display_name = match display_name.trim() {
        "" => username.to_string(),
        name => name.to_string(),
    };

    let created = user::ActiveModel {
        username: Set(username.to_string()),
        email: Set(email),
        display_name: Set(display_name),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!("Created user '{}' (ID: {})", created.username, created.id);
    Ok(created)
}

/// Finds a user by primary key.
pub async fn get_user(db: &DatabaseConnection, user_id: i64) -> Result<Option<user::Model>> {
    User::find_by_id(user_id).one(db).await.map_err(Into::into)
}

/// Finds a user by username.
pub async fn get_user_by_username(
    db: &DatabaseConnection,
    username: &str,
) -> Result<Option<user::Model>> {
    User::find()
        .filter(user::Column::Username.eq(username.trim()))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Changes the name shown to other users.
pub async fn update_display_name(
    db: &DatabaseConnection,
    user_id: i64,
    display_name: &str,
) -> Result<user::Model> {
    let display_name = display_name.trim();
    if display_name.is_empty() {
        return Err(Error::validation("Display name cannot be empty"));
    }

    let existing = User::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("user", user_id))?;

    let mut active: user::ActiveModel = existing.into();
    active.display_name = Set(display_name.to_string());
    active.update(db).await.map_err(Into::into)
}
