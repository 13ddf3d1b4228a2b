//! Message business logic - Direct messages between renters and owners.

use crate::{
    entities::{Message, User, message},
    errors::{Error, Result},
};
use sea_orm::{Condition, QueryOrder, Set, prelude::*};
use tracing::debug;

/// Sends `body` from one user to another, optionally about a listing.
pub async fn send_message(
    db: &DatabaseConnection,
    sender_id: i64,
    recipient_id: i64,
    item_id: Option<i64>,
    body: &str,
) -> Result<message::Model> {
    let body = body.trim();
    if body.is_empty() {
        return Err(Error::validation("Message body cannot be empty"));
    }
    if sender_id == recipient_id {
        return Err(Error::validation("You cannot message yourself"));
    }

    for user_id in [sender_id, recipient_id] {
        if User::find_by_id(user_id).one(db).await?.is_none() {
            return Err(Error::not_found("user", user_id));
        }
    }

    let created = message::ActiveModel {
        sender_id: Set(sender_id),
        recipient_id: Set(recipient_id),
        item_id: Set(item_id),
        body: Set(body.to_string()),
        is_read: Set(false),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    debug!("Message {} sent from {} to {}", created.id, sender_id, recipient_id);
    Ok(created)
}

/// Every message exchanged between two users, oldest first.
pub async fn list_conversation(
    db: &DatabaseConnection,
    user_a: i64,
    user_b: i64,
) -> Result<Vec<message::Model>> {
    let between = Condition::any()
        .add(
            Condition::all()
                .add(message::Column::SenderId.eq(user_a))
                .add(message::Column::RecipientId.eq(user_b)),
        )
        .add(
            Condition::all()
                .add(message::Column::SenderId.eq(user_b))
                .add(message::Column::RecipientId.eq(user_a)),
        );

    Message::find()
        .filter(between)
        .order_by_asc(message::Column::CreatedAt)
        .order_by_asc(message::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Messages received by a user, newest first.
pub async fn list_inbox(
    db: &DatabaseConnection,
    user_id: i64,
    unread_only: bool,
) -> Result<Vec<message::Model>> {
    let mut query = Message::find().filter(message::Column::RecipientId.eq(user_id));
    if unread_only {
        query = query.filter(message::Column::IsRead.eq(false));
    }
    query
        .order_by_desc(message::Column::CreatedAt)
        .order_by_desc(message::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Marks a message as read. Only its recipient can do this.
pub async fn mark_message_read(
    db: &DatabaseConnection,
    user_id: i64,
    message_id: i64,
) -> Result<message::Model> {
    let existing = Message::find_by_id(message_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("message", message_id))?;

    if existing.recipient_id != user_id {
        return Err(Error::PermissionDenied {
            message: format!("message {message_id} was not sent to user {user_id}"),
        });
    }

    let mut active: message::ActiveModel = existing.into();
    active.is_read = Set(true);
    active.update(db).await.map_err(Into::into)
}
