//! Notification business logic - Lifecycle events addressed to users.

use crate::{
    entities::{Notification, notification, notification::NotificationType},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, prelude::*, sea_query::Expr};
use tracing::debug;

/// Records a notification for `user_id`.
///
/// Generic over the connection so rental flows can notify inside their own
/// database transaction.
pub async fn notify<C>(
    db: &C,
    user_id: i64,
    notification_type: NotificationType,
    message: String,
    item_id: Option<i64>,
    receipt_id: Option<i64>,
) -> Result<notification::Model>
where
    C: ConnectionTrait,
{
    let created = notification::ActiveModel {
        user_id: Set(user_id),
        notification_type: Set(notification_type.as_str().to_string()),
        message: Set(message),
        item_id: Set(item_id),
        receipt_id: Set(receipt_id),
        is_read: Set(false),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    debug!(
        "Notified user {} of {} (notification {})",
        user_id,
        notification_type.as_str(),
        created.id
    );
    Ok(created)
}

/// A user's notifications, newest first.
pub async fn list_notifications(
    db: &DatabaseConnection,
    user_id: i64,
    unread_only: bool,
) -> Result<Vec<notification::Model>> {
    let mut query = Notification::find().filter(notification::Column::UserId.eq(user_id));
    if unread_only {
        query = query.filter(notification::Column::IsRead.eq(false));
    }
    query
        .order_by_desc(notification::Column::CreatedAt)
        .order_by_desc(notification::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Number of unread notifications for a user.
pub async fn unread_count(db: &DatabaseConnection, user_id: i64) -> Result<u64> {
    Notification::find()
        .filter(notification::Column::UserId.eq(user_id))
        .filter(notification::Column::IsRead.eq(false))
        .count(db)
        .await
        .map_err(Into::into)
}

/// Marks one of the user's notifications as read.
pub async fn mark_read(
    db: &DatabaseConnection,
    user_id: i64,
    notification_id: i64,
) -> Result<notification::Model> {
    let existing = Notification::find_by_id(notification_id)
        .filter(notification::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("notification", notification_id))?;

    let mut active: notification::ActiveModel = existing.into();
    active.is_read = Set(true);
    active.update(db).await.map_err(Into::into)
}

/// Marks every notification of a user as read. Returns how many changed.
pub async fn mark_all_read(db: &DatabaseConnection, user_id: i64) -> Result<u64> {
    let result = Notification::update_many()
        .col_expr(notification::Column::IsRead, Expr::value(true))
        .filter(notification::Column::UserId.eq(user_id))
        .filter(notification::Column::IsRead.eq(false))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

/// Deletes one of the user's notifications.
pub async fn delete_notification(
    db: &DatabaseConnection,
    user_id: i64,
    notification_id: i64,
) -> Result<()> {
    let result = Notification::delete_many()
        .filter(notification::Column::Id.eq(notification_id))
        .filter(notification::Column::UserId.eq(user_id))
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        return Err(Error::not_found("notification", notification_id));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_notify_and_list_newest_first() -> Result<()> {
        let db = setup_test_db().await?;
        let user = create_test_user(&db, "alice").await?;

        let first = notify(
            &db,
            user.id,
            NotificationType::RentalStarted,
            "first".to_string(),
            None,
            None,
        )
        .await?;
        let second = notify(
            &db,
            user.id,
            NotificationType::ItemArrived,
            "second".to_string(),
            None,
            None,
        )
        .await?;

        let all = list_notifications(&db, user.id, false).await?;
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, second.id);
        assert_eq!(all[1].id, first.id);
        assert_eq!(all[0].notification_type, "item_arrived");
        assert_eq!(unread_count(&db, user.id).await?, 2);

        Ok(())
    }

    #[tokio::test]
    async fn test_mark_read_and_mark_all_read() -> Result<()> {
        let db = setup_test_db().await?;
        let user = create_test_user(&db, "alice").await?;
        let other = create_test_user(&db, "bob").await?;

        let n1 = notify(&db, user.id, NotificationType::RentalEnded, "a".into(), None, None).await?;
        notify(&db, user.id, NotificationType::ItemReturned, "b".into(), None, None).await?;
        notify(&db, other.id, NotificationType::ItemReturned, "c".into(), None, None).await?;

        let foreign = mark_read(&db, other.id, n1.id).await;
        assert!(matches!(foreign, Err(Error::NotFound { .. })));

        let read = mark_read(&db, user.id, n1.id).await?;
        assert!(read.is_read);
        assert_eq!(unread_count(&db, user.id).await?, 1);
        assert_eq!(list_notifications(&db, user.id, true).await?.len(), 1);

        assert_eq!(mark_all_read(&db, user.id).await?, 1);
        assert_eq!(unread_count(&db, user.id).await?, 0);
        assert_eq!(unread_count(&db, other.id).await?, 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_delete_notification() -> Result<()> {
        let db = setup_test_db().await?;
        let user = create_test_user(&db, "alice").await?;
        let n = notify(&db, user.id, NotificationType::RentalStarted, "x".into(), None, None).await?;

        delete_notification(&db, user.id, n.id).await?;
        assert!(list_notifications(&db, user.id, false).await?.is_empty());

        let again = delete_notification(&db, user.id, n.id).await;
        assert!(matches!(again, Err(Error::NotFound { .. })));

        Ok(())
    }
}
