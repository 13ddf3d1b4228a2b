//! Receipt business logic - The rental lifecycle after checkout.
//!
//! Receipts start `active` and move exactly once to `completed`, `cancelled` or
//! `recalled`. Every terminal transition hands the item back to its owner.
//! Overdue rentals are found by comparing the end date with the current time;
//! nothing marks them in the table.

use crate::{
    core::{items, notifications},
    entities::{
        Receipt, item,
        notification::NotificationType,
        receipt::{self, ReceiptStatus},
    },
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::info;

/// Inserts an active receipt for `item` rented by `renter_id`.
pub(crate) async fn create_receipt<C>(
    db: &C,
    item: &item::Model,
    renter_id: i64,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    price: f64,
) -> Result<receipt::Model>
where
    C: ConnectionTrait,
{
    if end_date <= start_date {
        return Err(Error::validation("Rental end date must be after its start date"));
    }

    let created = receipt::ActiveModel {
        item_id: Set(item.id),
        owner_id: Set(item.owner_id),
        renter_id: Set(renter_id),
        start_date: Set(start_date),
        end_date: Set(end_date),
        price: Set(price),
        status: Set(ReceiptStatus::Active.as_str().to_string()),
        amount_paid: Set(None),
        transaction_id: Set(None),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(
        "Created receipt {} for item {} rented by {} ({} to {})",
        created.id, item.id, renter_id, start_date, end_date
    );
    Ok(created)
}

/// Finds a receipt by primary key.
pub async fn get_receipt(
    db: &DatabaseConnection,
    receipt_id: i64,
) -> Result<Option<receipt::Model>> {
    Receipt::find_by_id(receipt_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Rentals where the user is the renter, newest first.
pub async fn list_receipts_for_renter(
    db: &DatabaseConnection,
    renter_id: i64,
) -> Result<Vec<receipt::Model>> {
    Receipt::find()
        .filter(receipt::Column::RenterId.eq(renter_id))
        .order_by_desc(receipt::Column::CreatedAt)
        .order_by_desc(receipt::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Rentals of items the user owns, newest first.
pub async fn list_receipts_for_owner(
    db: &DatabaseConnection,
    owner_id: i64,
) -> Result<Vec<receipt::Model>> {
    Receipt::find()
        .filter(receipt::Column::OwnerId.eq(owner_id))
        .order_by_desc(receipt::Column::CreatedAt)
        .order_by_desc(receipt::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Active rentals whose end date has passed at `now`, most overdue first.
pub async fn list_overdue_receipts(
    db: &DatabaseConnection,
    now: DateTime<Utc>,
) -> Result<Vec<receipt::Model>> {
    Receipt::find()
        .filter(receipt::Column::Status.eq(ReceiptStatus::Active.as_str()))
        .filter(receipt::Column::EndDate.lt(now))
        .order_by_asc(receipt::Column::EndDate)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Moves an active receipt to a terminal status and frees its item.
async fn transition<C>(db: &C, receipt_id: i64, next: ReceiptStatus) -> Result<receipt::Model>
where
    C: ConnectionTrait,
{
    let existing = Receipt::find_by_id(receipt_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("receipt", receipt_id))?;

    let current = existing.status()?;
    if !current.can_transition_to(next) {
        return Err(Error::validation(format!(
            "receipt {receipt_id} is {} and cannot become {}",
            current.as_str(),
            next.as_str()
        )));
    }

    let mut active: receipt::ActiveModel = existing.into();
    active.status = Set(next.as_str().to_string());
    let updated = active.update(db).await?;

    items::release_item(db, updated.item_id).await?;
    info!("Receipt {} moved to {}", receipt_id, next.as_str());
    Ok(updated)
}

/// Closes a rental after the item came back, notifying both parties.
pub async fn complete_rental(db: &DatabaseConnection, receipt_id: i64) -> Result<receipt::Model> {
    let txn = db.begin().await?;

    let completed = transition(&txn, receipt_id, ReceiptStatus::Completed).await?;
    notifications::notify(
        &txn,
        completed.renter_id,
        NotificationType::RentalEnded,
        format!("Your rental #{} has ended", completed.id),
        Some(completed.item_id),
        Some(completed.id),
    )
    .await?;
    notifications::notify(
        &txn,
        completed.owner_id,
        NotificationType::ItemReturned,
        format!("Your item from rental #{} has been returned", completed.id),
        Some(completed.item_id),
        Some(completed.id),
    )
    .await?;

    txn.commit().await?;
    Ok(completed)
}

/// Calls off an active rental.
pub async fn cancel_rental(db: &DatabaseConnection, receipt_id: i64) -> Result<receipt::Model> {
    let txn = db.begin().await?;
    let cancelled = transition(&txn, receipt_id, ReceiptStatus::Cancelled).await?;
    txn.commit().await?;
    Ok(cancelled)
}

/// Marks an active rental as recalled by its owner.
pub async fn recall_receipt(db: &DatabaseConnection, receipt_id: i64) -> Result<receipt::Model> {
    let txn = db.begin().await?;
    let recalled = transition(&txn, receipt_id, ReceiptStatus::Recalled).await?;
    txn.commit().await?;
    Ok(recalled)
}

/// Tells the renter that the item of an active rental has been handed over.
pub async fn confirm_arrival(
    db: &DatabaseConnection,
    receipt_id: i64,
) -> Result<crate::entities::notification::Model> {
    let receipt = Receipt::find_by_id(receipt_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("receipt", receipt_id))?;

    if receipt.status()? != ReceiptStatus::Active {
        return Err(Error::validation(format!(
            "receipt {receipt_id} is not active"
        )));
    }

    notifications::notify(
        db,
        receipt.renter_id,
        NotificationType::ItemArrived,
        format!("The item for rental #{} has arrived", receipt.id),
        Some(receipt.item_id),
        Some(receipt.id),
    )
    .await
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::{items::get_item, notifications::list_notifications};
    use crate::test_utils::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_create_receipt_rejects_empty_window() -> Result<()> {
        let (db, _owner, item) = setup_with_item().await?;
        let renter = create_test_user(&db, "renter").await?;
        let now = Utc::now();

        let result = create_receipt(&db, &item, renter.id, now, now, 10.0).await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        Ok(())
    }

    #[tokio::test]
    async fn test_complete_rental_frees_item_and_notifies() -> Result<()> {
        let (db, owner, renter, item, receipt) = setup_with_rental().await?;

        let completed = complete_rental(&db, receipt.id).await?;
        assert_eq!(completed.status()?, ReceiptStatus::Completed);

        let item = get_item(&db, item.id).await?.unwrap();
        assert!(!item.is_rented);
        assert!(item.renter_id.is_none());

        let renter_notes = list_notifications(&db, renter.id, false).await?;
        assert!(renter_notes.iter().any(|n| n.notification_type == "rental_ended"));
        let owner_notes = list_notifications(&db, owner.id, false).await?;
        assert!(owner_notes.iter().any(|n| n.notification_type == "item_returned"));

        Ok(())
    }

    #[tokio::test]
    async fn test_terminal_receipts_cannot_move_again() -> Result<()> {
        let (db, _owner, _renter, _item, receipt) = setup_with_rental().await?;

        cancel_rental(&db, receipt.id).await?;

        let complete = complete_rental(&db, receipt.id).await;
        assert!(matches!(complete, Err(Error::Validation { .. })));
        let recall = recall_receipt(&db, receipt.id).await;
        assert!(matches!(recall, Err(Error::Validation { .. })));

        let stored = get_receipt(&db, receipt.id).await?.unwrap();
        assert_eq!(stored.status, "cancelled");

        let missing = cancel_rental(&db, 999).await;
        assert!(matches!(missing, Err(Error::NotFound { entity: "receipt", .. })));

        Ok(())
    }

    #[tokio::test]
    async fn test_list_receipts_by_party() -> Result<()> {
        let (db, owner, renter, _item, receipt) = setup_with_rental().await?;

        let as_renter = list_receipts_for_renter(&db, renter.id).await?;
        assert_eq!(as_renter.len(), 1);
        assert_eq!(as_renter[0].id, receipt.id);

        let as_owner = list_receipts_for_owner(&db, owner.id).await?;
        assert_eq!(as_owner.len(), 1);
        assert!(list_receipts_for_owner(&db, renter.id).await?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_overdue_receipts_are_derived() -> Result<()> {
        let (db, _owner, _renter, _item, receipt) = setup_with_rental().await?;

        let before_end = receipt.end_date - Duration::hours(1);
        assert!(list_overdue_receipts(&db, before_end).await?.is_empty());
        assert!(!receipt.is_overdue(before_end));

        let after_end = receipt.end_date + Duration::hours(1);
        let overdue = list_overdue_receipts(&db, after_end).await?;
        assert_eq!(overdue.len(), 1);
        assert!(overdue[0].is_overdue(after_end));

        complete_rental(&db, receipt.id).await?;
        assert!(list_overdue_receipts(&db, after_end).await?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_confirm_arrival_notifies_renter() -> Result<()> {
        let (db, _owner, renter, _item, receipt) = setup_with_rental().await?;

        let note = confirm_arrival(&db, receipt.id).await?;
        assert_eq!(note.user_id, renter.id);
        assert_eq!(note.notification_type, "item_arrived");
        assert_eq!(note.receipt_id, Some(receipt.id));

        complete_rental(&db, receipt.id).await?;
        let late = confirm_arrival(&db, receipt.id).await;
        assert!(matches!(late, Err(Error::Validation { .. })));

        Ok(())
    }
}
