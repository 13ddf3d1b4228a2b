//! Rating business logic - Renter ratings and the per-item aggregate.
//!
//! The aggregate lives on the item row (`rating`, `rating_count`,
//! `total_rating_points`) and is recomputed from the rating rows on every write.
//! A renter has at most one rating per item; rating again replaces it.

use crate::{
    entities::{Item, ItemRating, Receipt, item, item_rating, receipt, receipt::ReceiptStatus},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{
    FromQueryResult, PaginatorTrait, QueryOrder, QuerySelect, Set,
    prelude::*,
    sea_query::{Expr, OnConflict},
};
use tracing::info;

/// Lowest accepted rating.
pub const MIN_RATING: i32 = 0;
/// Highest accepted rating.
pub const MAX_RATING: i32 = 5;

#[derive(Debug, Default, FromQueryResult)]
struct RatingAggregate {
    total: Option<i64>,
    count: i64,
}

fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Records or replaces `renter_id`'s rating of an item and returns the item
/// with its refreshed aggregate.
///
/// The `(item, renter)` pair is unique in the table, so the write is a single
/// upsert.
///
/// Only renters with a completed rental of the item may rate it.
pub async fn add_item_rating(
    db: &DatabaseConnection,
    item_id: i64,
    renter_id: i64,
    rating: i32,
) -> Result<item::Model> {
    if !(MIN_RATING..=MAX_RATING).contains(&rating) {
        return Err(Error::InvalidRating { rating });
    }

    let item = Item::find_by_id(item_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("item", item_id))?;

    let completed_rentals = Receipt::find()
        .filter(receipt::Column::ItemId.eq(item_id))
        .filter(receipt::Column::RenterId.eq(renter_id))
        .filter(receipt::Column::Status.eq(ReceiptStatus::Completed.as_str()))
        .count(db)
        .await?;
    if completed_rentals == 0 {
        return Err(Error::PermissionDenied {
            message: format!("user {renter_id} has not completed a rental of item {item_id}"),
        });
    }

    let now = Utc::now();
    let row = item_rating::ActiveModel {
        item_id: Set(item_id),
        renter_id: Set(renter_id),
        rating: Set(rating),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    ItemRating::insert(row)
        .on_conflict(
            OnConflict::columns([item_rating::Column::ItemId, item_rating::Column::RenterId])
                .update_columns([item_rating::Column::Rating, item_rating::Column::UpdatedAt])
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;

    let aggregate = ItemRating::find()
        .select_only()
        .column_as(
            Expr::col((item_rating::Entity, item_rating::Column::Rating)).sum(),
            "total",
        )
        .column_as(
            Expr::col((item_rating::Entity, item_rating::Column::Id)).count(),
            "count",
        )
        .filter(item_rating::Column::ItemId.eq(item_id))
        .into_model::<RatingAggregate>()
        .one(db)
        .await?
        .unwrap_or_default();

    let total = aggregate.total.unwrap_or(0);
    let count = i32::try_from(aggregate.count).unwrap_or(i32::MAX);

    #[allow(clippy::cast_precision_loss)]
    let average = if count > 0 {
        round_to_tenth(total as f64 / f64::from(count))
    } else {
        0.0
    };

    let mut active: item::ActiveModel = item.into();
    active.rating = Set(average);
    active.rating_count = Set(count);
    active.total_rating_points = Set(total);
    let updated = active.update(db).await?;

    info!(
        "Item {} rated {} by user {} (avg {} over {})",
        item_id, rating, renter_id, average, count
    );
    Ok(updated)
}

/// The rating a renter gave an item, if any.
pub async fn get_rating_for_renter(
    db: &DatabaseConnection,
    item_id: i64,
    renter_id: i64,
) -> Result<Option<item_rating::Model>> {
    ItemRating::find()
        .filter(item_rating::Column::ItemId.eq(item_id))
        .filter(item_rating::Column::RenterId.eq(renter_id))
        .one(db)
        .await
        .map_err(Into::into)
}

/// All ratings of an item, most recently updated first.
pub async fn list_ratings_for_item(
    db: &DatabaseConnection,
    item_id: i64,
) -> Result<Vec<item_rating::Model>> {
    ItemRating::find()
        .filter(item_rating::Column::ItemId.eq(item_id))
        .order_by_desc(item_rating::Column::UpdatedAt)
        .order_by_desc(item_rating::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::test_utils::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[test]
    fn test_round_to_tenth() {
        assert_eq!(round_to_tenth(4.0 / 3.0), 1.3);
        assert_eq!(round_to_tenth(11.0 / 3.0), 3.7);
        assert_eq!(round_to_tenth(2.25), 2.3);
    }

    #[tokio::test]
    async fn test_rating_out_of_range_rejected() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();

        let high = add_item_rating(&db, 1, 2, 6).await;
        assert!(matches!(high, Err(Error::InvalidRating { rating: 6 })));
        let low = add_item_rating(&db, 1, 2, -1).await;
        assert!(matches!(low, Err(Error::InvalidRating { rating: -1 })));

        Ok(())
    }

    #[tokio::test]
    async fn test_rating_requires_completed_rental() -> Result<()> {
        let (db, _owner, renter, item, _receipt) = setup_with_rental().await?;

        let missing = add_item_rating(&db, 999, renter.id, 4).await;
        assert!(matches!(missing, Err(Error::NotFound { entity: "item", .. })));

        // Still active, not completed
        let early = add_item_rating(&db, item.id, renter.id, 4).await;
        assert!(matches!(early, Err(Error::PermissionDenied { .. })));
        assert!(list_ratings_for_item(&db, item.id).await?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_first_ratings_average() -> Result<()> {
        let (db, _owner, renter, item, _receipt) = setup_with_completed_rental().await?;
        let second = create_test_user(&db, "second").await?;
        complete_test_rental(&db, item.id, second.id).await?;

        let rated = add_item_rating(&db, item.id, renter.id, 4).await?;
        assert_eq!(rated.rating, 4.0);
        assert_eq!(rated.rating_count, 1);
        assert_eq!(rated.total_rating_points, 4);

        let rated = add_item_rating(&db, item.id, second.id, 5).await?;
        assert_eq!(rated.rating, 4.5);
        assert_eq!(rated.rating_count, 2);
        assert_eq!(rated.total_rating_points, 9);

        assert_eq!(list_ratings_for_item(&db, item.id).await?.len(), 2);

        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_ratings_keep_one_row_per_renter() -> Result<()> {
        let (db, _owner, renter, item, _receipt) = setup_with_completed_rental().await?;

        let (first, second) = tokio::join!(
            add_item_rating(&db, item.id, renter.id, 4),
            add_item_rating(&db, item.id, renter.id, 2)
        );
        first?;
        second?;

        assert_eq!(list_ratings_for_item(&db, item.id).await?.len(), 1);
        let stored = get_rating_for_renter(&db, item.id, renter.id).await?.unwrap();
        let item = crate::core::items::get_item(&db, item.id).await?.unwrap();
        assert_eq!(item.rating_count, 1);
        assert!(matches!(stored.rating, 2 | 4));
        assert!(matches!(item.total_rating_points, 2 | 4));

        Ok(())
    }

    #[tokio::test]
    async fn test_re_rating_replaces_previous_score() -> Result<()> {
        let (db, _owner, renter, item, _receipt) = setup_with_completed_rental().await?;
        let second = create_test_user(&db, "second").await?;
        let third = create_test_user(&db, "third").await?;
        complete_test_rental(&db, item.id, second.id).await?;
        complete_test_rental(&db, item.id, third.id).await?;

        add_item_rating(&db, item.id, renter.id, 1).await?;
        add_item_rating(&db, item.id, second.id, 1).await?;
        let rated = add_item_rating(&db, item.id, third.id, 2).await?;
        assert_eq!(rated.rating, 1.3);

        let rated = add_item_rating(&db, item.id, renter.id, 5).await?;
        assert_eq!(rated.rating_count, 3);
        assert_eq!(rated.total_rating_points, 8);
        assert_eq!(rated.rating, 2.7);

        let stored = get_rating_for_renter(&db, item.id, renter.id).await?.unwrap();
        assert_eq!(stored.rating, 5);
        assert_eq!(list_ratings_for_item(&db, item.id).await?.len(), 3);

        Ok(())
    }
}
