use sqlx::SqliteConnection;

use crate::{
    db_types::{NewReview, OrderId, Review},
    traits::SettlementError,
};

/// Inserts a buyer review. The unique constraint on `order_id` makes review submission idempotent
/// per order: a second insert maps to [`SettlementError::DuplicateReview`].
pub(crate) async fn insert(review: &NewReview, conn: &mut SqliteConnection) -> Result<Review, SettlementError> {
    let photos = serde_json::to_string(&review.photos)
        .map_err(|e| SettlementError::DatabaseError(format!("could not serialize review photos: {e}")))?;
    let row = sqlx::query_as(
        r#"
            INSERT INTO reviews (order_id, buyer_id, rating, comment, photos)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *;
        "#,
    )
    .bind(&review.order_id)
    .bind(&review.buyer_id)
    .bind(review.rating)
    .bind(&review.comment)
    .bind(photos)
    .fetch_one(conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(err) if err.is_unique_violation() => {
            SettlementError::DuplicateReview(review.order_id.clone())
        },
        _ => SettlementError::from(e),
    })?;
    Ok(row)
}

pub async fn fetch_for_order(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Review>, sqlx::Error> {
    let review =
        sqlx::query_as("SELECT * FROM reviews WHERE order_id = $1").bind(order_id.as_str()).fetch_optional(conn).await?;
    Ok(review)
}
