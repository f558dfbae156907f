use fpg_common::Vnd;
use log::trace;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewOrder, OrderId, PaymentTransaction},
    traits::SettlementError,
};

/// Creates the pending payment record for a new order. One per order; duplicate inserts surface
/// the unique violation to the caller.
pub(crate) async fn insert_pending(
    order: &NewOrder,
    total: Vnd,
    conn: &mut SqliteConnection,
) -> Result<PaymentTransaction, sqlx::Error> {
    let tx = sqlx::query_as(
        r#"
            INSERT INTO transactions (order_id, buyer_id, amount, method)
            VALUES ($1, $2, $3, $4)
            RETURNING *;
        "#,
    )
    .bind(&order.order_id)
    .bind(&order.buyer_id)
    .bind(total)
    .bind(order.method)
    .fetch_one(conn)
    .await?;
    Ok(tx)
}

pub async fn fetch_by_order_id(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentTransaction>, sqlx::Error> {
    let tx = sqlx::query_as("SELECT * FROM transactions WHERE order_id = $1")
        .bind(order_id.as_str())
        .fetch_optional(conn)
        .await?;
    Ok(tx)
}

/// Marks the payment as completed and stores the provider transaction id. Conditional on the
/// transaction not already being completed, so a replayed event cannot overwrite a settled record.
pub(crate) async fn mark_completed(
    order_id: &OrderId,
    provider_txn_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentTransaction>, SettlementError> {
    let tx = sqlx::query_as(
        r#"
            UPDATE transactions
            SET status = 'completed', provider_txn_id = $1, updated_at = CURRENT_TIMESTAMP
            WHERE order_id = $2 AND status IN ('pending', 'failed')
            RETURNING *;
        "#,
    )
    .bind(provider_txn_id)
    .bind(order_id.as_str())
    .fetch_optional(conn)
    .await?;
    Ok(tx)
}

pub(crate) async fn mark_failed(
    order_id: &OrderId,
    provider_txn_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentTransaction>, SettlementError> {
    let tx = sqlx::query_as(
        r#"
            UPDATE transactions
            SET status = 'failed', provider_txn_id = $1, updated_at = CURRENT_TIMESTAMP
            WHERE order_id = $2 AND status = 'pending'
            RETURNING *;
        "#,
    )
    .bind(provider_txn_id)
    .bind(order_id.as_str())
    .fetch_optional(conn)
    .await?;
    Ok(tx)
}

/// Claims the escrow for release to the farmers. The `escrow_status = 'held'` condition is the
/// single-writer-wins commit marker: exactly one caller gets the row, everyone else gets `None`
/// and must not credit anyone.
pub(crate) async fn claim_release(
    order_id: &OrderId,
    reason: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentTransaction>, SettlementError> {
    let tx = sqlx::query_as(
        r#"
            UPDATE transactions
            SET escrow_status = 'released_to_farmer', release_reason = $1, updated_at = CURRENT_TIMESTAMP
            WHERE order_id = $2 AND status = 'completed' AND escrow_status = 'held'
            RETURNING *;
        "#,
    )
    .bind(reason)
    .bind(order_id.as_str())
    .fetch_optional(conn)
    .await?;
    trace!("🗃️ Escrow release claim for order {order_id}: {}", if tx.is_some() { "won" } else { "lost" });
    Ok(tx)
}

/// Claims the escrow for refund to the buyer. Same marker mechanics as [`claim_release`].
pub(crate) async fn claim_refund(
    order_id: &OrderId,
    reason: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentTransaction>, SettlementError> {
    let tx = sqlx::query_as(
        r#"
            UPDATE transactions
            SET escrow_status = 'refunded_to_buyer', release_reason = $1, updated_at = CURRENT_TIMESTAMP
            WHERE order_id = $2 AND status = 'completed' AND escrow_status = 'held'
            RETURNING *;
        "#,
    )
    .bind(reason)
    .bind(order_id.as_str())
    .fetch_optional(conn)
    .await?;
    Ok(tx)
}
