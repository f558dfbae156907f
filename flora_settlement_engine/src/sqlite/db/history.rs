use sqlx::SqliteConnection;

use crate::db_types::{Actor, OrderId, OrderStatus, StatusHistoryEntry};

/// Appends one audit entry for a transition. Always called on the same transaction as the status
/// update it records.
pub(crate) async fn insert_entry(
    order_id: &OrderId,
    previous: OrderStatus,
    new: OrderStatus,
    note: Option<&str>,
    actor: &Actor,
    conn: &mut SqliteConnection,
) -> Result<StatusHistoryEntry, sqlx::Error> {
    let entry = sqlx::query_as(
        r#"
            INSERT INTO order_status_history (order_id, previous_status, new_status, note, actor_id, actor_role)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *;
        "#,
    )
    .bind(order_id.as_str())
    .bind(previous)
    .bind(new)
    .bind(note)
    .bind(&actor.id)
    .bind(actor.role)
    .fetch_one(conn)
    .await?;
    Ok(entry)
}

pub async fn entries_for_order(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<StatusHistoryEntry>, sqlx::Error> {
    let entries = sqlx::query_as("SELECT * FROM order_status_history WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id.as_str())
        .fetch_all(conn)
        .await?;
    Ok(entries)
}
