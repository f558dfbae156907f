use chrono::Duration;
use log::{debug, trace};
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    api::order_objects::OrderQueryFilter,
    db_types::{NewOrder, Order, OrderId, OrderItem, OrderStatus},
    traits::SettlementError,
};

/// Inserts the order and its line items, returning `false` in the second element if an order with
/// this order id already exists. Call inside a transaction together with the matching
/// payment-transaction insert.
pub async fn idempotent_insert(
    order: &NewOrder,
    conn: &mut SqliteConnection,
) -> Result<(Order, bool), SettlementError> {
    let total = order.total();
    let inserted: Result<Order, sqlx::Error> = sqlx::query_as(
        r#"
            INSERT INTO orders (order_id, buyer_id, total, shipping_address)
            VALUES ($1, $2, $3, $4)
            RETURNING *;
        "#,
    )
    .bind(&order.order_id)
    .bind(&order.buyer_id)
    .bind(total)
    .bind(&order.shipping_address)
    .fetch_one(&mut *conn)
    .await;
    let row = match inserted {
        Ok(row) => row,
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            let existing = fetch_order_by_order_id(&order.order_id, conn)
                .await?
                .ok_or_else(|| SettlementError::OrderNotFound(order.order_id.clone()))?;
            return Ok((existing, false));
        },
        Err(e) => return Err(e.into()),
    };
    for item in &order.items {
        sqlx::query(
            r#"
                INSERT INTO order_items (order_id, product_id, farmer_id, quantity, unit_price, subtotal)
                VALUES ($1, $2, $3, $4, $5, $6);
            "#,
        )
        .bind(&order.order_id)
        .bind(&item.product_id)
        .bind(&item.farmer_id)
        .bind(item.quantity)
        .bind(item.unit_price)
        .bind(item.subtotal())
        .execute(&mut *conn)
        .await?;
    }
    debug!("📝️ Order [{}] inserted with id {}", row.order_id, row.id);
    Ok((row, true))
}

pub async fn fetch_order_by_order_id(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order =
        sqlx::query_as("SELECT * FROM orders WHERE order_id = $1").bind(order_id.as_str()).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_items_for_order(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<OrderItem>, sqlx::Error> {
    let items = sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id.as_str())
        .fetch_all(conn)
        .await?;
    Ok(items)
}

/// Atomically moves the order from `from` to `to`. The `WHERE status = from` clause is what makes
/// racing writers safe: exactly one of them gets a row back, the rest get `None`.
pub(crate) async fn checked_transition(
    order_id: &OrderId,
    from: OrderStatus,
    to: OrderStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, SettlementError> {
    let result: Option<Order> = sqlx::query_as(
        "UPDATE orders SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE order_id = $2 AND status = $3 RETURNING *",
    )
    .bind(to)
    .bind(order_id.as_str())
    .bind(from)
    .fetch_optional(conn)
    .await?;
    Ok(result)
}

/// Fetches orders according to criteria specified in the `OrderQueryFilter`.
///
/// Resulting orders are ordered by `created_at` in ascending order.
pub async fn search_orders(query: OrderQueryFilter, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let mut builder = QueryBuilder::new("SELECT * FROM orders ");
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(order_id) = query.order_id {
        where_clause.push("order_id = ");
        where_clause.push_bind_unseparated(order_id);
    }
    if let Some(buyer_id) = query.buyer_id {
        where_clause.push("buyer_id = ");
        where_clause.push_bind_unseparated(buyer_id);
    }
    if let Some(farmer_id) = query.farmer_id {
        where_clause
            .push("EXISTS (SELECT 1 FROM order_items WHERE order_items.order_id = orders.order_id AND farmer_id = ");
        where_clause.push_bind_unseparated(farmer_id);
        where_clause.push_unseparated(")");
    }
    if let Some(statuses) = query.status.as_ref().filter(|s| !s.is_empty()) {
        let statuses = statuses.iter().map(|s| format!("'{s}'")).collect::<Vec<_>>().join(",");
        where_clause.push(format!("status IN ({statuses})"));
    }
    if let Some(since) = query.since {
        where_clause.push("unixepoch(created_at) >= ");
        where_clause.push_bind_unseparated(since.timestamp());
    }
    if let Some(until) = query.until {
        where_clause.push("unixepoch(created_at) <= ");
        where_clause.push_bind_unseparated(until.timestamp());
    }
    builder.push(" ORDER BY created_at ASC");
    trace!("📝️ Executing query: {}", builder.sql());
    let orders = builder.build_query_as::<Order>().fetch_all(conn).await?;
    trace!("📝️ Result of search_orders: {} rows", orders.len());
    Ok(orders)
}

/// Orders still `delivered` that have not been touched for longer than `older_than`. These are the
/// candidates for auto-completion.
pub(crate) async fn delivered_older_than(
    older_than: Duration,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, SettlementError> {
    let rows = sqlx::query_as(
        "SELECT * FROM orders WHERE status = 'delivered' AND \
         (unixepoch(CURRENT_TIMESTAMP) - unixepoch(updated_at)) > $1",
    )
    .bind(older_than.num_seconds())
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

/// Delivered or completed orders whose escrow never left `held`. A non-empty result means a
/// release was interrupted before commit and must be resumed.
pub(crate) async fn unsettled(conn: &mut SqliteConnection) -> Result<Vec<Order>, SettlementError> {
    let rows = sqlx::query_as(
        r#"
        SELECT orders.*
        FROM orders JOIN transactions ON orders.order_id = transactions.order_id
        WHERE orders.status IN ('delivered', 'completed')
          AND transactions.status = 'completed'
          AND transactions.escrow_status = 'held'
        "#,
    )
    .fetch_all(conn)
    .await?;
    Ok(rows)
}
