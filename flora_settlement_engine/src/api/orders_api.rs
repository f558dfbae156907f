//! Unified read API for orders.

use std::fmt::Debug;

use log::trace;

use crate::{
    api::order_objects::{OrderDetails, OrderQueryFilter},
    db_types::{Order, OrderId},
    traits::{OrderApiError, OrderManagement},
};

pub struct OrderApi<B> {
    db: B,
}

impl<B: Debug> Debug for OrderApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderApi ({:?})", self.db)
    }
}

impl<B> OrderApi<B>
where B: OrderManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub async fn order_by_id(&self, order_id: &OrderId) -> Result<Option<Order>, OrderApiError> {
        self.db.fetch_order_by_order_id(order_id).await
    }

    /// Fetches an order together with its line items, audit trail, payment transaction and
    /// review. Returns `None` if the order does not exist.
    pub async fn order_details(&self, order_id: &OrderId) -> Result<Option<OrderDetails>, OrderApiError> {
        let order = match self.db.fetch_order_by_order_id(order_id).await? {
            Some(order) => order,
            None => return Ok(None),
        };
        let items = self.db.fetch_order_items(order_id).await?;
        let history = self.db.fetch_status_history(order_id).await?;
        let transaction = self.db.fetch_transaction_for_order(order_id).await?;
        let review = self.db.fetch_review_for_order(order_id).await?;
        Ok(Some(OrderDetails { order, items, history, transaction, review }))
    }

    pub async fn search(&self, query: OrderQueryFilter) -> Result<Vec<Order>, OrderApiError> {
        trace!("🔍️ Order search: {query}");
        self.db.search_orders(query).await
    }
}
