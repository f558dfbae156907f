use thiserror::Error;

use crate::{
    api::order_objects::OrderQueryFilter,
    db_types::{Order, OrderId, OrderItem, PaymentTransaction, Review, StatusHistoryEntry},
};

/// Read-side access to orders and their satellite records.
#[allow(async_fn_in_trait)]
pub trait OrderManagement: Clone {
    /// Fetches the order for the given order id, or `None` if it does not exist.
    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, OrderApiError>;

    async fn fetch_order_items(&self, order_id: &OrderId) -> Result<Vec<OrderItem>, OrderApiError>;

    /// The full audit trail for an order, oldest entry first.
    async fn fetch_status_history(&self, order_id: &OrderId) -> Result<Vec<StatusHistoryEntry>, OrderApiError>;

    async fn fetch_transaction_for_order(&self, order_id: &OrderId)
        -> Result<Option<PaymentTransaction>, OrderApiError>;

    async fn fetch_review_for_order(&self, order_id: &OrderId) -> Result<Option<Review>, OrderApiError>;

    /// Fetches orders matching the given filter, ordered by creation time.
    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, OrderApiError>;
}

#[derive(Debug, Clone, Error)]
pub enum OrderApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Invalid query: {0}")]
    QueryError(String),
}

impl From<sqlx::Error> for OrderApiError {
    fn from(e: sqlx::Error) -> Self {
        OrderApiError::DatabaseError(e.to_string())
    }
}
