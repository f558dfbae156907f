use chrono::Duration;
use fpg_common::Vnd;
use thiserror::Error;

use crate::{
    db_types::{Actor, NewOrder, NewReview, Order, OrderId, OrderStatus, RefundJob, Review},
    gateway::PaymentEvent,
    traits::{
        CancellationOutcome,
        EscrowOutcome,
        OrderApiError,
        OrderManagement,
        SettlementOutcome,
        WalletApiError,
        WalletManagement,
    },
};

/// The highest level of behaviour for settlement engine backends.
///
/// This behaviour includes:
/// * Creating orders with their line items and pending payment transaction.
/// * Applying normalized payment events exactly once, under at-least-once webhook delivery.
/// * Enforcing the order lifecycle with an append-only audit trail.
/// * Releasing or refunding escrowed funds exactly once per order.
/// * Driving the asynchronous refund queue.
///
/// Every settlement method is atomic: the idempotency claim, status transition, history entry,
/// escrow update and wallet mutation for one call either all commit or all roll back.
#[allow(async_fn_in_trait)]
pub trait SettlementDatabase: Clone + OrderManagement + WalletManagement {
    /// The URL of the database.
    fn url(&self) -> &str;

    /// Stores a new order, its line items, and a pending payment transaction in one atomic
    /// transaction. The call is idempotent: if the order id already exists, the stored order is
    /// returned and the second element is `false`.
    async fn insert_order(&self, order: NewOrder) -> Result<(Order, bool), SettlementError>;

    /// Applies a successful payment event. In a single atomic transaction:
    /// * claims the event id in the idempotency ledger (an existing claim short-circuits to
    ///   [`SettlementOutcome::AlreadyProcessed`]),
    /// * checks the event amount against the order total,
    /// * transitions the order `pending → paid` with a conditional update,
    /// * appends the history entry,
    /// * marks the payment transaction completed with the provider transaction id, funds held in
    ///   escrow.
    ///
    /// Any failure rolls the whole unit back, including the idempotency claim, so a provider
    /// retry can reapply cleanly.
    async fn settle_successful_payment(&self, event: &PaymentEvent) -> Result<SettlementOutcome, SettlementError>;

    /// Records a failed payment outcome. Claims the event id and marks the transaction `failed`
    /// (leaving the order `pending` so the buyer can retry with a fresh payment attempt).
    async fn record_failed_payment(&self, event: &PaymentEvent) -> Result<SettlementOutcome, SettlementError>;

    /// Transitions an order to `new_status`, appending the audit entry in the same transaction.
    ///
    /// The update is conditional on the current status still being one that permits the edge, so
    /// two racing writers cannot both take it: the loser gets
    /// [`SettlementError::InvalidTransition`] naming the rejected edge.
    ///
    /// This method performs no escrow side effects; cancellation goes through
    /// [`Self::cancel_order`] and release through [`Self::release_escrow`].
    async fn transition_order(
        &self,
        order_id: &OrderId,
        new_status: OrderStatus,
        note: Option<&str>,
        actor: &Actor,
    ) -> Result<Order, SettlementError>;

    /// Releases the escrowed funds for an order to its farmers. In a single atomic transaction:
    /// * flips the transaction's escrow status `held → released_to_farmer` with a conditional
    ///   update; if the escrow has already left `held`, returns
    ///   [`EscrowOutcome::AlreadySettled`] without touching anything else,
    /// * computes each farmer's sub-total from the order's line items, deducts the platform
    ///   commission per sub-total, and credits each farmer's wallet.
    async fn release_escrow(
        &self,
        order_id: &OrderId,
        commission_rate_bps: i64,
        reason: &str,
    ) -> Result<EscrowOutcome, SettlementError>;

    /// Cancels an order. In a single atomic transaction:
    /// * transitions the order to `cancelled` (conditional update; rejected after delivery),
    /// * appends the audit entry,
    /// * if the escrow was `held` on a completed payment, flips it to `refunded_to_buyer` and
    ///   enqueues a refund job for the refund worker.
    async fn cancel_order(
        &self,
        order_id: &OrderId,
        note: Option<&str>,
        actor: &Actor,
    ) -> Result<CancellationOutcome, SettlementError>;

    /// Stores a buyer review. The order must be `delivered` or `completed`, and at most one
    /// review exists per order; a second submission fails with
    /// [`SettlementError::DuplicateReview`].
    async fn insert_review(&self, review: NewReview) -> Result<Review, SettlementError>;

    /// Orders still in `delivered` whose last update is older than `older_than`. Input for the
    /// auto-complete pass of the settlement worker.
    async fn delivered_orders_older_than(&self, older_than: Duration) -> Result<Vec<Order>, SettlementError>;

    /// Orders in `delivered` or `completed` whose transaction is still `held`. These are releases
    /// that were interrupted before commit; the settlement worker re-runs them.
    async fn unsettled_orders(&self) -> Result<Vec<Order>, SettlementError>;

    /// Pending refund jobs whose next attempt is due.
    async fn due_refund_jobs(&self) -> Result<Vec<RefundJob>, SettlementError>;

    async fn complete_refund_job(&self, job_id: i64) -> Result<RefundJob, SettlementError>;

    /// Re-schedules a refund job after a transient provider failure, `delay` from now.
    async fn reschedule_refund_job(&self, job_id: i64, error: &str, delay: Duration)
        -> Result<RefundJob, SettlementError>;

    /// Gives up on a refund job and marks its order `disputed` for manual intervention, so the
    /// escrow state is never left ambiguous.
    async fn abandon_refund_job(&self, job_id: i64, error: &str) -> Result<(RefundJob, Order), SettlementError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), SettlementError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum SettlementError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Order {0} has no line items")]
    EmptyOrder(OrderId),
    #[error("No payment transaction exists for order {0}")]
    TransactionNotFound(OrderId),
    #[error("The payment for order {0} has not been completed, so its escrow cannot move")]
    PaymentNotCompleted(OrderId),
    #[error("Invalid status transition {from} → {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
    #[error("Payment amount mismatch: order total is {expected}, event carries {actual}")]
    AmountMismatch { expected: Vnd, actual: Vnd },
    #[error("Order {0} already has a review")]
    DuplicateReview(OrderId),
    #[error("Reviews are only accepted for delivered or completed orders, but the order is {0}")]
    ReviewNotAllowed(OrderStatus),
    #[error("Rating {0} is outside the accepted 1..=5 range")]
    InvalidRating(i64),
    #[error("The requested refund job {0} does not exist or is not pending")]
    RefundJobNotFound(i64),
    #[error("{0}")]
    WalletError(#[from] WalletApiError),
    #[error("{0}")]
    OrderError(#[from] OrderApiError),
}

impl From<sqlx::Error> for SettlementError {
    fn from(e: sqlx::Error) -> Self {
        SettlementError::DatabaseError(e.to_string())
    }
}
