use std::fmt::Debug;

use chrono::Duration;
use log::*;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Actor, NewOrder, NewReview, Order, OrderId, OrderStatus, RefundJob, Review},
    gateway::PaymentEvent,
    traits::{EscrowOutcome, SettlementDatabase, SettlementError, SettlementOutcome},
};

pub const DEFAULT_COMMISSION_RATE_BPS: i64 = 300;

/// Settlement behaviour knobs. Kept separate from the server configuration so the engine can be
/// driven from tests and tools without any environment.
#[derive(Debug, Clone, Copy)]
pub struct SettlementConfig {
    /// The platform's cut of each farmer sub-total, in basis points.
    pub commission_rate_bps: i64,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self { commission_rate_bps: DEFAULT_COMMISSION_RATE_BPS }
    }
}

/// The result of a manual status update, including any escrow movement it triggered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdateOutcome {
    pub order: Order,
    pub escrow: Option<EscrowOutcome>,
    pub refund: Option<RefundJob>,
}

/// The result of a review submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewOutcome {
    pub review: Review,
    pub order: Order,
    pub escrow: Option<EscrowOutcome>,
}

/// `SettlementApi` is the primary API for the payment and escrow settlement flows, in response to
/// provider payment events and buyer/farmer/admin order actions.
pub struct SettlementApi<B> {
    db: B,
    config: SettlementConfig,
}

impl<B> Debug for SettlementApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SettlementApi")
    }
}

impl<B> SettlementApi<B> {
    pub fn new(db: B, config: SettlementConfig) -> Self {
        Self { db, config }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> SettlementApi<B>
where B: SettlementDatabase
{
    /// Stores a new order with its line items and pending payment transaction. Idempotent on the
    /// order id.
    pub async fn create_order(&self, order: NewOrder) -> Result<(Order, bool), SettlementError> {
        let (order, inserted) = self.db.insert_order(order).await?;
        if inserted {
            debug!("🔄️📦️ Order {} created for buyer {} ({})", order.order_id, order.buyer_id, order.total);
        } else {
            debug!("🔄️📦️ Order {} already existed; returning the stored record", order.order_id);
        }
        Ok((order, inserted))
    }

    /// Applies a normalized payment event exactly once. Successful events move the order to
    /// `paid` with funds held in escrow; failed events are recorded against the transaction.
    pub async fn process_event(&self, event: &PaymentEvent) -> Result<SettlementOutcome, SettlementError> {
        trace!("🔄️💰️ Processing {event}");
        let outcome = match &event.outcome {
            crate::gateway::PaymentOutcome::Success => self.db.settle_successful_payment(event).await?,
            crate::gateway::PaymentOutcome::Failure { message } => {
                debug!("🔄️💰️ Provider reported failure for {event}: {message}");
                self.db.record_failed_payment(event).await?
            },
        };
        if matches!(outcome, SettlementOutcome::AlreadyProcessed) {
            info!("🔄️💰️ Event [{}] was already processed. Acknowledging without side effects.", event.event_id);
        }
        Ok(outcome)
    }

    /// Applies a manual status change from a buyer, farmer or admin.
    ///
    /// * `cancelled` runs the cancellation flow (refund of held escrow included).
    /// * Transitions into `delivered` or `completed` release the escrow to the farmers.
    /// * Everything else is a plain transition with an audit entry.
    pub async fn update_order_status(
        &self,
        order_id: &OrderId,
        new_status: OrderStatus,
        note: Option<&str>,
        actor: &Actor,
    ) -> Result<StatusUpdateOutcome, SettlementError> {
        if new_status == OrderStatus::Cancelled {
            let outcome = self.db.cancel_order(order_id, note, actor).await?;
            return Ok(StatusUpdateOutcome { order: outcome.order, escrow: None, refund: outcome.refund });
        }
        let order = self.db.transition_order(order_id, new_status, note, actor).await?;
        let escrow = match new_status {
            OrderStatus::Delivered => self.try_release(order_id, "order delivered").await?,
            OrderStatus::Completed => self.try_release(order_id, "order completed").await?,
            _ => None,
        };
        Ok(StatusUpdateOutcome { order, escrow, refund: None })
    }

    /// Stores a buyer review. Reviewing a `delivered` order confirms receipt: the order is moved
    /// to `completed` and the escrow released, if another actor has not already done so.
    pub async fn submit_review(&self, review: NewReview) -> Result<ReviewOutcome, SettlementError> {
        let order_id = review.order_id.clone();
        let buyer_id = review.buyer_id.clone();
        let review = self.db.insert_review(review).await?;
        let actor = Actor { id: buyer_id, role: crate::db_types::ActorRole::Buyer };
        let completion = self
            .db
            .transition_order(&order_id, OrderStatus::Completed, Some("Buyer submitted a review"), &actor)
            .await;
        let order = match completion {
            Ok(order) => order,
            // A racing admin update or the auto-complete worker may have closed the order
            // between the review insert and this transition. That is fine; the escrow claim
            // below stays idempotent either way.
            Err(SettlementError::InvalidTransition { .. }) => self
                .db
                .fetch_order_by_order_id(&order_id)
                .await?
                .ok_or_else(|| SettlementError::OrderNotFound(order_id.clone()))?,
            Err(e) => return Err(e),
        };
        let escrow = self.try_release(&order_id, "buyer confirmed receipt").await?;
        Ok(ReviewOutcome { review, order, escrow })
    }

    /// Auto-completes orders that have sat in `delivered` for longer than `older_than` without a
    /// dispute, releasing their escrow. Run periodically by the settlement worker.
    pub async fn auto_complete_delivered(
        &self,
        older_than: Duration,
    ) -> Result<Vec<StatusUpdateOutcome>, SettlementError> {
        let candidates = self.db.delivered_orders_older_than(older_than).await?;
        let mut completed = Vec::with_capacity(candidates.len());
        let actor = Actor::system();
        for order in candidates {
            let note = format!("Auto-completed after {} hours in delivered", older_than.num_hours());
            match self.db.transition_order(&order.order_id, OrderStatus::Completed, Some(&note), &actor).await {
                Ok(updated) => {
                    let escrow = self.release(&order.order_id, "auto-complete timeout").await?;
                    completed.push(StatusUpdateOutcome { order: updated, escrow: Some(escrow), refund: None });
                },
                Err(SettlementError::InvalidTransition { .. }) => {
                    // Someone beat the worker to it. Nothing to do.
                    trace!("🔄️🕰️ Order {} changed state before auto-completion", order.order_id);
                },
                Err(e) => return Err(e),
            }
        }
        Ok(completed)
    }

    /// Re-runs escrow release for delivered/completed orders whose funds are still held. This is
    /// the crash-recovery path: a release interrupted before commit leaves the escrow `held`, and
    /// this pass picks it up on the next worker tick.
    pub async fn reconcile_unsettled(&self) -> Result<usize, SettlementError> {
        let orders = self.db.unsettled_orders().await?;
        let mut released = 0;
        for order in &orders {
            if let EscrowOutcome::Released { .. } =
                self.release(&order.order_id, "settlement reconciliation").await?
            {
                warn!(
                    "🔄️🕰️ Escrow for order {} was still held after {}; released by reconciliation",
                    order.order_id, order.status
                );
                released += 1;
            }
        }
        Ok(released)
    }

    async fn release(&self, order_id: &OrderId, reason: &str) -> Result<EscrowOutcome, SettlementError> {
        self.db.release_escrow(order_id, self.config.commission_rate_bps, reason).await
    }

    /// Like [`Self::release`], but treats an order without a completed payment as "nothing to
    /// release". That arises when a never-paid dispute is resolved to `completed`; failing the
    /// whole call there would mask a status change that has already committed.
    async fn try_release(&self, order_id: &OrderId, reason: &str) -> Result<Option<EscrowOutcome>, SettlementError> {
        match self.release(order_id, reason).await {
            Ok(outcome) => Ok(Some(outcome)),
            Err(SettlementError::PaymentNotCompleted(_)) => {
                warn!("🔄️💰️ Order {order_id} closed without a completed payment; there is no escrow to release");
                Ok(None)
            },
            Err(e) => Err(e),
        }
    }

    // -------------------------------- Refund queue access for the worker --------------------------------

    pub async fn due_refund_jobs(&self) -> Result<Vec<RefundJob>, SettlementError> {
        self.db.due_refund_jobs().await
    }

    pub async fn complete_refund_job(&self, job_id: i64) -> Result<RefundJob, SettlementError> {
        self.db.complete_refund_job(job_id).await
    }

    pub async fn reschedule_refund_job(
        &self,
        job_id: i64,
        error: &str,
        delay: Duration,
    ) -> Result<RefundJob, SettlementError> {
        self.db.reschedule_refund_job(job_id, error, delay).await
    }

    pub async fn abandon_refund_job(&self, job_id: i64, error: &str) -> Result<(RefundJob, Order), SettlementError> {
        self.db.abandon_refund_job(job_id, error).await
    }
}
