//! `SqliteDatabase` is a concrete implementation of a Flora settlement engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the
//! [`crate::traits`] module. Each settlement method opens one transaction and runs its whole unit
//! of work on it, so a failure anywhere rolls everything back, including the idempotency claim.
use std::{collections::BTreeMap, fmt::Debug};

use chrono::Duration;
use fpg_common::Vnd;
use log::*;
use sqlx::SqlitePool;

use super::db::{db_url, history, new_pool, orders, refunds, reviews, transactions, wallets, webhook_events};
use crate::{
    api::order_objects::OrderQueryFilter,
    db_types::{
        Actor,
        FarmerWallet,
        NewOrder,
        NewReview,
        Order,
        OrderId,
        OrderItem,
        OrderStatus,
        PaymentTransaction,
        RefundJob,
        Review,
        StatusHistoryEntry,
        WalletEntry,
    },
    gateway::PaymentEvent,
    helpers::split_commission,
    traits::{
        BalanceAudit,
        CancellationOutcome,
        EscrowOutcome,
        FarmerCredit,
        OrderApiError,
        OrderManagement,
        SettlementDatabase,
        SettlementError,
        SettlementOutcome,
        WalletApiError,
        WalletManagement,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the URL from the environment.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Applies any outstanding schema migrations.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl SettlementDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_order(&self, order: NewOrder) -> Result<(Order, bool), SettlementError> {
        if order.items.is_empty() {
            return Err(SettlementError::EmptyOrder(order.order_id.clone()));
        }
        let mut tx = self.pool.begin().await?;
        let (row, inserted) = orders::idempotent_insert(&order, &mut tx).await?;
        if inserted {
            transactions::insert_pending(&order, row.total, &mut tx).await?;
            debug!("🗃️ Order {} saved with a pending {} transaction of {}", row.order_id, order.method, row.total);
        }
        tx.commit().await?;
        Ok((row, inserted))
    }

    async fn settle_successful_payment(&self, event: &PaymentEvent) -> Result<SettlementOutcome, SettlementError> {
        let mut tx = self.pool.begin().await?;
        if !webhook_events::claim(&event.event_id, event.method, &mut tx).await? {
            return Ok(SettlementOutcome::AlreadyProcessed);
        }
        let order = orders::fetch_order_by_order_id(&event.order_id, &mut tx)
            .await?
            .ok_or_else(|| SettlementError::OrderNotFound(event.order_id.clone()))?;
        if order.total != event.amount {
            return Err(SettlementError::AmountMismatch { expected: order.total, actual: event.amount });
        }
        let updated = orders::checked_transition(&event.order_id, OrderStatus::Pending, OrderStatus::Paid, &mut tx)
            .await?
            .ok_or(SettlementError::InvalidTransition { from: order.status, to: OrderStatus::Paid })?;
        let note = format!("Payment confirmed via {} (txn {})", event.method, event.provider_txn_id);
        history::insert_entry(
            &event.order_id,
            OrderStatus::Pending,
            OrderStatus::Paid,
            Some(&note),
            &Actor::system(),
            &mut tx,
        )
        .await?;
        transactions::mark_completed(&event.order_id, &event.provider_txn_id, &mut tx)
            .await?
            .ok_or_else(|| SettlementError::TransactionNotFound(event.order_id.clone()))?;
        tx.commit().await?;
        debug!("🔄️💰️ Order {} marked as paid. {} held in escrow.", event.order_id, event.amount);
        Ok(SettlementOutcome::Paid(updated))
    }

    async fn record_failed_payment(&self, event: &PaymentEvent) -> Result<SettlementOutcome, SettlementError> {
        let mut tx = self.pool.begin().await?;
        if !webhook_events::claim(&event.event_id, event.method, &mut tx).await? {
            return Ok(SettlementOutcome::AlreadyProcessed);
        }
        let order = orders::fetch_order_by_order_id(&event.order_id, &mut tx)
            .await?
            .ok_or_else(|| SettlementError::OrderNotFound(event.order_id.clone()))?;
        // The conditional update leaves completed transactions alone: a stray failure event for a
        // settled payment must not undo it.
        let marked = transactions::mark_failed(&event.order_id, &event.provider_txn_id, &mut tx).await?;
        tx.commit().await?;
        if marked.is_some() {
            debug!("🔄️💰️ Failed payment recorded against order {}. The order stays pending.", event.order_id);
        } else {
            warn!(
                "🔄️💰️ Failure event [{}] for order {} ignored: its transaction is no longer pending",
                event.event_id, event.order_id
            );
        }
        Ok(SettlementOutcome::FailureRecorded(order))
    }

    async fn transition_order(
        &self,
        order_id: &OrderId,
        new_status: OrderStatus,
        note: Option<&str>,
        actor: &Actor,
    ) -> Result<Order, SettlementError> {
        // `paid` is reserved for the payment event flow, `cancelled` for cancel_order, which also
        // settles the escrow side.
        if matches!(new_status, OrderStatus::Paid | OrderStatus::Cancelled) {
            let order = self.fetch_order_by_order_id(order_id).await?;
            let from = order.map(|o| o.status).unwrap_or(OrderStatus::Pending);
            return Err(SettlementError::InvalidTransition { from, to: new_status });
        }
        let mut tx = self.pool.begin().await?;
        let order = orders::fetch_order_by_order_id(order_id, &mut tx)
            .await?
            .ok_or_else(|| SettlementError::OrderNotFound(order_id.clone()))?;
        if !order.status.can_transition_to(new_status) {
            return Err(SettlementError::InvalidTransition { from: order.status, to: new_status });
        }
        let updated = orders::checked_transition(order_id, order.status, new_status, &mut tx)
            .await?
            .ok_or(SettlementError::InvalidTransition { from: order.status, to: new_status })?;
        history::insert_entry(order_id, order.status, new_status, note, actor, &mut tx).await?;
        tx.commit().await?;
        debug!("🔄️📦️ Order {order_id} moved {} → {new_status} by {} ({})", order.status, actor.id, actor.role);
        Ok(updated)
    }

    async fn release_escrow(
        &self,
        order_id: &OrderId,
        commission_rate_bps: i64,
        reason: &str,
    ) -> Result<EscrowOutcome, SettlementError> {
        let mut tx = self.pool.begin().await?;
        let claimed = transactions::claim_release(order_id, reason, &mut tx).await?;
        let txn = match claimed {
            Some(txn) => txn,
            None => {
                // Lost the claim, or there was nothing to claim. Work out which.
                return match transactions::fetch_by_order_id(order_id, &mut tx).await? {
                    None => Err(SettlementError::TransactionNotFound(order_id.clone())),
                    Some(t) if t.escrow_status != crate::db_types::EscrowStatus::Held => {
                        debug!("🔄️💰️ Escrow for order {order_id} is already {}; release is a no-op", t.escrow_status);
                        Ok(EscrowOutcome::AlreadySettled)
                    },
                    Some(_) => Err(SettlementError::PaymentNotCompleted(order_id.clone())),
                };
            },
        };
        let items = orders::fetch_items_for_order(order_id, &mut tx).await?;
        if items.is_empty() {
            return Err(SettlementError::EmptyOrder(order_id.clone()));
        }
        // Escrow is split per farmer sub-total, not per whole order: a bouquet from two farms
        // credits two wallets.
        let mut subtotals: BTreeMap<String, Vnd> = BTreeMap::new();
        for item in &items {
            let entry = subtotals.entry(item.farmer_id.clone()).or_default();
            *entry = *entry + item.subtotal;
        }
        let mut credits = Vec::with_capacity(subtotals.len());
        for (farmer_id, subtotal) in subtotals {
            let split = split_commission(subtotal, commission_rate_bps);
            let description = format!("Escrow release for order {order_id}: {reason}");
            wallets::credit(&farmer_id, split.farmer_amount, &description, Some(order_id), &mut tx).await?;
            credits.push(FarmerCredit {
                farmer_id,
                subtotal,
                commission: split.commission,
                credited: split.farmer_amount,
            });
        }
        tx.commit().await?;
        info!(
            "🔄️💰️ Escrow of {} for order {order_id} released to {} farmer(s) ({reason})",
            txn.amount,
            credits.len()
        );
        Ok(EscrowOutcome::Released { order_id: order_id.clone(), credits })
    }

    async fn cancel_order(
        &self,
        order_id: &OrderId,
        note: Option<&str>,
        actor: &Actor,
    ) -> Result<CancellationOutcome, SettlementError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::fetch_order_by_order_id(order_id, &mut tx)
            .await?
            .ok_or_else(|| SettlementError::OrderNotFound(order_id.clone()))?;
        if !order.status.can_transition_to(OrderStatus::Cancelled) {
            return Err(SettlementError::InvalidTransition { from: order.status, to: OrderStatus::Cancelled });
        }
        let updated = orders::checked_transition(order_id, order.status, OrderStatus::Cancelled, &mut tx)
            .await?
            .ok_or(SettlementError::InvalidTransition { from: order.status, to: OrderStatus::Cancelled })?;
        history::insert_entry(order_id, order.status, OrderStatus::Cancelled, note, actor, &mut tx).await?;
        let reason = note.unwrap_or("order cancelled");
        let refund = match transactions::claim_refund(order_id, reason, &mut tx).await? {
            Some(txn) => Some(refunds::enqueue(order_id, txn.amount, &mut tx).await?),
            // Nothing was held: the order was never paid, or the escrow already moved.
            None => None,
        };
        tx.commit().await?;
        info!(
            "🔄️📦️ Order {order_id} cancelled by {} ({}). Refund queued: {}",
            actor.id,
            actor.role,
            refund.is_some()
        );
        Ok(CancellationOutcome { order: updated, refund })
    }

    async fn insert_review(&self, review: NewReview) -> Result<Review, SettlementError> {
        if !review.rating_is_valid() {
            return Err(SettlementError::InvalidRating(review.rating));
        }
        let mut tx = self.pool.begin().await?;
        let order = orders::fetch_order_by_order_id(&review.order_id, &mut tx)
            .await?
            .ok_or_else(|| SettlementError::OrderNotFound(review.order_id.clone()))?;
        if !matches!(order.status, OrderStatus::Delivered | OrderStatus::Completed) {
            return Err(SettlementError::ReviewNotAllowed(order.status));
        }
        let row = reviews::insert(&review, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Review ({} stars) stored for order {}", row.rating, row.order_id);
        Ok(row)
    }

    async fn delivered_orders_older_than(&self, older_than: Duration) -> Result<Vec<Order>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        orders::delivered_older_than(older_than, &mut conn).await
    }

    async fn unsettled_orders(&self) -> Result<Vec<Order>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        orders::unsettled(&mut conn).await
    }

    async fn due_refund_jobs(&self) -> Result<Vec<RefundJob>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        refunds::due_jobs(&mut conn).await
    }

    async fn complete_refund_job(&self, job_id: i64) -> Result<RefundJob, SettlementError> {
        let mut tx = self.pool.begin().await?;
        let job = refunds::mark_completed(job_id, &mut tx).await?;
        tx.commit().await?;
        Ok(job)
    }

    async fn reschedule_refund_job(
        &self,
        job_id: i64,
        error: &str,
        delay: Duration,
    ) -> Result<RefundJob, SettlementError> {
        let mut tx = self.pool.begin().await?;
        let job = refunds::reschedule(job_id, error, delay, &mut tx).await?;
        tx.commit().await?;
        Ok(job)
    }

    async fn abandon_refund_job(&self, job_id: i64, error: &str) -> Result<(RefundJob, Order), SettlementError> {
        let mut tx = self.pool.begin().await?;
        let job = refunds::abandon(job_id, error, &mut tx).await?;
        let order = orders::fetch_order_by_order_id(&job.order_id, &mut tx)
            .await?
            .ok_or_else(|| SettlementError::OrderNotFound(job.order_id.clone()))?;
        // A cancelled order is terminal, so the dispute marker goes straight onto the row; the
        // audit entry records who put it there.
        let updated = sqlx::query_as(
            "UPDATE orders SET status = 'disputed', updated_at = CURRENT_TIMESTAMP WHERE order_id = $1 RETURNING *",
        )
        .bind(job.order_id.as_str())
        .fetch_one(&mut *tx)
        .await?;
        history::insert_entry(
            &job.order_id,
            order.status,
            OrderStatus::Disputed,
            Some(&format!("Refund abandoned after {} attempts: {error}", job.attempts)),
            &Actor::system(),
            &mut tx,
        )
        .await?;
        tx.commit().await?;
        error!(
            "💸️ Refund for order {} abandoned after {} attempts. The order is now disputed and needs manual \
             intervention. Last error: {error}",
            job.order_id, job.attempts
        );
        Ok((job, updated))
    }

    async fn close(&mut self) -> Result<(), SettlementError> {
        self.pool.close().await;
        Ok(())
    }
}

impl OrderManagement for SqliteDatabase {
    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, OrderApiError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_order_id(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_items(&self, order_id: &OrderId) -> Result<Vec<OrderItem>, OrderApiError> {
        let mut conn = self.pool.acquire().await?;
        let items = orders::fetch_items_for_order(order_id, &mut conn).await?;
        Ok(items)
    }

    async fn fetch_status_history(&self, order_id: &OrderId) -> Result<Vec<StatusHistoryEntry>, OrderApiError> {
        let mut conn = self.pool.acquire().await?;
        let entries = history::entries_for_order(order_id, &mut conn).await?;
        Ok(entries)
    }

    async fn fetch_transaction_for_order(
        &self,
        order_id: &OrderId,
    ) -> Result<Option<PaymentTransaction>, OrderApiError> {
        let mut conn = self.pool.acquire().await?;
        let txn = transactions::fetch_by_order_id(order_id, &mut conn).await?;
        Ok(txn)
    }

    async fn fetch_review_for_order(&self, order_id: &OrderId) -> Result<Option<Review>, OrderApiError> {
        let mut conn = self.pool.acquire().await?;
        let review = reviews::fetch_for_order(order_id, &mut conn).await?;
        Ok(review)
    }

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, OrderApiError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::search_orders(query, &mut conn).await?;
        Ok(orders)
    }
}

impl WalletManagement for SqliteDatabase {
    async fn fetch_wallet(&self, farmer_id: &str) -> Result<Option<FarmerWallet>, WalletApiError> {
        let mut conn = self.pool.acquire().await?;
        let wallet = wallets::fetch_wallet(farmer_id, &mut conn).await?;
        Ok(wallet)
    }

    async fn fetch_wallet_entries(&self, farmer_id: &str) -> Result<Vec<WalletEntry>, WalletApiError> {
        let mut conn = self.pool.acquire().await?;
        let entries = wallets::entries_for_farmer(farmer_id, &mut conn).await?;
        Ok(entries)
    }

    async fn credit_wallet(
        &self,
        farmer_id: &str,
        amount: Vnd,
        description: &str,
        order_id: Option<&OrderId>,
    ) -> Result<FarmerWallet, WalletApiError> {
        let mut tx = self.pool.begin().await.map_err(|e| WalletApiError::DatabaseError(e.to_string()))?;
        let wallet = wallets::credit(farmer_id, amount, description, order_id, &mut tx).await?;
        tx.commit().await.map_err(|e| WalletApiError::DatabaseError(e.to_string()))?;
        Ok(wallet)
    }

    async fn debit_wallet(
        &self,
        farmer_id: &str,
        amount: Vnd,
        description: &str,
        order_id: Option<&OrderId>,
    ) -> Result<FarmerWallet, WalletApiError> {
        let mut tx = self.pool.begin().await.map_err(|e| WalletApiError::DatabaseError(e.to_string()))?;
        let wallet = wallets::debit(farmer_id, amount, description, order_id, &mut tx).await?;
        tx.commit().await.map_err(|e| WalletApiError::DatabaseError(e.to_string()))?;
        Ok(wallet)
    }

    async fn audit_wallet(&self, farmer_id: &str) -> Result<BalanceAudit, WalletApiError> {
        let mut conn = self.pool.acquire().await?;
        let wallet = wallets::fetch_wallet(farmer_id, &mut conn)
            .await?
            .ok_or_else(|| WalletApiError::WalletNotFound(farmer_id.to_string()))?;
        let replayed = wallets::replay_balance(farmer_id, &mut conn).await?;
        Ok(BalanceAudit { farmer_id: farmer_id.to_string(), cached: wallet.balance, replayed })
    }
}
