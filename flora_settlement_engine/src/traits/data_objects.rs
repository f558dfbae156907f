use fpg_common::Vnd;
use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderId, RefundJob};

/// The result of applying a payment event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SettlementOutcome {
    /// The event was applied and the order is now `Paid`, with funds held in escrow.
    Paid(Order),
    /// The event id was seen before. Nothing was done; the caller should acknowledge the provider
    /// without reapplying side effects.
    AlreadyProcessed,
    /// A failed payment outcome was recorded against the transaction. The order is unchanged.
    FailureRecorded(Order),
}

/// One farmer's share of a released escrow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FarmerCredit {
    pub farmer_id: String,
    pub subtotal: Vnd,
    pub commission: Vnd,
    pub credited: Vnd,
}

/// The result of an escrow release attempt. Release uses the escrow status as a single-writer
/// commit marker, so exactly one caller observes `Released`; every other racer gets
/// `AlreadySettled` and must not credit anyone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EscrowOutcome {
    Released { order_id: OrderId, credits: Vec<FarmerCredit> },
    AlreadySettled,
}

/// The result of cancelling an order. `refund` is set when escrowed funds were returned to the
/// buyer, i.e. when the order had been paid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancellationOutcome {
    pub order: Order,
    pub refund: Option<RefundJob>,
}

/// A wallet consistency check: the cached balance column versus a replay of the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceAudit {
    pub farmer_id: String,
    pub cached: Vnd,
    pub replayed: Vnd,
}

impl BalanceAudit {
    pub fn is_consistent(&self) -> bool {
        self.cached == self.replayed
    }
}
