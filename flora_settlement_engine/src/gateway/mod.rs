//! Payment gateway adapters.
//!
//! Each provider module translates its vendor-specific callback or webhook shape into a
//! [`PaymentEvent`] after verifying the payload signature. Adapters are pure transformations: they
//! never touch the database, and a signature failure must stop the pipeline before any other
//! component runs.

use std::fmt::Display;

use fpg_common::Vnd;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::{OrderId, PaymentMethod};

pub mod payos;
pub mod vnpay;

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("The payload signature is missing or invalid")]
    InvalidSignature,
    #[error("Malformed provider payload: {0}")]
    MalformedPayload(String),
}

/// The outcome a provider reported for a payment attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentOutcome {
    Success,
    Failure { message: String },
}

impl PaymentOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PaymentOutcome::Success)
    }
}

/// A provider callback/webhook, normalized. This is the only shape the settlement flow consumes;
/// everything vendor-specific stays inside the adapter that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentEvent {
    /// Unique id for this provider event. Redeliveries of the same event carry the same id, which
    /// is what the idempotency ledger keys on.
    pub event_id: String,
    pub order_id: OrderId,
    pub amount: Vnd,
    pub provider_txn_id: String,
    pub method: PaymentMethod,
    pub outcome: PaymentOutcome,
    /// The provider's raw outcome code, kept for the audit trail.
    pub provider_code: String,
}

impl Display for PaymentEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} event [{}] for order {} ({})", self.method, self.event_id, self.order_id, self.amount)
    }
}
