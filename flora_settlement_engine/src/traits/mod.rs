//! Behaviour definitions for settlement engine backends.
//!
//! A backend (e.g. the SQLite implementation in [`crate::sqlite`]) implements these traits to act
//! as the storage layer for the Flora payment server. The settlement methods are the atomicity
//! boundary: each one runs its whole unit of work in a single database transaction, so callers
//! never observe a partially-applied settlement.

mod data_objects;
mod order_management;
mod settlement_database;
mod wallet_management;

pub use data_objects::{BalanceAudit, CancellationOutcome, EscrowOutcome, FarmerCredit, SettlementOutcome};
pub use order_management::{OrderApiError, OrderManagement};
pub use settlement_database::{SettlementDatabase, SettlementError};
pub use wallet_management::{WalletApiError, WalletManagement};
