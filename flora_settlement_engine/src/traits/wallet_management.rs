use fpg_common::Vnd;
use thiserror::Error;

use crate::{
    db_types::{FarmerWallet, OrderId, WalletEntry},
    traits::BalanceAudit,
};

/// The single choke point for farmer balance mutation. Nothing else in the system may write to a
/// wallet. Every mutation appends a ledger entry and adjusts the cached balance in one atomic
/// statement pair, inside one transaction.
#[allow(async_fn_in_trait)]
pub trait WalletManagement: Clone {
    async fn fetch_wallet(&self, farmer_id: &str) -> Result<Option<FarmerWallet>, WalletApiError>;

    /// The wallet's ledger, oldest entry first.
    async fn fetch_wallet_entries(&self, farmer_id: &str) -> Result<Vec<WalletEntry>, WalletApiError>;

    /// Credits the farmer's wallet, creating it if this is the first credit. The row creation is
    /// an upsert keyed on the farmer id, so concurrent first credits cannot create duplicates.
    async fn credit_wallet(
        &self,
        farmer_id: &str,
        amount: Vnd,
        description: &str,
        order_id: Option<&OrderId>,
    ) -> Result<FarmerWallet, WalletApiError>;

    /// Debits the farmer's wallet. Fails with [`WalletApiError::InsufficientBalance`] if the
    /// balance would go negative; the balance is never clamped.
    async fn debit_wallet(
        &self,
        farmer_id: &str,
        amount: Vnd,
        description: &str,
        order_id: Option<&OrderId>,
    ) -> Result<FarmerWallet, WalletApiError>;

    /// Replays the ledger and compares the result with the cached balance column.
    async fn audit_wallet(&self, farmer_id: &str) -> Result<BalanceAudit, WalletApiError>;
}

#[derive(Debug, Clone, Error)]
pub enum WalletApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("No wallet exists for farmer {0}")]
    WalletNotFound(String),
    #[error("Insufficient balance in wallet {farmer_id}: {requested} requested, {balance} available")]
    InsufficientBalance { farmer_id: String, balance: Vnd, requested: Vnd },
    #[error("Refusing to apply a non-positive wallet mutation of {0}")]
    NonPositiveAmount(Vnd),
}

impl From<sqlx::Error> for WalletApiError {
    fn from(e: sqlx::Error) -> Self {
        WalletApiError::DatabaseError(e.to_string())
    }
}
