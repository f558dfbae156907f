//! Unified API for farmer wallets. All balance mutation in the system funnels through here and
//! the [`WalletManagement`] trait underneath it.

use std::fmt::Debug;

use fpg_common::Vnd;
use log::{debug, warn};

use crate::{
    db_types::{FarmerWallet, OrderId, WalletEntry},
    traits::{BalanceAudit, WalletApiError, WalletManagement},
};

pub struct WalletApi<B> {
    db: B,
}

impl<B: Debug> Debug for WalletApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WalletApi ({:?})", self.db)
    }
}

impl<B> WalletApi<B>
where B: WalletManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub async fn wallet(&self, farmer_id: &str) -> Result<Option<FarmerWallet>, WalletApiError> {
        self.db.fetch_wallet(farmer_id).await
    }

    pub async fn entries(&self, farmer_id: &str) -> Result<Vec<WalletEntry>, WalletApiError> {
        self.db.fetch_wallet_entries(farmer_id).await
    }

    /// Manual credit, e.g. a goodwill adjustment by an admin.
    pub async fn credit(
        &self,
        farmer_id: &str,
        amount: Vnd,
        description: &str,
        order_id: Option<&OrderId>,
    ) -> Result<FarmerWallet, WalletApiError> {
        debug!("💰️ Manual credit of {amount} to farmer {farmer_id}: {description}");
        self.db.credit_wallet(farmer_id, amount, description, order_id).await
    }

    /// Manual debit, e.g. a payout to the farmer's bank account. Rejected outright if the balance
    /// would go negative.
    pub async fn debit(
        &self,
        farmer_id: &str,
        amount: Vnd,
        description: &str,
        order_id: Option<&OrderId>,
    ) -> Result<FarmerWallet, WalletApiError> {
        debug!("💰️ Debit of {amount} from farmer {farmer_id}: {description}");
        self.db.debit_wallet(farmer_id, amount, description, order_id).await
    }

    /// Replays the wallet ledger and compares it with the cached balance. A mismatch means a
    /// write bypassed the wallet accessor and is logged loudly.
    pub async fn audit(&self, farmer_id: &str) -> Result<BalanceAudit, WalletApiError> {
        let audit = self.db.audit_wallet(farmer_id).await?;
        if !audit.is_consistent() {
            warn!(
                "💰️🚨️ Wallet {} is inconsistent: cached balance {} but the ledger replays to {}",
                audit.farmer_id, audit.cached, audit.replayed
            );
        }
        Ok(audit)
    }
}
