use fpg_common::Vnd;
use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{FarmerWallet, OrderId, WalletEntry},
    traits::WalletApiError,
};

/// Credits a farmer's wallet. The wallet row is created lazily by the upsert, and the balance
/// adjustment is a single increment expression, so concurrent credits can neither duplicate the
/// wallet nor lose an update. The matching ledger entry is appended on the same connection;
/// callers run both inside one transaction.
pub(crate) async fn credit(
    farmer_id: &str,
    amount: Vnd,
    description: &str,
    order_id: Option<&OrderId>,
    conn: &mut SqliteConnection,
) -> Result<FarmerWallet, WalletApiError> {
    if amount.value() <= 0 {
        return Err(WalletApiError::NonPositiveAmount(amount));
    }
    let wallet: FarmerWallet = sqlx::query_as(
        r#"
            INSERT INTO farmer_wallets (farmer_id, balance, total_earned)
            VALUES ($1, $2, $2)
            ON CONFLICT (farmer_id) DO UPDATE SET
                balance = balance + excluded.balance,
                total_earned = total_earned + excluded.total_earned,
                updated_at = CURRENT_TIMESTAMP
            RETURNING *;
        "#,
    )
    .bind(farmer_id)
    .bind(amount)
    .fetch_one(&mut *conn)
    .await?;
    insert_entry(farmer_id, "credit", amount, description, order_id, conn).await?;
    debug!("🗃️ Credited {amount} to wallet of farmer {farmer_id}. New balance: {}", wallet.balance);
    Ok(wallet)
}

/// Debits a farmer's wallet. The `balance >= amount` condition rejects overdrafts atomically;
/// there is no window in which a racing debit can push the balance negative.
pub(crate) async fn debit(
    farmer_id: &str,
    amount: Vnd,
    description: &str,
    order_id: Option<&OrderId>,
    conn: &mut SqliteConnection,
) -> Result<FarmerWallet, WalletApiError> {
    if amount.value() <= 0 {
        return Err(WalletApiError::NonPositiveAmount(amount));
    }
    let wallet: Option<FarmerWallet> = sqlx::query_as(
        r#"
            UPDATE farmer_wallets
            SET balance = balance - $2, updated_at = CURRENT_TIMESTAMP
            WHERE farmer_id = $1 AND balance >= $2
            RETURNING *;
        "#,
    )
    .bind(farmer_id)
    .bind(amount)
    .fetch_optional(&mut *conn)
    .await?;
    let wallet = match wallet {
        Some(w) => w,
        None => {
            // Distinguish "no wallet" from "not enough in it".
            return match fetch_wallet(farmer_id, conn).await? {
                Some(w) => Err(WalletApiError::InsufficientBalance {
                    farmer_id: farmer_id.to_string(),
                    balance: w.balance,
                    requested: amount,
                }),
                None => Err(WalletApiError::WalletNotFound(farmer_id.to_string())),
            };
        },
    };
    insert_entry(farmer_id, "debit", amount, description, order_id, conn).await?;
    debug!("🗃️ Debited {amount} from wallet of farmer {farmer_id}. New balance: {}", wallet.balance);
    Ok(wallet)
}

async fn insert_entry(
    farmer_id: &str,
    entry_type: &str,
    amount: Vnd,
    description: &str,
    order_id: Option<&OrderId>,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
            INSERT INTO wallet_entries (farmer_id, entry_type, amount, description, order_id)
            VALUES ($1, $2, $3, $4, $5);
        "#,
    )
    .bind(farmer_id)
    .bind(entry_type)
    .bind(amount)
    .bind(description)
    .bind(order_id.map(OrderId::as_str))
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn fetch_wallet(
    farmer_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<FarmerWallet>, sqlx::Error> {
    let wallet = sqlx::query_as("SELECT * FROM farmer_wallets WHERE farmer_id = $1")
        .bind(farmer_id)
        .fetch_optional(conn)
        .await?;
    Ok(wallet)
}

pub async fn entries_for_farmer(
    farmer_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Vec<WalletEntry>, sqlx::Error> {
    let entries = sqlx::query_as("SELECT * FROM wallet_entries WHERE farmer_id = $1 ORDER BY id ASC")
        .bind(farmer_id)
        .fetch_all(conn)
        .await?;
    Ok(entries)
}

/// Replays the ledger for a farmer: the sum of credits minus the sum of debits. The cached wallet
/// balance must always equal this value.
pub(crate) async fn replay_balance(farmer_id: &str, conn: &mut SqliteConnection) -> Result<Vnd, sqlx::Error> {
    let total: i64 = sqlx::query_scalar(
        r#"
            SELECT COALESCE(SUM(CASE WHEN entry_type = 'credit' THEN amount ELSE -amount END), 0)
            FROM wallet_entries
            WHERE farmer_id = $1;
        "#,
    )
    .bind(farmer_id)
    .fetch_one(conn)
    .await?;
    Ok(Vnd::from(total))
}
