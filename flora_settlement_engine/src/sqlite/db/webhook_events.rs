use log::debug;
use sqlx::SqliteConnection;

use crate::{db_types::PaymentMethod, traits::SettlementError};

/// Atomically claims a webhook event id. Returns `true` if this caller won the claim, `false` if
/// the event was already processed. The claim IS the insert: the unique constraint on `event_id`
/// means there is no check-then-insert window for a concurrent redelivery to slip through.
///
/// Callers issue the claim on their settlement transaction, so a failed settlement rolls the claim
/// back and the provider's retry gets a clean slate.
pub(crate) async fn claim(
    event_id: &str,
    provider: PaymentMethod,
    conn: &mut SqliteConnection,
) -> Result<bool, SettlementError> {
    let result = sqlx::query("INSERT INTO webhook_events (event_id, provider) VALUES ($1, $2);")
        .bind(event_id)
        .bind(provider)
        .execute(conn)
        .await;
    match result {
        Ok(_) => Ok(true),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            debug!("🗃️ Event [{event_id}] has already been processed");
            Ok(false)
        },
        Err(e) => Err(e.into()),
    }
}
