use chrono::Duration;
use flora_settlement_engine::{db_types::Order, SettlementApi, SqliteDatabase};
use log::*;
use tokio::task::JoinHandle;

/// Starts the settlement worker. Do not await the returned JoinHandle, as it will run
/// indefinitely.
///
/// Each tick runs two passes:
/// 1. Auto-complete: orders that have sat in `delivered` for longer than `auto_complete_after`
///    with no dispute are completed and their escrow released.
/// 2. Reconciliation: any delivered/completed order whose escrow is still held gets its release
///    re-run. This is the resumption path for releases interrupted by a crash.
pub fn start_settlement_worker(
    api: SettlementApi<SqliteDatabase>,
    auto_complete_after: Duration,
    interval_secs: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
        info!("🕰️ Settlement worker started (auto-complete after {} hours)", auto_complete_after.num_hours());
        loop {
            timer.tick().await;
            match api.auto_complete_delivered(auto_complete_after).await {
                Ok(completed) if completed.is_empty() => trace!("🕰️ No orders due for auto-completion"),
                Ok(completed) => {
                    let orders = completed.iter().map(|o| &o.order).collect::<Vec<_>>();
                    info!("🕰️ {} order(s) auto-completed: {}", completed.len(), order_list(&orders));
                },
                Err(e) => error!("🕰️ Error running the auto-complete pass: {e}"),
            }
            match api.reconcile_unsettled().await {
                Ok(0) => trace!("🕰️ No unsettled escrows found"),
                Ok(n) => info!("🕰️ Reconciliation released {n} stuck escrow(s)"),
                Err(e) => error!("🕰️ Error running the escrow reconciliation pass: {e}"),
            }
        }
    })
}

fn order_list(orders: &[&Order]) -> String {
    orders
        .iter()
        .map(|o| format!("[{}] order_id: {} buyer: {}", o.id, o.order_id, o.buyer_id))
        .collect::<Vec<String>>()
        .join(", ")
}
