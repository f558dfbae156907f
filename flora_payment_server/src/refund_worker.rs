use std::sync::Arc;

use chrono::Duration;
use flora_settlement_engine::{traits::SettlementDatabase, SettlementApi, SqliteDatabase};
use log::*;
use tokio::task::JoinHandle;

use crate::{
    config::RefundConfig,
    integrations::refunds::{RefundError, RefundProvider},
};

// Caps the exponential backoff shift so the delay stops growing instead of overflowing.
const MAX_BACKOFF_SHIFT: i64 = 10;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RefundPassSummary {
    pub completed: usize,
    pub rescheduled: usize,
    pub abandoned: usize,
}

/// Starts the refund worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// The worker polls the refund queue and issues each due instruction to the provider. Transient
/// failures back off exponentially (`base_delay × 2^attempts`); a rejection, or running out of
/// attempts, abandons the job and marks its order disputed so a human takes over.
pub fn start_refund_worker(
    api: SettlementApi<SqliteDatabase>,
    provider: Arc<dyn RefundProvider>,
    config: RefundConfig,
    interval_secs: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
        info!("💸️ Refund worker started (max {} attempts per job)", config.max_attempts);
        loop {
            timer.tick().await;
            match run_refund_pass(&api, provider.as_ref(), &config).await {
                Ok(summary) if summary == RefundPassSummary::default() => trace!("💸️ No refunds due"),
                Ok(summary) => info!(
                    "💸️ Refund pass: {} completed, {} rescheduled, {} abandoned",
                    summary.completed, summary.rescheduled, summary.abandoned
                ),
                Err(e) => error!("💸️ Error running refund pass: {e}"),
            }
        }
    })
}

/// One poll of the refund queue. Factored out of the loop so tests can drive it directly.
pub async fn run_refund_pass<B: SettlementDatabase>(
    api: &SettlementApi<B>,
    provider: &dyn RefundProvider,
    config: &RefundConfig,
) -> Result<RefundPassSummary, flora_settlement_engine::traits::SettlementError> {
    let mut summary = RefundPassSummary::default();
    let due = api.due_refund_jobs().await?;
    for job in due {
        match provider.issue_refund(&job).await {
            Ok(()) => {
                api.complete_refund_job(job.id).await?;
                info!("💸️ Refund of {} for order {} completed", job.amount, job.order_id);
                summary.completed += 1;
            },
            Err(RefundError::Rejected(reason)) => {
                api.abandon_refund_job(job.id, &reason).await?;
                summary.abandoned += 1;
            },
            Err(RefundError::Transient(reason)) if job.attempts + 1 >= i64::from(config.max_attempts) => {
                api.abandon_refund_job(job.id, &reason).await?;
                summary.abandoned += 1;
            },
            Err(RefundError::Transient(reason)) => {
                let delay = backoff_delay(config.base_delay, job.attempts);
                debug!(
                    "💸️ Refund for order {} failed transiently (attempt {}): {reason}. Retrying in {}s.",
                    job.order_id,
                    job.attempts + 1,
                    delay.num_seconds()
                );
                api.reschedule_refund_job(job.id, &reason, delay).await?;
                summary.rescheduled += 1;
            },
        }
    }
    Ok(summary)
}

fn backoff_delay(base: Duration, attempts: i64) -> Duration {
    let shift = attempts.clamp(0, MAX_BACKOFF_SHIFT) as u32;
    Duration::seconds(base.num_seconds() << shift)
}
