use chrono::Duration;
use fpg_common::Vnd;
use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{OrderId, RefundJob},
    traits::SettlementError,
};

/// Enqueues a refund instruction for an order, due immediately. At most one job per order; if a
/// job already exists (a cancelled order can only produce one), the existing job is returned.
pub(crate) async fn enqueue(
    order_id: &OrderId,
    amount: Vnd,
    conn: &mut SqliteConnection,
) -> Result<RefundJob, SettlementError> {
    let inserted: Result<RefundJob, sqlx::Error> =
        sqlx::query_as("INSERT INTO refund_jobs (order_id, amount) VALUES ($1, $2) RETURNING *;")
            .bind(order_id.as_str())
            .bind(amount)
            .fetch_one(&mut *conn)
            .await;
    match inserted {
        Ok(job) => {
            debug!("💸️ Refund of {amount} queued for order {order_id}");
            Ok(job)
        },
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            let existing = sqlx::query_as("SELECT * FROM refund_jobs WHERE order_id = $1")
                .bind(order_id.as_str())
                .fetch_one(conn)
                .await?;
            Ok(existing)
        },
        Err(e) => Err(e.into()),
    }
}

/// Pending jobs whose next attempt time has passed.
pub(crate) async fn due_jobs(conn: &mut SqliteConnection) -> Result<Vec<RefundJob>, SettlementError> {
    let jobs = sqlx::query_as(
        "SELECT * FROM refund_jobs WHERE status = 'pending' AND \
         unixepoch(next_attempt_at) <= unixepoch(CURRENT_TIMESTAMP) ORDER BY next_attempt_at ASC",
    )
    .fetch_all(conn)
    .await?;
    Ok(jobs)
}

pub(crate) async fn mark_completed(job_id: i64, conn: &mut SqliteConnection) -> Result<RefundJob, SettlementError> {
    let job: Option<RefundJob> = sqlx::query_as(
        "UPDATE refund_jobs SET status = 'completed', updated_at = CURRENT_TIMESTAMP \
         WHERE id = $1 AND status = 'pending' RETURNING *",
    )
    .bind(job_id)
    .fetch_optional(conn)
    .await?;
    job.ok_or(SettlementError::RefundJobNotFound(job_id))
}

/// Pushes the next attempt `delay` into the future and records the failure.
pub(crate) async fn reschedule(
    job_id: i64,
    error: &str,
    delay: Duration,
    conn: &mut SqliteConnection,
) -> Result<RefundJob, SettlementError> {
    let job: Option<RefundJob> = sqlx::query_as(
        r#"
            UPDATE refund_jobs
            SET attempts = attempts + 1,
                last_error = $2,
                next_attempt_at = datetime(CURRENT_TIMESTAMP, '+' || $3 || ' seconds'),
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $1 AND status = 'pending'
            RETURNING *;
        "#,
    )
    .bind(job_id)
    .bind(error)
    .bind(delay.num_seconds())
    .fetch_optional(conn)
    .await?;
    job.ok_or(SettlementError::RefundJobNotFound(job_id))
}

pub(crate) async fn abandon(job_id: i64, error: &str, conn: &mut SqliteConnection) -> Result<RefundJob, SettlementError> {
    let job: Option<RefundJob> = sqlx::query_as(
        r#"
            UPDATE refund_jobs
            SET status = 'abandoned',
                attempts = attempts + 1,
                last_error = $2,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $1 AND status = 'pending'
            RETURNING *;
        "#,
    )
    .bind(job_id)
    .bind(error)
    .fetch_optional(conn)
    .await?;
    job.ok_or(SettlementError::RefundJobNotFound(job_id))
}
