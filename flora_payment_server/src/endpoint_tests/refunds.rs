//! Tests for the refund worker pass, driven directly with a scripted provider.

use async_trait::async_trait;
use chrono::Duration;
use flora_settlement_engine::{
    db_types::{Actor, ActorRole, OrderStatus, RefundJob},
    gateway::{PaymentEvent, PaymentOutcome},
    traits::OrderManagement,
    SettlementApi,
    SettlementConfig,
    SqliteDatabase,
};

use super::helpers::{order_request, setup};
use crate::{
    config::RefundConfig,
    integrations::refunds::{RefundError, RefundProvider},
    refund_worker::run_refund_pass,
};

enum Mode {
    Succeed,
    Transient,
    Reject,
}

struct ScriptedProvider(Mode);

#[async_trait]
impl RefundProvider for ScriptedProvider {
    async fn issue_refund(&self, _job: &RefundJob) -> Result<(), RefundError> {
        match self.0 {
            Mode::Succeed => Ok(()),
            Mode::Transient => Err(RefundError::Transient("HTTP 503".to_string())),
            Mode::Reject => Err(RefundError::Rejected("HTTP 422: already refunded".to_string())),
        }
    }
}

fn refund_config(max_attempts: u32) -> RefundConfig {
    RefundConfig { endpoint: "http://localhost:9/refunds".to_string(), max_attempts, base_delay: Duration::seconds(60) }
}

/// Creates a paid order and cancels it, leaving one due refund job in the queue.
async fn cancelled_paid_order(db: &SqliteDatabase, order_id: &str) -> SettlementApi<SqliteDatabase> {
    let api = SettlementApi::new(db.clone(), SettlementConfig::default());
    let request = order_request(order_id);
    let order = request.into_new_order();
    api.create_order(order.clone()).await.expect("create");
    let event = PaymentEvent {
        event_id: format!("vnpay:{order_id}:refund-test"),
        order_id: order.order_id.clone(),
        amount: order.total(),
        provider_txn_id: "refund-test".to_string(),
        method: order.method,
        outcome: PaymentOutcome::Success,
        provider_code: "00".to_string(),
    };
    api.process_event(&event).await.expect("pay");
    let admin = Actor { id: "admin-1".to_string(), role: ActorRole::Admin };
    api.update_order_status(&order.order_id, OrderStatus::Cancelled, None, &admin).await.expect("cancel");
    api
}

#[actix_web::test]
async fn successful_refunds_complete_the_job() {
    let (db, _config) = setup().await;
    let api = cancelled_paid_order(&db, "FM-RF-01").await;

    let summary = run_refund_pass(&api, &ScriptedProvider(Mode::Succeed), &refund_config(8)).await.expect("pass");
    assert_eq!(summary.completed, 1);
    assert!(api.due_refund_jobs().await.expect("jobs").is_empty());
}

#[actix_web::test]
async fn transient_failures_back_off() {
    let (db, _config) = setup().await;
    let api = cancelled_paid_order(&db, "FM-RF-02").await;

    let summary = run_refund_pass(&api, &ScriptedProvider(Mode::Transient), &refund_config(8)).await.expect("pass");
    assert_eq!(summary.rescheduled, 1);
    // The job is now scheduled in the future, so an immediate second pass finds nothing.
    let summary = run_refund_pass(&api, &ScriptedProvider(Mode::Transient), &refund_config(8)).await.expect("pass");
    assert_eq!(summary.rescheduled, 0);
}

#[actix_web::test]
async fn exhausted_refunds_mark_the_order_disputed() {
    let (db, _config) = setup().await;
    let api = cancelled_paid_order(&db, "FM-RF-03").await;

    // With a budget of one attempt, the first transient failure is also the last.
    let summary = run_refund_pass(&api, &ScriptedProvider(Mode::Transient), &refund_config(1)).await.expect("pass");
    assert_eq!(summary.abandoned, 1);

    let order = db.fetch_order_by_order_id(&"FM-RF-03".into()).await.expect("fetch").expect("order");
    assert_eq!(order.status, OrderStatus::Disputed);
}

#[actix_web::test]
async fn rejected_refunds_are_abandoned_immediately() {
    let (db, _config) = setup().await;
    let api = cancelled_paid_order(&db, "FM-RF-04").await;

    let summary = run_refund_pass(&api, &ScriptedProvider(Mode::Reject), &refund_config(8)).await.expect("pass");
    assert_eq!(summary.abandoned, 1);

    // The job left the queue for good, even though the attempt budget was not exhausted.
    assert!(api.due_refund_jobs().await.expect("jobs").is_empty());
    let order = db.fetch_order_by_order_id(&"FM-RF-04".into()).await.expect("fetch").expect("order");
    assert_eq!(order.status, OrderStatus::Disputed);
}
