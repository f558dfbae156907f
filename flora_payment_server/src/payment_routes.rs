//! Provider callback and webhook handlers.
//!
//! These are the entry points for the settlement flow. Each handler verifies the provider
//! signature first (a bad signature stops everything before any state is touched), then
//! normalizes the payload into a [`PaymentEvent`] and hands it to the settlement API, which
//! applies it exactly once.
//!
//! Providers redeliver webhooks they consider unacknowledged, so both handlers answer quickly and
//! treat "already processed" as success.

use std::collections::HashMap;

use actix_web::{web, HttpRequest, HttpResponse};
use flora_settlement_engine::{
    db_types::OrderStatus,
    gateway::{payos, payos::PayOsWebhook, vnpay, PaymentEvent},
    traits::{SettlementDatabase, SettlementError, SettlementOutcome},
    SettlementApi,
};
use log::*;

use crate::{
    config::{ProviderCredentials, ServerOptions},
    data_objects::{JsonResponse, VnPayAck},
    helpers::get_remote_ip,
};

/// VNPay delivers results by GET with signed query parameters. The IPN contract wants HTTP 200
/// always, with the outcome in the `RspCode` field.
pub async fn vnpay_callback<B: SettlementDatabase>(
    req: HttpRequest,
    query: web::Query<HashMap<String, String>>,
    api: web::Data<SettlementApi<B>>,
    credentials: web::Data<ProviderCredentials>,
    options: web::Data<ServerOptions>,
) -> HttpResponse {
    let peer = get_remote_ip(&req, options.use_x_forwarded_for, options.use_forwarded);
    trace!("💻️ Received VNPay callback from {peer:?}");
    let params = query.into_inner();
    if vnpay::verify_callback(&params, &credentials.vnpay_hash_secret).is_err() {
        return HttpResponse::Ok().json(VnPayAck::new("97", "Invalid signature"));
    }
    let event = match vnpay::normalize(&params) {
        Ok(event) => event,
        Err(e) => {
            warn!("💻️ VNPay callback with a valid signature could not be normalized: {e}");
            return HttpResponse::Ok().json(VnPayAck::new("99", "Malformed payload"));
        },
    };
    let ack = match apply_event(api.as_ref(), &event).await {
        Applied::Settled => VnPayAck::new("00", "Confirm success"),
        Applied::Duplicate => VnPayAck::new("02", "Order already confirmed"),
        Applied::UnknownOrder => VnPayAck::new("01", "Order not found"),
        Applied::WrongAmount => VnPayAck::new("04", "Invalid amount"),
        Applied::Failed => VnPayAck::new("99", "Unknown error"),
    };
    HttpResponse::Ok().json(ack)
}

/// PayOS posts a JSON webhook with an embedded signature over the `data` object.
pub async fn payos_webhook<B: SettlementDatabase>(
    req: HttpRequest,
    body: web::Json<PayOsWebhook>,
    api: web::Data<SettlementApi<B>>,
    credentials: web::Data<ProviderCredentials>,
    options: web::Data<ServerOptions>,
) -> HttpResponse {
    let peer = get_remote_ip(&req, options.use_x_forwarded_for, options.use_forwarded);
    trace!("💻️ Received PayOS webhook from {peer:?}");
    let webhook = body.into_inner();
    if payos::verify_webhook(&webhook, &credentials.payos_checksum_key).is_err() {
        return HttpResponse::Forbidden().json(JsonResponse::failure("Invalid signature"));
    }
    let event = match payos::normalize(&webhook) {
        Ok(event) => event,
        Err(e) => {
            warn!("💻️ PayOS webhook with a valid signature could not be normalized: {e}");
            return HttpResponse::BadRequest().json(JsonResponse::failure("Malformed payload"));
        },
    };
    match apply_event(api.as_ref(), &event).await {
        Applied::Settled | Applied::Duplicate => HttpResponse::Ok().json(JsonResponse::success("ok")),
        Applied::UnknownOrder => HttpResponse::Ok().json(JsonResponse::failure("Order not found")),
        Applied::WrongAmount => HttpResponse::Ok().json(JsonResponse::failure("Invalid amount")),
        Applied::Failed => HttpResponse::Ok().json(JsonResponse::failure("Processing error")),
    }
}

enum Applied {
    Settled,
    Duplicate,
    UnknownOrder,
    WrongAmount,
    Failed,
}

async fn apply_event<B: SettlementDatabase>(api: &SettlementApi<B>, event: &PaymentEvent) -> Applied {
    match api.process_event(event).await {
        Ok(SettlementOutcome::Paid(_) | SettlementOutcome::FailureRecorded(_)) => Applied::Settled,
        Ok(SettlementOutcome::AlreadyProcessed) => Applied::Duplicate,
        // A fresh event id for an order that has already left `pending` means the payment was
        // confirmed through another channel. Providers expect the already-confirmed ack here.
        Err(SettlementError::InvalidTransition { to: OrderStatus::Paid, from }) => {
            debug!("💻️ Payment event [{}] arrived for an order already {from}", event.event_id);
            Applied::Duplicate
        },
        Err(SettlementError::OrderNotFound(order_id)) => {
            warn!("💻️ Payment event [{}] references unknown order {order_id}", event.event_id);
            Applied::UnknownOrder
        },
        Err(SettlementError::AmountMismatch { expected, actual }) => {
            warn!(
                "💻️ Payment event [{}] amount mismatch: order total {expected}, event carries {actual}",
                event.event_id
            );
            Applied::WrongAmount
        },
        Err(e) => {
            error!("💻️ Could not apply payment event [{}]: {e}", event.event_id);
            Applied::Failed
        },
    }
}
