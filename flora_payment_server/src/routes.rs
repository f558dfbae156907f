//! Request handler definitions for the internal marketplace API: order creation, status changes,
//! reviews, order queries and wallet queries.
//!
//! Handlers are generic over the backend trait so tests can run them against any database
//! implementation; [`crate::server`] instantiates them with [`SqliteDatabase`].
//!
//! [`SqliteDatabase`]: flora_settlement_engine::SqliteDatabase

use actix_web::{get, http::StatusCode, web, HttpResponse, Responder};
use flora_settlement_engine::{
    db_types::{Actor, NewReview, OrderId},
    order_objects::OrderQueryFilter,
    traits::{OrderManagement, SettlementDatabase, WalletManagement},
    OrderApi,
    SettlementApi,
    WalletApi,
};
use log::*;
use serde::{Deserialize, Serialize};

use crate::{
    data_objects::{NewOrderRequest, ReviewRequest, StatusUpdateRequest, WalletResponse},
    errors::ServerError,
};

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Orders  ----------------------------------------------------

/// `POST /orders`: checkout submission. Creates the order, its line items and the pending
/// payment transaction. Idempotent on the order id.
pub async fn create_order<B: SettlementDatabase>(
    body: web::Json<NewOrderRequest>,
    api: web::Data<SettlementApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order = body.into_inner().into_new_order();
    debug!("💻️ POST order {} for buyer {}", order.order_id, order.buyer_id);
    let (order, inserted) = api.create_order(order).await?;
    let status = if inserted { StatusCode::CREATED } else { StatusCode::OK };
    Ok(HttpResponse::build(status).json(order))
}

/// `POST /orders/{order_id}/status`: manual status change by a buyer, farmer or admin. Rejected
/// transitions come back as 409 with the offending edge; they are never silent no-ops.
pub async fn update_order_status<B: SettlementDatabase>(
    path: web::Path<String>,
    body: web::Json<StatusUpdateRequest>,
    api: web::Data<SettlementApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId(path.into_inner());
    let req = body.into_inner();
    debug!("💻️ POST status {} for order {order_id} by {} ({})", req.status, req.actor_id, req.actor_role);
    let actor = Actor { id: req.actor_id, role: req.actor_role };
    let outcome = api.update_order_status(&order_id, req.status, req.note.as_deref(), &actor).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

/// `POST /orders/{order_id}/review`: buyer review. Only legal once the order is delivered or
/// completed, and at most once per order. Reviewing a delivered order confirms receipt and
/// completes it.
pub async fn submit_review<B: SettlementDatabase>(
    path: web::Path<String>,
    body: web::Json<ReviewRequest>,
    api: web::Data<SettlementApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId(path.into_inner());
    let req = body.into_inner();
    debug!("💻️ POST review for order {order_id} by buyer {}", req.buyer_id);
    let review = NewReview {
        order_id,
        buyer_id: req.buyer_id,
        rating: req.rating,
        comment: req.comment,
        photos: req.photos,
    };
    let outcome = api.submit_review(review).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

/// `GET /orders/{order_id}`: the order with its items, audit trail, transaction and review.
pub async fn order_details<B: OrderManagement>(
    path: web::Path<String>,
    api: web::Data<OrderApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId(path.into_inner());
    debug!("💻️ GET order {order_id}");
    let details = api
        .order_details(&order_id)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("Order {order_id} does not exist")))?;
    Ok(HttpResponse::Ok().json(details))
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderSearchParams {
    pub buyer_id: Option<String>,
    pub farmer_id: Option<String>,
    pub status: Option<flora_settlement_engine::db_types::OrderStatus>,
}

/// `GET /orders`: order search by buyer, farmer and/or status.
pub async fn search_orders<B: OrderManagement>(
    params: web::Query<OrderSearchParams>,
    api: web::Data<OrderApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let params = params.into_inner();
    let mut filter = OrderQueryFilter::default();
    if let Some(buyer_id) = params.buyer_id {
        filter = filter.with_buyer_id(buyer_id);
    }
    if let Some(farmer_id) = params.farmer_id {
        filter = filter.with_farmer_id(farmer_id);
    }
    if let Some(status) = params.status {
        filter = filter.with_status(status);
    }
    let orders = api.search(filter).await?;
    Ok(HttpResponse::Ok().json(orders))
}

//----------------------------------------------   Wallets  ----------------------------------------------------

/// `GET /wallets/{farmer_id}`: wallet balance with the ledger-replay consistency flag.
pub async fn wallet_balance<B: WalletManagement>(
    path: web::Path<String>,
    api: web::Data<WalletApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let farmer_id = path.into_inner();
    debug!("💻️ GET wallet for farmer {farmer_id}");
    let wallet = api
        .wallet(&farmer_id)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("No wallet exists for farmer {farmer_id}")))?;
    let audit = api.audit(&farmer_id).await?;
    Ok(HttpResponse::Ok().json(WalletResponse { wallet, consistent: audit.is_consistent() }))
}

/// `GET /wallets/{farmer_id}/entries`: the append-only wallet ledger.
pub async fn wallet_entries<B: WalletManagement>(
    path: web::Path<String>,
    api: web::Data<WalletApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let farmer_id = path.into_inner();
    let entries = api.entries(&farmer_id).await?;
    Ok(HttpResponse::Ok().json(entries))
}
