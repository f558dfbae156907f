//! Endpoint tests for the internal order API: creation, status transitions and reviews.

use actix_web::{test, App};
use flora_settlement_engine::{
    db_types::{Order, OrderStatus},
    order_objects::OrderDetails,
    ReviewOutcome,
    StatusUpdateOutcome,
};
use fpg_common::Vnd;
use serde_json::json;

use super::helpers::{order_request, setup, signed_vnpay_query};
use crate::server::configure_app;

fn status_body(status: &str) -> serde_json::Value {
    json!({ "status": status, "note": null, "actor_id": "admin-1", "actor_role": "admin" })
}

#[actix_web::test]
async fn health_check_works() {
    let (db, config) = setup().await;
    let app = test::init_service(App::new().configure(|cfg| configure_app(cfg, &db, &config))).await;
    let req = test::TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
}

#[actix_web::test]
async fn order_creation_is_idempotent_over_http() {
    let (db, config) = setup().await;
    let app = test::init_service(App::new().configure(|cfg| configure_app(cfg, &db, &config))).await;

    let req = test::TestRequest::post().uri("/orders").set_json(order_request("FM-EP-10")).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 201);

    let req = test::TestRequest::post().uri("/orders").set_json(order_request("FM-EP-10")).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 200);
}

#[actix_web::test]
async fn out_of_order_transitions_are_rejected_with_the_edge() {
    let (db, config) = setup().await;
    let app = test::init_service(App::new().configure(|cfg| configure_app(cfg, &db, &config))).await;

    let req = test::TestRequest::post().uri("/orders").set_json(order_request("FM-EP-11")).to_request();
    let _: Order = test::call_and_read_body_json(&app, req).await;

    // pending → shipped skips the whole middle of the lifecycle.
    let req =
        test::TestRequest::post().uri("/orders/FM-EP-11/status").set_json(status_body("shipped")).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 409);
    let body: serde_json::Value = test::read_body_json(resp).await;
    let message = body["error"].as_str().expect("error body");
    assert!(message.contains("pending"), "error should name the source state: {message}");
    assert!(message.contains("shipped"), "error should name the target state: {message}");
}

#[actix_web::test]
async fn unknown_status_values_are_rejected() {
    let (db, config) = setup().await;
    let app = test::init_service(App::new().configure(|cfg| configure_app(cfg, &db, &config))).await;

    let req = test::TestRequest::post().uri("/orders").set_json(order_request("FM-EP-12")).to_request();
    let _: Order = test::call_and_read_body_json(&app, req).await;

    let req =
        test::TestRequest::post().uri("/orders/FM-EP-12/status").set_json(status_body("teleported")).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 400);
}

#[actix_web::test]
async fn the_full_lifecycle_runs_over_http() {
    let (db, config) = setup().await;
    let app = test::init_service(App::new().configure(|cfg| configure_app(cfg, &db, &config))).await;

    let req = test::TestRequest::post().uri("/orders").set_json(order_request("FM-EP-13")).to_request();
    let _: Order = test::call_and_read_body_json(&app, req).await;

    let query = signed_vnpay_query("FM-EP-13", Vnd::from(300_000), "00", "14226120");
    let req = test::TestRequest::get().uri(&format!("/callback/vnpay?{query}")).to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    for status in ["confirmed", "preparing", "shipped", "delivered"] {
        let req = test::TestRequest::post()
            .uri("/orders/FM-EP-13/status")
            .set_json(status_body(status))
            .to_request();
        let outcome: StatusUpdateOutcome = test::call_and_read_body_json(&app, req).await;
        assert_eq!(outcome.order.status.to_string(), status);
    }

    // A review completes the order.
    let review = json!({ "buyer_id": "buyer-1", "rating": 5, "comment": "Tươi lắm!", "photos": [] });
    let req = test::TestRequest::post().uri("/orders/FM-EP-13/review").set_json(&review).to_request();
    let outcome: ReviewOutcome = test::call_and_read_body_json(&app, req).await;
    assert_eq!(outcome.order.status, OrderStatus::Completed);

    // A second review is a conflict.
    let req = test::TestRequest::post().uri("/orders/FM-EP-13/review").set_json(&review).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 409);

    // The detail endpoint shows the full audit trail.
    let req = test::TestRequest::get().uri("/orders/FM-EP-13").to_request();
    let details: OrderDetails = test::call_and_read_body_json(&app, req).await;
    assert_eq!(details.history.len(), 6);
    assert!(details.review.is_some());
}

#[actix_web::test]
async fn missing_orders_return_404() {
    let (db, config) = setup().await;
    let app = test::init_service(App::new().configure(|cfg| configure_app(cfg, &db, &config))).await;
    let req = test::TestRequest::get().uri("/orders/FM-EP-NONE").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 404);
}

#[actix_web::test]
async fn order_search_filters_by_buyer() {
    let (db, config) = setup().await;
    let app = test::init_service(App::new().configure(|cfg| configure_app(cfg, &db, &config))).await;

    let req = test::TestRequest::post().uri("/orders").set_json(order_request("FM-EP-14")).to_request();
    let _: Order = test::call_and_read_body_json(&app, req).await;

    let req = test::TestRequest::get().uri("/orders?buyer_id=buyer-1").to_request();
    let found: Vec<Order> = test::call_and_read_body_json(&app, req).await;
    assert_eq!(found.len(), 1);

    let req = test::TestRequest::get().uri("/orders?buyer_id=somebody-else").to_request();
    let found: Vec<Order> = test::call_and_read_body_json(&app, req).await;
    assert!(found.is_empty());
}
