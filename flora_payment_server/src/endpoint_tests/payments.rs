//! Endpoint tests for the provider callback/webhook routes.

use actix_web::{test, App};
use flora_settlement_engine::{
    db_types::{Order, OrderStatus},
    gateway::payos,
    traits::OrderManagement,
};
use fpg_common::{Secret, Vnd};
use serde_json::json;

use super::helpers::{order_request, setup, signed_vnpay_query, PAYOS_TEST_KEY};
use crate::{data_objects::VnPayAck, server::configure_app};

#[actix_web::test]
async fn vnpay_callback_settles_the_order() {
    let (db, config) = setup().await;
    let app = test::init_service(App::new().configure(|cfg| configure_app(cfg, &db, &config))).await;

    let req = test::TestRequest::post().uri("/orders").set_json(order_request("FM-EP-01")).to_request();
    let order: Order = test::call_and_read_body_json(&app, req).await;
    assert_eq!(order.status, OrderStatus::Pending);

    let query = signed_vnpay_query("FM-EP-01", Vnd::from(300_000), "00", "14226112");
    let req = test::TestRequest::get().uri(&format!("/callback/vnpay?{query}")).to_request();
    let ack: VnPayAck = test::call_and_read_body_json(&app, req).await;
    assert_eq!(ack.rsp_code, "00");

    let order = db.fetch_order_by_order_id(&"FM-EP-01".into()).await.expect("fetch").expect("order");
    assert_eq!(order.status, OrderStatus::Paid);
}

#[actix_web::test]
async fn redelivered_vnpay_callback_is_acknowledged_as_duplicate() {
    let (db, config) = setup().await;
    let app = test::init_service(App::new().configure(|cfg| configure_app(cfg, &db, &config))).await;

    let req = test::TestRequest::post().uri("/orders").set_json(order_request("FM-EP-02")).to_request();
    let _: Order = test::call_and_read_body_json(&app, req).await;

    let query = signed_vnpay_query("FM-EP-02", Vnd::from(300_000), "00", "14226113");
    let req = test::TestRequest::get().uri(&format!("/callback/vnpay?{query}")).to_request();
    let ack: VnPayAck = test::call_and_read_body_json(&app, req).await;
    assert_eq!(ack.rsp_code, "00");

    let req = test::TestRequest::get().uri(&format!("/callback/vnpay?{query}")).to_request();
    let ack: VnPayAck = test::call_and_read_body_json(&app, req).await;
    assert_eq!(ack.rsp_code, "02");
}

#[actix_web::test]
async fn fresh_event_for_a_paid_order_is_acknowledged_as_confirmed() {
    let (db, config) = setup().await;
    let app = test::init_service(App::new().configure(|cfg| configure_app(cfg, &db, &config))).await;

    let req = test::TestRequest::post().uri("/orders").set_json(order_request("FM-EP-05")).to_request();
    let _: Order = test::call_and_read_body_json(&app, req).await;

    let query = signed_vnpay_query("FM-EP-05", Vnd::from(300_000), "00", "14226116");
    let req = test::TestRequest::get().uri(&format!("/callback/vnpay?{query}")).to_request();
    let ack: VnPayAck = test::call_and_read_body_json(&app, req).await;
    assert_eq!(ack.rsp_code, "00");

    // Not a redelivery: the provider issued a second, distinct transaction for the same order.
    let query = signed_vnpay_query("FM-EP-05", Vnd::from(300_000), "00", "14226999");
    let req = test::TestRequest::get().uri(&format!("/callback/vnpay?{query}")).to_request();
    let ack: VnPayAck = test::call_and_read_body_json(&app, req).await;
    assert_eq!(ack.rsp_code, "02");
}

#[actix_web::test]
async fn tampered_vnpay_signature_changes_nothing() {
    let (db, config) = setup().await;
    let app = test::init_service(App::new().configure(|cfg| configure_app(cfg, &db, &config))).await;

    let req = test::TestRequest::post().uri("/orders").set_json(order_request("FM-EP-03")).to_request();
    let _: Order = test::call_and_read_body_json(&app, req).await;

    let query = signed_vnpay_query("FM-EP-03", Vnd::from(300_000), "00", "14226114");
    let tampered = query.replace("vnp_Amount=30000000", "vnp_Amount=100");
    let req = test::TestRequest::get().uri(&format!("/callback/vnpay?{tampered}")).to_request();
    let ack: VnPayAck = test::call_and_read_body_json(&app, req).await;
    assert_eq!(ack.rsp_code, "97");

    let order = db.fetch_order_by_order_id(&"FM-EP-03".into()).await.expect("fetch").expect("order");
    assert_eq!(order.status, OrderStatus::Pending);
}

#[actix_web::test]
async fn vnpay_callback_for_unknown_order_reports_01() {
    let (db, config) = setup().await;
    let app = test::init_service(App::new().configure(|cfg| configure_app(cfg, &db, &config))).await;

    let query = signed_vnpay_query("FM-EP-NONE", Vnd::from(300_000), "00", "14226115");
    let req = test::TestRequest::get().uri(&format!("/callback/vnpay?{query}")).to_request();
    let ack: VnPayAck = test::call_and_read_body_json(&app, req).await;
    assert_eq!(ack.rsp_code, "01");
}

#[actix_web::test]
async fn payos_webhook_settles_the_order() {
    let (db, config) = setup().await;
    let app = test::init_service(App::new().configure(|cfg| configure_app(cfg, &db, &config))).await;

    let mut request = order_request("20240042");
    request.method = flora_settlement_engine::db_types::PaymentMethod::Payos;
    let req = test::TestRequest::post().uri("/orders").set_json(request).to_request();
    let _: Order = test::call_and_read_body_json(&app, req).await;

    let data = json!({
        "orderCode": 20240042,
        "amount": 300000,
        "reference": "FT24180938291",
        "description": "thanh toan don hoa",
    });
    let signature = payos::sign(&data, &Secret::new(PAYOS_TEST_KEY.to_string())).expect("sign");
    let body = json!({ "code": "00", "desc": "success", "data": data, "signature": signature });
    let req = test::TestRequest::post().uri("/webhook/payos").set_json(body).to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let order = db.fetch_order_by_order_id(&"20240042".into()).await.expect("fetch").expect("order");
    assert_eq!(order.status, OrderStatus::Paid);
}

#[actix_web::test]
async fn payos_webhook_with_bad_signature_is_forbidden() {
    let (db, config) = setup().await;
    let app = test::init_service(App::new().configure(|cfg| configure_app(cfg, &db, &config))).await;

    let data = json!({ "orderCode": 20240043, "amount": 300000, "reference": "FT0001" });
    let body = json!({ "code": "00", "desc": "success", "data": data, "signature": "00".repeat(32) });
    let req = test::TestRequest::post().uri("/webhook/payos").set_json(body).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 403);
}
