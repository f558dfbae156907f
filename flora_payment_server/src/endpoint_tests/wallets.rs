//! Endpoint tests for the wallet query routes.

use actix_web::{test, App};
use flora_settlement_engine::db_types::{Order, WalletEntry};
use fpg_common::Vnd;
use serde_json::json;

use super::helpers::{order_request, setup, signed_vnpay_query};
use crate::{data_objects::WalletResponse, server::configure_app};

#[actix_web::test]
async fn delivered_orders_show_up_in_the_farmer_wallet() {
    let (db, config) = setup().await;
    let app = test::init_service(App::new().configure(|cfg| configure_app(cfg, &db, &config))).await;

    let req = test::TestRequest::post().uri("/orders").set_json(order_request("FM-EP-20")).to_request();
    let _: Order = test::call_and_read_body_json(&app, req).await;
    let query = signed_vnpay_query("FM-EP-20", Vnd::from(300_000), "00", "14226130");
    let req = test::TestRequest::get().uri(&format!("/callback/vnpay?{query}")).to_request();
    test::call_service(&app, req).await;

    for status in ["confirmed", "preparing", "shipped", "delivered"] {
        let body = json!({ "status": status, "note": null, "actor_id": "rose-farm", "actor_role": "farmer" });
        let req = test::TestRequest::post().uri("/orders/FM-EP-20/status").set_json(body).to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success(), "transition to {status} failed");
    }

    // 300,000₫ at 3% commission nets the farmer 291,000₫.
    let req = test::TestRequest::get().uri("/wallets/rose-farm").to_request();
    let wallet: WalletResponse = test::call_and_read_body_json(&app, req).await;
    assert_eq!(wallet.wallet.balance, Vnd::from(291_000));
    assert!(wallet.consistent);

    let req = test::TestRequest::get().uri("/wallets/rose-farm/entries").to_request();
    let entries: Vec<WalletEntry> = test::call_and_read_body_json(&app, req).await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].amount, Vnd::from(291_000));
    assert_eq!(entries[0].order_id.as_ref().map(|o| o.as_str().to_string()), Some("FM-EP-20".to_string()));
}

#[actix_web::test]
async fn missing_wallets_return_404() {
    let (db, config) = setup().await;
    let app = test::init_service(App::new().configure(|cfg| configure_app(cfg, &db, &config))).await;
    let req = test::TestRequest::get().uri("/wallets/nobody").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 404);
}
