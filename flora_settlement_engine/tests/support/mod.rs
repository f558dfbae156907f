pub mod prepare_env;

use flora_settlement_engine::{
    db_types::{Actor, ActorRole, NewOrder, NewOrderItem, OrderStatus, PaymentMethod},
    gateway::{PaymentEvent, PaymentOutcome},
    SettlementApi,
    SettlementConfig,
    SqliteDatabase,
};
use fpg_common::Vnd;

pub async fn new_test_db() -> SqliteDatabase {
    let url = prepare_env::random_db_path();
    prepare_env::prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database")
}

pub async fn new_test_api() -> SettlementApi<SqliteDatabase> {
    let db = new_test_db().await;
    SettlementApi::new(db, SettlementConfig::default())
}

/// A 300,000₫ order for a single farmer ("rose-farm").
pub fn rose_order(order_id: &str) -> NewOrder {
    NewOrder {
        order_id: order_id.into(),
        buyer_id: "buyer-1".to_string(),
        shipping_address: "12 Hang Gai, Hoan Kiem, Ha Noi".to_string(),
        method: PaymentMethod::Vnpay,
        items: vec![NewOrderItem {
            product_id: "red-roses-24".to_string(),
            farmer_id: "rose-farm".to_string(),
            quantity: 3,
            unit_price: Vnd::from(100_000),
        }],
    }
}

/// A 300,000₫ order split across two farmers: 200,000₫ to "rose-farm" and 100,000₫ to
/// "lily-farm".
pub fn mixed_order(order_id: &str) -> NewOrder {
    NewOrder {
        order_id: order_id.into(),
        buyer_id: "buyer-2".to_string(),
        shipping_address: "45 Le Loi, District 1, HCMC".to_string(),
        method: PaymentMethod::Payos,
        items: vec![
            NewOrderItem {
                product_id: "red-roses-24".to_string(),
                farmer_id: "rose-farm".to_string(),
                quantity: 2,
                unit_price: Vnd::from(100_000),
            },
            NewOrderItem {
                product_id: "white-lilies-10".to_string(),
                farmer_id: "lily-farm".to_string(),
                quantity: 1,
                unit_price: Vnd::from(100_000),
            },
        ],
    }
}

/// A successful provider event matching the given order.
pub fn success_event(order: &NewOrder, txn_no: &str) -> PaymentEvent {
    PaymentEvent {
        event_id: format!("vnpay:{}:{txn_no}", order.order_id.as_str()),
        order_id: order.order_id.clone(),
        amount: order.total(),
        provider_txn_id: txn_no.to_string(),
        method: order.method,
        outcome: PaymentOutcome::Success,
        provider_code: "00".to_string(),
    }
}

pub fn failure_event(order: &NewOrder, txn_no: &str) -> PaymentEvent {
    PaymentEvent {
        event_id: format!("vnpay:{}:{txn_no}", order.order_id.as_str()),
        order_id: order.order_id.clone(),
        amount: order.total(),
        provider_txn_id: txn_no.to_string(),
        method: order.method,
        outcome: PaymentOutcome::Failure { message: "Insufficient funds".to_string() },
        provider_code: "51".to_string(),
    }
}

pub fn admin() -> Actor {
    Actor { id: "admin-1".to_string(), role: ActorRole::Admin }
}

pub fn farmer() -> Actor {
    Actor { id: "rose-farm".to_string(), role: ActorRole::Farmer }
}

/// Walks a freshly-paid order along the happy path up to (and including) `target`.
pub async fn advance_to(api: &SettlementApi<SqliteDatabase>, order: &NewOrder, target: OrderStatus) {
    use OrderStatus::*;
    for status in [Confirmed, Preparing, Shipped, Delivered, Completed] {
        api.update_order_status(&order.order_id, status, None, &farmer())
            .await
            .unwrap_or_else(|e| panic!("could not advance order to {status}: {e}"));
        if status == target {
            break;
        }
    }
}
