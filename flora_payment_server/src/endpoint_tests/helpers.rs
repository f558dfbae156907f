use std::collections::HashMap;

use flora_settlement_engine::{
    db_types::NewOrderItem,
    gateway::vnpay,
    test_utils::{prepare_test_env, random_db_path},
    SqliteDatabase,
};
use fpg_common::{Secret, Vnd};

use crate::{
    config::{ProviderCredentials, ServerConfig},
    data_objects::NewOrderRequest,
};

pub const VNPAY_TEST_SECRET: &str = "test-vnpay-hash-secret";
pub const PAYOS_TEST_KEY: &str = "test-payos-checksum-key";

/// Creates a fresh migrated database and the matching server configuration with known provider
/// secrets.
pub async fn setup() -> (SqliteDatabase, ServerConfig) {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
    let mut config = ServerConfig::new("127.0.0.1", 0);
    config.providers = ProviderCredentials {
        vnpay_hash_secret: Secret::new(VNPAY_TEST_SECRET.to_string()),
        payos_checksum_key: Secret::new(PAYOS_TEST_KEY.to_string()),
    };
    (db, config)
}

/// A 300,000₫ single-farmer checkout payload.
pub fn order_request(order_id: &str) -> NewOrderRequest {
    NewOrderRequest {
        order_id: Some(order_id.to_string()),
        buyer_id: "buyer-1".to_string(),
        shipping_address: "12 Hang Gai, Hoan Kiem, Ha Noi".to_string(),
        method: flora_settlement_engine::db_types::PaymentMethod::Vnpay,
        items: vec![NewOrderItem {
            product_id: "red-roses-24".to_string(),
            farmer_id: "rose-farm".to_string(),
            quantity: 3,
            unit_price: Vnd::from(100_000),
        }],
    }
}

/// A signed VNPay callback query for the given order, as a query string ready to append to the
/// callback path.
pub fn signed_vnpay_query(order_id: &str, amount: Vnd, response_code: &str, txn_no: &str) -> String {
    let mut params = HashMap::from([
        ("vnp_TxnRef".to_string(), order_id.to_string()),
        ("vnp_Amount".to_string(), (amount.value() * 100).to_string()),
        ("vnp_ResponseCode".to_string(), response_code.to_string()),
        ("vnp_TransactionNo".to_string(), txn_no.to_string()),
        ("vnp_BankCode".to_string(), "NCB".to_string()),
    ]);
    let hash = vnpay::sign(&params, &Secret::new(VNPAY_TEST_SECRET.to_string()));
    params.insert("vnp_SecureHash".to_string(), hash);
    let mut keys: Vec<&String> = params.keys().collect();
    keys.sort();
    keys.into_iter().map(|k| format!("{k}={}", params[k])).collect::<Vec<_>>().join("&")
}
