use std::fmt::Display;

use flora_settlement_engine::db_types::{
    ActorRole,
    FarmerWallet,
    NewOrder,
    NewOrderItem,
    OrderId,
    OrderStatus,
    PaymentMethod,
};
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

/// Checkout submission. The order id is normally assigned here; clients may supply their own for
/// idempotent retries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderRequest {
    pub order_id: Option<String>,
    pub buyer_id: String,
    pub shipping_address: String,
    pub method: PaymentMethod,
    pub items: Vec<NewOrderItem>,
}

impl NewOrderRequest {
    pub fn into_new_order(self) -> NewOrder {
        let order_id = self.order_id.map(OrderId::from).unwrap_or_else(generate_order_id);
        NewOrder {
            order_id,
            buyer_id: self.buyer_id,
            shipping_address: self.shipping_address,
            method: self.method,
            items: self.items,
        }
    }
}

fn generate_order_id() -> OrderId {
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000);
    OrderId(format!("FM-{}-{suffix:06}", chrono::Utc::now().format("%Y%m%d")))
}

/// A manual order status change from a buyer, farmer or admin. Out-of-enum statuses are rejected
/// at deserialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: OrderStatus,
    pub note: Option<String>,
    pub actor_id: String,
    pub actor_role: ActorRole,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewRequest {
    pub buyer_id: String,
    pub rating: i64,
    pub comment: Option<String>,
    #[serde(default)]
    pub photos: Vec<String>,
}

/// The acknowledgement shape VNPay's IPN endpoint expects. Always delivered with HTTP 200; the
/// `RspCode` field carries the actual outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VnPayAck {
    #[serde(rename = "RspCode")]
    pub rsp_code: String,
    #[serde(rename = "Message")]
    pub message: String,
}

impl VnPayAck {
    pub fn new(rsp_code: &str, message: &str) -> Self {
        Self { rsp_code: rsp_code.to_string(), message: message.to_string() }
    }
}

/// Wallet balance response, including the ledger-replay consistency flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletResponse {
    pub wallet: FarmerWallet,
    /// False when the cached balance has diverged from the ledger replay, which means something
    /// wrote to the wallet outside the accessor.
    pub consistent: bool,
}
