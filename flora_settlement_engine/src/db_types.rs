use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use fpg_common::Vnd;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct ConversionError(pub String);

//--------------------------------------        OrderId        -------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct OrderId(pub String);

impl FromStr for OrderId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl OrderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------     OrderStatus       -------------------------------------------------------
/// The order lifecycle. The happy path runs left to right; `Cancelled` and `Disputed` are side
/// exits. `Completed` and `Cancelled` are terminal. The transition rules live in
/// [`crate::lifecycle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// The order has been created and no payment has been confirmed.
    Pending,
    /// A successful payment event has been applied and funds are held in escrow.
    Paid,
    /// The farmer has confirmed the order.
    Confirmed,
    /// The farmer is preparing the order.
    Preparing,
    /// The order has been handed to the courier.
    Shipped,
    /// The buyer has received the order. Escrow is released on this transition.
    Delivered,
    /// The order is closed. Terminal.
    Completed,
    /// The order was cancelled and the buyer refunded. Terminal.
    Cancelled,
    /// Something went wrong and a human must intervene.
    Disputed,
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Preparing => "preparing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Disputed => "disputed",
        };
        write!(f, "{s}")
    }
}

impl FromStr for OrderStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "confirmed" => Ok(Self::Confirmed),
            "preparing" => Ok(Self::Preparing),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            "disputed" => Ok(Self::Disputed),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

//--------------------------------------      ActorRole        -------------------------------------------------------
/// Who performed a status transition. Recorded verbatim in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Buyer,
    Farmer,
    Admin,
    System,
}

impl Display for ActorRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ActorRole::Buyer => "buyer",
            ActorRole::Farmer => "farmer",
            ActorRole::Admin => "admin",
            ActorRole::System => "system",
        };
        write!(f, "{s}")
    }
}

/// The identity attached to a manual status change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub role: ActorRole,
}

impl Actor {
    pub fn system() -> Self {
        Self { id: "system".to_string(), role: ActorRole::System }
    }
}

//--------------------------------------        Order        ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_id: OrderId,
    pub buyer_id: String,
    pub total: Vnd,
    pub status: OrderStatus,
    pub shipping_address: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------       NewOrder        -------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub order_id: OrderId,
    pub buyer_id: String,
    pub shipping_address: String,
    pub method: PaymentMethod,
    pub items: Vec<NewOrderItem>,
}

impl NewOrder {
    pub fn total(&self) -> Vnd {
        self.items.iter().map(NewOrderItem::subtotal).sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderItem {
    pub product_id: String,
    pub farmer_id: String,
    pub quantity: i64,
    pub unit_price: Vnd,
}

impl NewOrderItem {
    pub fn subtotal(&self) -> Vnd {
        self.unit_price * self.quantity
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: OrderId,
    pub product_id: String,
    pub farmer_id: String,
    pub quantity: i64,
    pub unit_price: Vnd,
    pub subtotal: Vnd,
}

//--------------------------------------   StatusHistoryEntry  -------------------------------------------------------
/// One row per order status transition. Append-only; rows are never updated or deleted.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub id: i64,
    pub order_id: OrderId,
    pub previous_status: OrderStatus,
    pub new_status: OrderStatus,
    pub note: Option<String>,
    pub actor_id: String,
    pub actor_role: ActorRole,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------     PaymentMethod     -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Vnpay,
    Payos,
}

impl Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::Vnpay => write!(f, "vnpay"),
            PaymentMethod::Payos => write!(f, "payos"),
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vnpay" => Ok(Self::Vnpay),
            "payos" => Ok(Self::Payos),
            s => Err(ConversionError(format!("Invalid payment method: {s}"))),
        }
    }
}

//--------------------------------------   TransactionStatus   -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionStatus::Pending => write!(f, "pending"),
            TransactionStatus::Completed => write!(f, "completed"),
            TransactionStatus::Failed => write!(f, "failed"),
        }
    }
}

//--------------------------------------     EscrowStatus      -------------------------------------------------------
/// The single-writer commit marker for settlement. Funds leave `Held` exactly once, to exactly one
/// side, and the change is never reversed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EscrowStatus {
    Held,
    ReleasedToFarmer,
    RefundedToBuyer,
}

impl Display for EscrowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EscrowStatus::Held => write!(f, "held"),
            EscrowStatus::ReleasedToFarmer => write!(f, "released_to_farmer"),
            EscrowStatus::RefundedToBuyer => write!(f, "refunded_to_buyer"),
        }
    }
}

//--------------------------------------  PaymentTransaction   -------------------------------------------------------
/// The payment record for an order. Exactly one per order.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PaymentTransaction {
    pub id: i64,
    pub order_id: OrderId,
    pub buyer_id: String,
    pub amount: Vnd,
    pub method: PaymentMethod,
    pub provider_txn_id: Option<String>,
    pub status: TransactionStatus,
    pub escrow_status: EscrowStatus,
    pub release_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------     FarmerWallet      -------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct FarmerWallet {
    pub id: i64,
    pub farmer_id: String,
    pub balance: Vnd,
    pub total_earned: Vnd,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------     WalletEntry       -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum WalletEntryType {
    Credit,
    Debit,
}

impl Display for WalletEntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WalletEntryType::Credit => write!(f, "credit"),
            WalletEntryType::Debit => write!(f, "debit"),
        }
    }
}

/// One row in the append-only wallet ledger. The cached wallet balance must always equal the replay
/// of these rows.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WalletEntry {
    pub id: i64,
    pub farmer_id: String,
    pub entry_type: WalletEntryType,
    pub amount: Vnd,
    pub description: String,
    pub order_id: Option<OrderId>,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------       Review          -------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Review {
    pub id: i64,
    pub order_id: OrderId,
    pub buyer_id: String,
    pub rating: i64,
    pub comment: Option<String>,
    /// JSON array of photo URLs, stored verbatim.
    pub photos: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewReview {
    pub order_id: OrderId,
    pub buyer_id: String,
    pub rating: i64,
    pub comment: Option<String>,
    #[serde(default)]
    pub photos: Vec<String>,
}

impl NewReview {
    pub fn rating_is_valid(&self) -> bool {
        (1..=5).contains(&self.rating)
    }
}

//--------------------------------------      RefundJob        -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RefundJobStatus {
    Pending,
    Completed,
    Abandoned,
}

impl Display for RefundJobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefundJobStatus::Pending => write!(f, "pending"),
            RefundJobStatus::Completed => write!(f, "completed"),
            RefundJobStatus::Abandoned => write!(f, "abandoned"),
        }
    }
}

/// A queued refund instruction for a cancelled order. Driven by the refund worker; retried with
/// backoff until it succeeds or the attempt budget runs out.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct RefundJob {
    pub id: i64,
    pub order_id: OrderId,
    pub amount: Vnd,
    pub status: RefundJobStatus,
    pub attempts: i64,
    pub last_error: Option<String>,
    pub next_attempt_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------     WebhookEvent      -------------------------------------------------------
/// The idempotency ledger. A row means the event was fully processed and a redelivery must be
/// acknowledged without reapplying side effects.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub id: i64,
    pub event_id: String,
    pub provider: PaymentMethod,
    pub received_at: DateTime<Utc>,
}
