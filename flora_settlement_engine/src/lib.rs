//! Flora Settlement Engine
//!
//! The settlement engine is the core of the Flora payment gateway: it takes the payment events
//! that providers (VNPay, PayOS) deliver to the marketplace, applies each one exactly once, moves
//! orders through their lifecycle with an append-only audit trail, holds buyer funds in escrow per
//! order, and releases or refunds them exactly once. It is provider-agnostic above the
//! [`mod@gateway`] adapters and storage-agnostic above the [`mod@traits`] definitions.
//!
//! The library is divided into three main sections:
//! 1. The gateway adapters ([`mod@gateway`]), which verify provider signatures and normalize
//!    vendor payloads into [`gateway::PaymentEvent`] values. These are pure; a bad signature stops
//!    everything before any state is touched.
//! 2. Database management and control ([`mod@sqlite`] behind the `sqlite` feature). You should
//!    never need to access the database directly; use the public API objects instead. The
//!    exception is the data types, which are defined in [`mod@db_types`] and are public.
//! 3. The engine public API ([`mod@api`]): [`SettlementApi`] for the payment/escrow flow,
//!    [`OrderApi`] for queries, and [`WalletApi`] for farmer balances.
mod api;
mod lifecycle;
#[cfg(feature = "sqlite")]
mod sqlite;

pub mod db_types;
pub mod gateway;
pub mod helpers;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use api::{
    order_objects,
    orders_api::OrderApi,
    settlement_api::{ReviewOutcome, SettlementApi, SettlementConfig, StatusUpdateOutcome, DEFAULT_COMMISSION_RATE_BPS},
    wallet_api::WalletApi,
};
#[cfg(feature = "sqlite")]
pub use sqlite::{db_url, SqliteDatabase};
