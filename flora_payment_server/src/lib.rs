//! # Flora payment server
//!
//! The HTTP face of the Flora marketplace's payment and escrow settlement flow. It is responsible
//! for:
//! * Receiving payment provider callbacks/webhooks (VNPay, PayOS), verifying their signatures and
//!   handing the normalized events to the settlement engine.
//! * The internal marketplace API: order creation, status changes, reviews, order and wallet
//!   queries.
//! * The background workers: auto-completion/escrow reconciliation, and the refund retry queue.
//!
//! ## Configuration
//! The server is configured via environment variables with the `FPG_` prefix. See
//! [config](config/index.html) for the full list.

pub mod config;
pub mod data_objects;
pub mod errors;
pub mod helpers;
pub mod integrations;
pub mod payment_routes;
pub mod refund_worker;
pub mod routes;
pub mod server;
pub mod settlement_worker;

#[cfg(test)]
mod endpoint_tests;
