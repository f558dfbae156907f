//! The payment provider refund interface.
//!
//! Cancelled paid orders produce refund jobs, and the refund worker drives each job through this
//! trait. The HTTP implementation posts the instruction to the provider's refund endpoint; the
//! error split decides the worker's reaction: `Rejected` abandons the job immediately,
//! `Transient` retries with backoff.

use std::time::Duration;

use async_trait::async_trait;
use flora_settlement_engine::db_types::RefundJob;
use log::warn;
use reqwest::Client;
use serde_json::json;
use thiserror::Error;

use crate::errors::ServerError;

#[derive(Debug, Error)]
pub enum RefundError {
    #[error("The provider rejected the refund: {0}")]
    Rejected(String),
    #[error("Transient provider failure: {0}")]
    Transient(String),
}

#[async_trait]
pub trait RefundProvider: Send + Sync {
    async fn issue_refund(&self, job: &RefundJob) -> Result<(), RefundError>;
}

/// Issues refunds against the provider's HTTP refund endpoint.
pub struct HttpRefundProvider {
    client: Client,
    endpoint: String,
}

impl HttpRefundProvider {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, ServerError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServerError::InitializeError(format!("failed to initialize refund HTTP client: {e}")))?;
        Ok(Self { client, endpoint: endpoint.to_string() })
    }
}

#[async_trait]
impl RefundProvider for HttpRefundProvider {
    async fn issue_refund(&self, job: &RefundJob) -> Result<(), RefundError> {
        if self.endpoint.is_empty() {
            return Err(RefundError::Transient("no refund endpoint configured".to_string()));
        }
        let body = json!({
            "orderId": job.order_id.as_str(),
            "amount": job.amount.value(),
            "reason": "order cancelled",
        });
        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| RefundError::Transient(format!("refund request failed: {e}")))?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let text = response.text().await.unwrap_or_default();
        warn!("💸️ Refund endpoint answered HTTP {status} for order {}: {text}", job.order_id);
        if status.is_client_error() {
            Err(RefundError::Rejected(format!("HTTP {status}: {text}")))
        } else {
            Err(RefundError::Transient(format!("HTTP {status}: {text}")))
        }
    }
}
