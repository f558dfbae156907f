//! PayOS webhook adapter.
//!
//! PayOS posts a JSON body containing a `data` object and a `signature` field. The signature is an
//! HMAC-SHA256 over the `data` fields sorted by key and joined as `k1=v1&k2=v2`, keyed with the
//! merchant checksum key. This is the same canonical scheme the provider's SDKs implement.

use fpg_common::{Secret, Vnd};
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    db_types::PaymentMethod,
    gateway::{GatewayError, PaymentEvent, PaymentOutcome},
    helpers::{hmac_sha256_hex, secure_eq},
};

pub const SUCCESS_CODE: &str = "00";

pub fn response_message(code: &str) -> &'static str {
    match code {
        "00" => "Transaction successful",
        "01" => "Invalid request parameters",
        "02" => "Transaction not found",
        "03" => "Transaction failed at the bank",
        _ => "Unknown error",
    }
}

/// The raw webhook body as PayOS delivers it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayOsWebhook {
    pub code: String,
    pub desc: String,
    pub data: Value,
    pub signature: String,
}

fn render_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// The canonical string PayOS signs: the `data` object's fields, sorted by key.
pub fn canonical_data(data: &Value) -> Result<String, GatewayError> {
    let object = data
        .as_object()
        .ok_or_else(|| GatewayError::MalformedPayload("webhook data is not a JSON object".to_string()))?;
    let mut keys: Vec<&String> = object.keys().collect();
    keys.sort();
    Ok(keys
        .into_iter()
        .map(|k| format!("{k}={}", render_value(&object[k])))
        .collect::<Vec<_>>()
        .join("&"))
}

pub fn sign(data: &Value, checksum_key: &Secret<String>) -> Result<String, GatewayError> {
    Ok(hmac_sha256_hex(checksum_key.reveal(), canonical_data(data)?.as_bytes()))
}

/// Verifies the webhook signature. Fails closed on any shape problem in the `data` object.
pub fn verify_webhook(webhook: &PayOsWebhook, checksum_key: &Secret<String>) -> Result<(), GatewayError> {
    let expected = sign(&webhook.data, checksum_key).map_err(|e| {
        warn!("🔐️ PayOS webhook data could not be canonicalised: {e}");
        GatewayError::InvalidSignature
    })?;
    if secure_eq(expected.as_bytes(), webhook.signature.trim().to_lowercase().as_bytes()) {
        Ok(())
    } else {
        warn!("🔐️ PayOS webhook signature mismatch");
        Err(GatewayError::InvalidSignature)
    }
}

fn data_str(data: &Value, key: &str) -> Result<String, GatewayError> {
    match &data[key] {
        Value::String(s) if !s.is_empty() => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(GatewayError::MalformedPayload(format!("missing field {key}"))),
    }
}

fn data_i64(data: &Value, key: &str) -> Result<i64, GatewayError> {
    data[key]
        .as_i64()
        .ok_or_else(|| GatewayError::MalformedPayload(format!("field {key} is not an integer")))
}

/// Maps a verified webhook to a [`PaymentEvent`]. Call [`verify_webhook`] first.
pub fn normalize(webhook: &PayOsWebhook) -> Result<PaymentEvent, GatewayError> {
    let order_code = data_str(&webhook.data, "orderCode")?;
    let reference = data_str(&webhook.data, "reference")?;
    let amount = data_i64(&webhook.data, "amount")?;
    if amount < 0 {
        return Err(GatewayError::MalformedPayload(format!("amount {amount} is negative")));
    }
    let outcome = if webhook.code == SUCCESS_CODE {
        PaymentOutcome::Success
    } else {
        PaymentOutcome::Failure { message: response_message(&webhook.code).to_string() }
    };
    Ok(PaymentEvent {
        event_id: format!("payos:{order_code}:{reference}"),
        order_id: order_code.into(),
        amount: Vnd::from(amount),
        provider_txn_id: reference,
        method: PaymentMethod::Payos,
        outcome,
        provider_code: webhook.code.clone(),
    })
}
