//! VNPay return-URL / IPN callback adapter.
//!
//! VNPay delivers payment results as a GET request with `vnp_`-prefixed query parameters. The
//! `vnp_SecureHash` parameter is an HMAC-SHA512 over the remaining parameters, sorted
//! lexicographically by key and re-encoded as a query string. `vnp_Amount` is the order total in
//! đồng multiplied by 100.

use std::collections::HashMap;

use fpg_common::{Secret, Vnd};
use log::warn;

use crate::{
    db_types::PaymentMethod,
    gateway::{GatewayError, PaymentEvent, PaymentOutcome},
    helpers::{hmac_sha512_hex, secure_eq},
};

pub const SUCCESS_CODE: &str = "00";

const HASH_PARAM: &str = "vnp_SecureHash";
const HASH_TYPE_PARAM: &str = "vnp_SecureHashType";

/// The provider's published response code table. Codes not listed here map to a generic message
/// rather than an error.
pub fn response_message(code: &str) -> &'static str {
    match code {
        "00" => "Transaction successful",
        "07" => "Amount deducted, transaction suspected of fraud",
        "09" => "Card not registered for online banking",
        "10" => "Card authentication failed more than 3 times",
        "11" => "Payment window expired",
        "12" => "Card or account is locked",
        "13" => "Incorrect OTP",
        "24" => "Transaction cancelled by the customer",
        "51" => "Insufficient funds",
        "65" => "Daily transaction limit exceeded",
        "75" => "Bank is under maintenance",
        "79" => "Incorrect payment password entered too many times",
        "99" => "Other error",
        _ => "Unknown error",
    }
}

// VNPay encodes in x-www-form-urlencoded style, with spaces as '+'.
fn encode(value: &str) -> String {
    urlencoding::encode(value).replace("%20", "+")
}

/// The canonical string that VNPay signs: every parameter except the signature itself, sorted by
/// key and re-encoded.
pub fn canonical_data(params: &HashMap<String, String>) -> String {
    let mut keys: Vec<&String> =
        params.keys().filter(|k| k.as_str() != HASH_PARAM && k.as_str() != HASH_TYPE_PARAM).collect();
    keys.sort();
    keys.into_iter()
        .map(|k| format!("{}={}", encode(k), encode(&params[k])))
        .collect::<Vec<_>>()
        .join("&")
}

/// Computes the signature for a parameter set. Used to verify inbound callbacks; exposed so that
/// outbound payment-URL construction can reuse it.
pub fn sign(params: &HashMap<String, String>, secret: &Secret<String>) -> String {
    hmac_sha512_hex(secret.reveal(), canonical_data(params).as_bytes())
}

/// Verifies the `vnp_SecureHash` of a callback. Fails closed: a missing signature is treated the
/// same as a wrong one.
pub fn verify_callback(params: &HashMap<String, String>, secret: &Secret<String>) -> Result<(), GatewayError> {
    let provided = params.get(HASH_PARAM).ok_or_else(|| {
        warn!("🔐️ VNPay callback arrived without a {HASH_PARAM} parameter");
        GatewayError::InvalidSignature
    })?;
    let expected = sign(params, secret);
    if secure_eq(expected.as_bytes(), provided.trim().to_lowercase().as_bytes()) {
        Ok(())
    } else {
        warn!("🔐️ VNPay callback signature mismatch for order {:?}", params.get("vnp_TxnRef"));
        Err(GatewayError::InvalidSignature)
    }
}

fn required<'a>(params: &'a HashMap<String, String>, key: &str) -> Result<&'a str, GatewayError> {
    params
        .get(key)
        .map(String::as_str)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| GatewayError::MalformedPayload(format!("missing parameter {key}")))
}

/// Maps a verified callback to a [`PaymentEvent`]. Call [`verify_callback`] first; this function
/// performs no signature check of its own.
pub fn normalize(params: &HashMap<String, String>) -> Result<PaymentEvent, GatewayError> {
    let txn_ref = required(params, "vnp_TxnRef")?;
    let txn_no = required(params, "vnp_TransactionNo")?;
    let response_code = required(params, "vnp_ResponseCode")?;
    let raw_amount: i64 = required(params, "vnp_Amount")?
        .parse()
        .map_err(|_| GatewayError::MalformedPayload("vnp_Amount is not an integer".to_string()))?;
    if raw_amount < 0 || raw_amount % 100 != 0 {
        return Err(GatewayError::MalformedPayload(format!("vnp_Amount {raw_amount} is not đồng x 100")));
    }
    let outcome = if response_code == SUCCESS_CODE {
        PaymentOutcome::Success
    } else {
        PaymentOutcome::Failure { message: response_message(response_code).to_string() }
    };
    Ok(PaymentEvent {
        event_id: format!("vnpay:{txn_ref}:{txn_no}"),
        order_id: txn_ref.into(),
        amount: Vnd::from(raw_amount / 100),
        provider_txn_id: txn_no.to_string(),
        method: PaymentMethod::Vnpay,
        outcome,
        provider_code: response_code.to_string(),
    })
}
