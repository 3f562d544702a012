//! # Request Signing & Webhook Verification
//!
//! Providers sign with a plain SHA-256 over a provider-defined rendering of
//! the payload plus a shared secret. Two renderings are in use:
//!
//! - **ordered fields**: fixed list of fields concatenated, secret appended
//! - **sorted fields**: every field except `signature`, sorted by key, joined
//!   as `key=value&...`, secret appended
//!
//! Both produce a 64-char lowercase hex digest compared in constant time.

use rust_decimal::Decimal;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::str::FromStr;

/// Key carrying the signature in payloads and notifications
pub const SIGNATURE_FIELD: &str = "signature";

/// Render a JSON value for signing: strings verbatim, null as empty,
/// everything else as compact JSON text.
pub fn signing_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Render a field that may be absent
pub fn field_string(payload: &Map<String, Value>, key: &str) -> String {
    payload.get(key).map(signing_value).unwrap_or_default()
}

/// Read a non-empty field as an owned string
pub fn optional_string(payload: &Map<String, Value>, key: &str) -> Option<String> {
    Some(field_string(payload, key)).filter(|s| !s.is_empty())
}

/// Read an amount written either as a number or a numeric string
pub fn field_decimal(payload: &Map<String, Value>, key: &str) -> Option<Decimal> {
    let text = field_string(payload, key);
    if text.is_empty() {
        return None;
    }
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

pub fn sha256_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

/// Concatenate `fields` in order, append `secret`, hash
pub fn ordered_fields_signature(payload: &Map<String, Value>, fields: &[&str], secret: &str) -> String {
    let mut message: String = fields.iter().map(|f| field_string(payload, f)).collect();
    message.push_str(secret);
    sha256_hex(&message)
}

/// Sort every field but `signature` by key, join as `key=value&...`, append `secret`, hash
pub fn sorted_fields_signature(payload: &Map<String, Value>, secret: &str) -> String {
    let mut keys: Vec<&String> = payload.keys().filter(|k| *k != SIGNATURE_FIELD).collect();
    keys.sort();

    let mut message = keys
        .iter()
        .map(|k| format!("{}={}", k, signing_value(&payload[k.as_str()])))
        .collect::<Vec<_>>()
        .join("&");
    message.push_str(secret);
    sha256_hex(&message)
}

/// Compare the payload's `signature` field against `expected`
pub fn signature_matches(payload: &Map<String, Value>, expected: &str) -> bool {
    let supplied = field_string(payload, SIGNATURE_FIELD);
    constant_time_compare(&supplied, expected)
}

pub fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0, |acc, (x, y)| acc | (x ^ y))
        == 0
}
