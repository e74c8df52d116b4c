//! Value extraction from upstream response bodies.
//!
//! The upstream schema is not ours and varies between versions: a value may
//! come back as a bare string, or inside an object under one of several key
//! names; bulk results may be a bare array or an array under one of several
//! container keys, and each item may itself be a bare string or an object.
//! Candidate keys are tried in the fixed order listed below.

use serde_json::Value;

use crate::envelope::{Body, Envelope};

pub const PROTECTED_KEYS: &[&str] = &["protected_data", "protectedData", "protected", "token", "result"];
pub const RESTORED_KEYS: &[&str] = &["data", "restored", "revealed_data", "plaintext", "result"];
pub const PROTECTED_LIST_KEYS: &[&str] = &["protected_data_array", "protected_data_list", "results", "data"];
pub const RESTORED_LIST_KEYS: &[&str] = &["data_array", "data_list", "results", "data"];

/// Resolve a single value: a bare string is the value itself, an object
/// yields the first candidate key holding a string.
pub fn value_from_json(value: &Value, keys: &[&str]) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => keys
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str))
            .map(str::to_string),
        _ => None,
    }
}

/// Resolve a list: a bare array, or the first candidate container key
/// holding an array. Items resolve with `item_keys`; unrecognized items
/// are dropped.
pub fn list_from_json(value: &Value, container_keys: &[&str], item_keys: &[&str]) -> Vec<String> {
    let items = match value {
        Value::Array(items) => Some(items),
        Value::Object(map) => container_keys
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_array)),
        _ => None,
    };
    items
        .map(|items| {
            items
                .iter()
                .filter_map(|item| value_from_json(item, item_keys))
                .collect()
        })
        .unwrap_or_default()
}

fn value_from_body(body: &Body, keys: &[&str]) -> Option<String> {
    match body {
        Body::Empty => None,
        Body::Json(value) => value_from_json(value, keys),
        Body::Text(text) => Some(text.trim().to_string()).filter(|t| !t.is_empty()),
    }
}

fn list_from_body(body: &Body, container_keys: &[&str], item_keys: &[&str]) -> Vec<String> {
    match body {
        Body::Json(value) => list_from_json(value, container_keys, item_keys),
        Body::Empty | Body::Text(_) => Vec::new(),
    }
}

pub fn extract_protected_from_protect_response(envelope: &Envelope) -> Option<String> {
    if !envelope.is_success() {
        return None;
    }
    value_from_body(envelope.body(), PROTECTED_KEYS)
}

pub fn extract_restored_from_reveal_response(envelope: &Envelope) -> Option<String> {
    if !envelope.is_success() {
        return None;
    }
    value_from_body(envelope.body(), RESTORED_KEYS)
}

pub fn extract_protected_list_from_protect_response(envelope: &Envelope) -> Vec<String> {
    if !envelope.is_success() {
        return Vec::new();
    }
    list_from_body(envelope.body(), PROTECTED_LIST_KEYS, PROTECTED_KEYS)
}

pub fn extract_restored_list_from_reveal_response(envelope: &Envelope) -> Vec<String> {
    if !envelope.is_success() {
        return Vec::new();
    }
    list_from_body(envelope.body(), RESTORED_LIST_KEYS, RESTORED_KEYS)
}
