//! Request payloads sent to the CRDP API.
//!
//! # Design
//! Field names follow the upstream schema. `username` is skipped entirely
//! when absent: the upstream treats a missing field differently from an
//! empty one.

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ProtectPayload<'a> {
    pub protection_policy_name: &'a str,
    pub data: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct RevealPayload<'a> {
    pub protection_policy_name: &'a str,
    pub protected_data: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<&'a str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProtectBulkPayload<'a> {
    pub protection_policy_name: &'a str,
    pub data_array: &'a [String],
}

/// One entry of a bulk reveal request.
#[derive(Debug, Clone, Serialize)]
pub struct ProtectedItem<'a> {
    pub protected_data: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct RevealBulkPayload<'a> {
    pub protection_policy_name: &'a str,
    pub protected_data_array: Vec<ProtectedItem<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<&'a str>,
}
