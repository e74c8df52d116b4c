//! Mapping of failures to HTTP responses.
//!
//! # Design
//! Upstream failures keep the upstream's status and answer with the same
//! `{status_code, error}` shape the protect/reveal routes use on success.
//! Everything else answers `{detail}`. Internal failures expose a message
//! string only.

use std::fmt;

use axum::{
    extract::rejection::{FormRejection, JsonRejection, QueryRejection},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use crdp_core::{ApiError, RunnerError};
use serde_json::json;
use tokio::task::JoinError;

#[derive(Debug)]
pub enum GatewayError {
    /// Missing, malformed, expired or wrongly signed credentials.
    Unauthorized(String),
    /// The request is well-formed JSON but not acceptable.
    Validation(String),
    /// The upstream failed; `status` is what the caller receives.
    Upstream { status: u16, detail: String },
    Internal(String),
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::Unauthorized(msg) => write!(f, "unauthorized: {msg}"),
            GatewayError::Validation(msg) => write!(f, "invalid request: {msg}"),
            GatewayError::Upstream { status, detail } => write!(f, "upstream {status}: {detail}"),
            GatewayError::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for GatewayError {}

impl From<ApiError> for GatewayError {
    fn from(err: ApiError) -> Self {
        match &err {
            ApiError::Http(envelope) => {
                let status = envelope.status().unwrap_or(502);
                let detail = if envelope.body().is_empty() {
                    format!("upstream returned HTTP {status}")
                } else {
                    envelope.body().describe()
                };
                GatewayError::Upstream { status, detail }
            }
            ApiError::Connection { .. } => GatewayError::Upstream {
                status: 503,
                detail: err.to_string(),
            },
            ApiError::Timeout { .. } => GatewayError::Upstream {
                status: 504,
                detail: err.to_string(),
            },
            ApiError::Serialization(_) => GatewayError::Internal(err.to_string()),
        }
    }
}

impl From<RunnerError> for GatewayError {
    fn from(err: RunnerError) -> Self {
        GatewayError::Validation(err.to_string())
    }
}

impl From<JsonRejection> for GatewayError {
    fn from(rejection: JsonRejection) -> Self {
        GatewayError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for GatewayError {
    fn from(rejection: QueryRejection) -> Self {
        GatewayError::Validation(rejection.body_text())
    }
}

impl From<FormRejection> for GatewayError {
    fn from(rejection: FormRejection) -> Self {
        GatewayError::Validation(rejection.body_text())
    }
}

impl From<JoinError> for GatewayError {
    fn from(err: JoinError) -> Self {
        GatewayError::Internal(err.to_string())
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        match self {
            GatewayError::Unauthorized(detail) => (
                StatusCode::UNAUTHORIZED,
                [(header::WWW_AUTHENTICATE, "Bearer")],
                Json(json!({ "detail": detail })),
            )
                .into_response(),
            GatewayError::Validation(detail) => {
                (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({ "detail": detail }))).into_response()
            }
            GatewayError::Upstream { status, detail } => {
                let code = StatusCode::from_u16(status)
                    .ok()
                    .filter(|s| s.is_client_error() || s.is_server_error())
                    .unwrap_or(StatusCode::BAD_GATEWAY);
                (code, Json(json!({ "status_code": status, "error": detail }))).into_response()
            }
            GatewayError::Internal(msg) => {
                tracing::error!(error = %msg, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "detail": format!("Unexpected error: {msg}") })),
                )
                    .into_response()
            }
        }
    }
}
