//! Error types for the CRDP client.
//!
//! # Design
//! Transport failures (`Connection`, `Timeout`) carry the echo of the
//! request that never got a response. `Http` carries the full envelope of
//! a response whose status is not a success, so nothing the upstream said
//! is lost. Any error converts into a failure-flagged `Envelope`, which is
//! how the runners keep going across partial failures.

use std::fmt;

use crate::envelope::{Body, Envelope, RequestEcho};
use crate::http::TransportError;

/// Errors returned by `CrdpClient` operations.
#[derive(Debug, Clone)]
pub enum ApiError {
    /// DNS failure, refused connection or any other failure before a
    /// response was received.
    Connection { request: RequestEcho, message: String },

    /// The per-call timeout elapsed.
    Timeout { request: RequestEcho, message: String },

    /// The upstream answered with a non-success status.
    Http(Envelope),

    /// The request payload could not be serialized to JSON.
    Serialization(String),
}

impl ApiError {
    pub(crate) fn from_transport(err: TransportError, request: RequestEcho) -> Self {
        match err {
            TransportError::Timeout(message) => ApiError::Timeout { request, message },
            TransportError::Connect(message) => ApiError::Connection { request, message },
        }
    }

    /// HTTP status, when the upstream produced a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http(envelope) => envelope.status(),
            _ => None,
        }
    }

    /// The response that came back despite the error, if any.
    pub fn response(&self) -> Option<&Envelope> {
        match self {
            ApiError::Http(envelope) => Some(envelope),
            _ => None,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Connection { request, message } => {
                write!(f, "failed to connect to {}: {message}", request.url)
            }
            ApiError::Timeout { request, message } => {
                write!(f, "request to {} timed out: {message}", request.url)
            }
            ApiError::Http(envelope) => {
                let status = envelope.status().map_or("-".to_string(), |s| s.to_string());
                write!(f, "HTTP {status}: {}", envelope.body().describe())
            }
            ApiError::Serialization(msg) => {
                write!(f, "serialization failed: {msg}")
            }
        }
    }
}

impl std::error::Error for ApiError {}

impl From<ApiError> for Envelope {
    /// Synthesize a failure envelope, preserving the upstream response when
    /// one exists and falling back to the error text otherwise.
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Http(envelope) => envelope,
            ApiError::Connection { request, message } | ApiError::Timeout { request, message } => {
                Envelope::new(None, Body::Text(message), request)
            }
            ApiError::Serialization(msg) => Envelope::new(
                None,
                Body::Text(format!("serialization failed: {msg}")),
                RequestEcho {
                    url: String::new(),
                    headers: Vec::new(),
                    payload: None,
                },
            ),
        }
    }
}
