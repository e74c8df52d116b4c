//! Uniform wrapper around one outbound HTTP call's outcome.
//!
//! # Design
//! An `Envelope` is created once per call attempt and never mutated. It
//! keeps the status (absent when the call never reached the network), the
//! parsed body and an echo of what was sent, so callers can report exactly
//! what happened without holding on to transport objects.

use serde::Serialize;
use serde_json::Value;

use crate::http::{HttpRequest, HttpResponse};

/// A response body, parsed as JSON when possible.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Body {
    Empty,
    Json(Value),
    Text(String),
}

impl Body {
    /// Parse raw response text. Blank text is `Empty`; anything that is not
    /// valid JSON is kept verbatim as `Text`.
    pub fn parse(raw: &str) -> Self {
        if raw.trim().is_empty() {
            return Body::Empty;
        }
        match serde_json::from_str(raw) {
            Ok(value) => Body::Json(value),
            Err(_) => Body::Text(raw.to_string()),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Body::Empty)
    }

    /// Short human-readable rendering, used for error details.
    pub fn describe(&self) -> String {
        match self {
            Body::Empty => String::new(),
            Body::Json(Value::String(s)) => s.clone(),
            Body::Json(value) => value.to_string(),
            Body::Text(text) => text.clone(),
        }
    }
}

/// What was sent upstream, echoed back for debugging.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestEcho {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub payload: Option<Value>,
}

impl RequestEcho {
    pub fn from_request(request: &HttpRequest) -> Self {
        Self {
            url: request.url.clone(),
            headers: request.headers.clone(),
            payload: request
                .body
                .as_deref()
                .and_then(|body| serde_json::from_str(body).ok()),
        }
    }
}

/// Outcome of one call attempt against the upstream service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    status: Option<u16>,
    body: Body,
    request: RequestEcho,
}

impl Envelope {
    pub fn new(status: Option<u16>, body: Body, request: RequestEcho) -> Self {
        Self {
            status,
            body,
            request,
        }
    }

    pub fn from_response(response: &HttpResponse, request: RequestEcho) -> Self {
        Self::new(Some(response.status), Body::parse(&response.body), request)
    }

    /// Status present and below 400.
    pub fn is_success(&self) -> bool {
        matches!(self.status, Some(status) if status < 400)
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn request(&self) -> &RequestEcho {
        &self.request
    }

    pub fn request_url(&self) -> &str {
        &self.request.url
    }

    pub fn request_headers(&self) -> &[(String, String)] {
        &self.request.headers
    }

    pub fn request_payload(&self) -> Option<&Value> {
        self.request.payload.as_ref()
    }
}
