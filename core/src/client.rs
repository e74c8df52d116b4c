//! Request builder and caller for the CRDP protect/reveal API.
//!
//! # Design
//! `CrdpClient` holds only its resolved `ClientConfig` and a `Transport`;
//! it carries no state between calls and is meant to be built fresh for
//! every inbound request. Each operation is split into a pure `build_*`
//! method producing an `HttpRequest` and a call that executes it.
//!
//! Calls come in two shapes. The operations themselves (`protect`,
//! `reveal`, ...) are strict: a transport failure or a non-success status
//! is an `Err(ApiError)`. Workflows that must keep going across failures
//! pass the result through [`settle`], which always yields an `Envelope`
//! whose `is_success()` flags the outcome.

use std::time::Instant;

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::envelope::{Envelope, RequestEcho};
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, Transport, UreqTransport};
use crate::types::{ProtectBulkPayload, ProtectPayload, ProtectedItem, RevealBulkPayload, RevealPayload};

/// Client for one upstream CRDP endpoint set.
#[derive(Debug, Clone)]
pub struct CrdpClient<T = UreqTransport> {
    config: ClientConfig,
    transport: T,
}

impl CrdpClient<UreqTransport> {
    pub fn new(config: ClientConfig) -> Self {
        let transport = UreqTransport::new(config.timeout);
        Self { config, transport }
    }
}

impl<T: Transport> CrdpClient<T> {
    pub fn with_transport(config: ClientConfig, transport: T) -> Self {
        Self { config, transport }
    }

    pub fn policy(&self) -> &str {
        &self.config.policy
    }

    pub fn protect_url(&self) -> String {
        format!("{}/v1/protect", self.config.base_url())
    }

    pub fn reveal_url(&self) -> String {
        format!("{}/v1/reveal", self.config.base_url())
    }

    pub fn protect_bulk_url(&self) -> String {
        format!("{}/v1/protectbulk", self.config.base_url())
    }

    pub fn reveal_bulk_url(&self) -> String {
        format!("{}/v1/revealbulk", self.config.base_url())
    }

    pub fn healthz_url(&self) -> String {
        format!("{}/healthz", self.config.healthz_base_url())
    }

    pub fn build_protect(&self, data: &str) -> Result<HttpRequest, ApiError> {
        let payload = ProtectPayload {
            protection_policy_name: self.policy(),
            data,
        };
        json_post(self.protect_url(), &payload)
    }

    pub fn build_reveal(&self, protected_data: &str, username: Option<&str>) -> Result<HttpRequest, ApiError> {
        let payload = RevealPayload {
            protection_policy_name: self.policy(),
            protected_data,
            username: present(username),
        };
        json_post(self.reveal_url(), &payload)
    }

    pub fn build_protect_bulk(&self, data_array: &[String]) -> Result<HttpRequest, ApiError> {
        let payload = ProtectBulkPayload {
            protection_policy_name: self.policy(),
            data_array,
        };
        json_post(self.protect_bulk_url(), &payload)
    }

    pub fn build_reveal_bulk(
        &self,
        protected_data_array: &[String],
        username: Option<&str>,
    ) -> Result<HttpRequest, ApiError> {
        let payload = RevealBulkPayload {
            protection_policy_name: self.policy(),
            protected_data_array: protected_data_array
                .iter()
                .map(|p| ProtectedItem { protected_data: p })
                .collect(),
            username: present(username),
        };
        json_post(self.reveal_bulk_url(), &payload)
    }

    pub fn build_healthz(&self) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Get,
            url: self.healthz_url(),
            headers: vec![("accept".to_string(), "application/json".to_string())],
            body: None,
        }
    }

    pub fn protect(&self, data: &str) -> Result<Envelope, ApiError> {
        self.send(self.build_protect(data)?)
    }

    pub fn reveal(&self, protected_data: &str, username: Option<&str>) -> Result<Envelope, ApiError> {
        self.send(self.build_reveal(protected_data, username)?)
    }

    pub fn protect_bulk(&self, data_array: &[String]) -> Result<Envelope, ApiError> {
        self.send(self.build_protect_bulk(data_array)?)
    }

    pub fn reveal_bulk(&self, protected_data_array: &[String], username: Option<&str>) -> Result<Envelope, ApiError> {
        self.send(self.build_reveal_bulk(protected_data_array, username)?)
    }

    pub fn healthz(&self) -> Result<Envelope, ApiError> {
        self.send(self.build_healthz())
    }

    /// Execute a built request. Non-success statuses become `ApiError::Http`.
    pub fn send(&self, request: HttpRequest) -> Result<Envelope, ApiError> {
        let echo = RequestEcho::from_request(&request);
        let started = Instant::now();
        let response = match self.transport.execute(&request) {
            Ok(response) => response,
            Err(err) => {
                warn!(
                    method = request.method.as_str(),
                    url = %request.url,
                    error = %err,
                    "upstream call failed"
                );
                return Err(ApiError::from_transport(err, echo));
            }
        };
        debug!(
            method = request.method.as_str(),
            url = %request.url,
            status = response.status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "upstream call completed"
        );

        let envelope = Envelope::from_response(&response, echo);
        if envelope.is_success() {
            Ok(envelope)
        } else {
            Err(ApiError::Http(envelope))
        }
    }
}

/// Collapse a strict call result into an envelope, flagging failures
/// through `is_success()` instead of an error.
pub fn settle(result: Result<Envelope, ApiError>) -> Envelope {
    result.unwrap_or_else(Envelope::from)
}

fn present(username: Option<&str>) -> Option<&str> {
    username.filter(|u| !u.is_empty())
}

fn json_post<P: Serialize>(url: String, payload: &P) -> Result<HttpRequest, ApiError> {
    let body = serde_json::to_string(payload).map_err(|e| ApiError::Serialization(e.to_string()))?;
    Ok(HttpRequest {
        method: HttpMethod::Post,
        url,
        headers: vec![
            ("content-type".to_string(), "application/json".to_string()),
            ("accept".to_string(), "application/json".to_string()),
        ],
        body: Some(body),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::Body;
    use crate::http::{HttpResponse, TransportError};
    use serde_json::{json, Value};

    type Canned = fn(&HttpRequest) -> Result<HttpResponse, TransportError>;

    fn config() -> ClientConfig {
        ClientConfig {
            host: "crdp.local".to_string(),
            port: 32082,
            policy: "P03".to_string(),
            healthz_port: Some(8080),
            ..ClientConfig::default()
        }
    }

    fn client(transport: Canned) -> CrdpClient<Canned> {
        CrdpClient::with_transport(config(), transport)
    }

    fn unused(_: &HttpRequest) -> Result<HttpResponse, TransportError> {
        panic!("transport should not be called");
    }

    fn body_of(req: &HttpRequest) -> Value {
        serde_json::from_str(req.body.as_deref().unwrap()).unwrap()
    }

    #[test]
    fn urls_follow_config() {
        let c = client(unused);
        assert_eq!(c.protect_url(), "http://crdp.local:32082/v1/protect");
        assert_eq!(c.reveal_url(), "http://crdp.local:32082/v1/reveal");
        assert_eq!(c.protect_bulk_url(), "http://crdp.local:32082/v1/protectbulk");
        assert_eq!(c.reveal_bulk_url(), "http://crdp.local:32082/v1/revealbulk");
        assert_eq!(c.healthz_url(), "http://crdp.local:8080/healthz");
    }

    #[test]
    fn build_protect_produces_policy_and_data() {
        let req = client(unused).build_protect("1234567890123").unwrap();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(body_of(&req), json!({"protection_policy_name": "P03", "data": "1234567890123"}));
        assert!(req
            .headers
            .contains(&("content-type".to_string(), "application/json".to_string())));
    }

    #[test]
    fn build_reveal_omits_missing_username() {
        let req = client(unused).build_reveal("TOKEN", None).unwrap();
        let body = body_of(&req);
        assert!(body.get("username").is_none());
        assert_eq!(body["protected_data"], "TOKEN");

        let req = client(unused).build_reveal("TOKEN", Some("")).unwrap();
        assert!(body_of(&req).get("username").is_none());
    }

    #[test]
    fn build_reveal_includes_given_username() {
        let req = client(unused).build_reveal("TOKEN", Some("alice")).unwrap();
        assert_eq!(body_of(&req)["username"], "alice");
    }

    #[test]
    fn build_bulk_payloads() {
        let data = vec!["001".to_string(), "002".to_string()];
        let req = client(unused).build_protect_bulk(&data).unwrap();
        assert_eq!(
            body_of(&req),
            json!({"protection_policy_name": "P03", "data_array": ["001", "002"]})
        );

        let req = client(unused).build_reveal_bulk(&data, Some("bob")).unwrap();
        assert_eq!(
            body_of(&req),
            json!({
                "protection_policy_name": "P03",
                "protected_data_array": [{"protected_data": "001"}, {"protected_data": "002"}],
                "username": "bob"
            })
        );
        let req = client(unused).build_reveal_bulk(&data, None).unwrap();
        assert!(body_of(&req).get("username").is_none());
    }

    #[test]
    fn build_healthz_is_a_get_without_body() {
        let req = client(unused).build_healthz();
        assert_eq!(req.method, HttpMethod::Get);
        assert!(req.body.is_none());
    }

    #[test]
    fn protect_success_returns_envelope_with_echo() {
        let c = client(|_| {
            Ok(HttpResponse {
                status: 200,
                headers: Vec::new(),
                body: r#"{"protected_data":"TOKEN"}"#.to_string(),
            })
        });
        let env = c.protect("secret").unwrap();
        assert!(env.is_success());
        assert_eq!(env.body(), &Body::Json(json!({"protected_data": "TOKEN"})));
        assert_eq!(env.request_url(), "http://crdp.local:32082/v1/protect");
        assert_eq!(env.request_payload().unwrap()["data"], "secret");
    }

    #[test]
    fn non_success_status_is_an_http_error() {
        let c = client(|_| {
            Ok(HttpResponse {
                status: 400,
                headers: Vec::new(),
                body: r#"{"error":"unknown policy"}"#.to_string(),
            })
        });
        let err = c.protect("secret").unwrap_err();
        assert_eq!(err.status(), Some(400));
        assert_eq!(err.response().unwrap().body(), &Body::Json(json!({"error": "unknown policy"})));
    }

    #[test]
    fn transport_failure_is_a_connection_error() {
        let c = client(|_| Err(TransportError::Connect("connection refused".to_string())));
        let err = c.reveal("TOKEN", None).unwrap_err();
        assert!(matches!(err, ApiError::Connection { .. }));
        assert_eq!(err.status(), None);
    }

    #[test]
    fn timeout_is_distinguished() {
        let c = client(|_| Err(TransportError::Timeout("10s elapsed".to_string())));
        assert!(matches!(c.healthz().unwrap_err(), ApiError::Timeout { .. }));
    }

    #[test]
    fn settle_flags_failures_instead_of_raising() {
        let c = client(|_| Err(TransportError::Connect("refused".to_string())));
        let env = settle(c.protect_bulk(&["a".to_string()]));
        assert!(!env.is_success());
        assert_eq!(env.status(), None);
        assert_eq!(env.request_url(), "http://crdp.local:32082/v1/protectbulk");

        let c = client(|_| {
            Ok(HttpResponse {
                status: 500,
                headers: Vec::new(),
                body: "boom".to_string(),
            })
        });
        let env = settle(c.protect("x"));
        assert_eq!(env.status(), Some(500));
        assert_eq!(env.body(), &Body::Text("boom".to_string()));
    }
}
