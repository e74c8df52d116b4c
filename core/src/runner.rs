//! Protect-then-reveal round trips used to verify the upstream service.
//!
//! # Design
//! Runners never return upstream failures as errors. Every leg goes
//! through [`settle`], so a single round trip always yields one
//! `IterationResult` and a bulk run of N chunks always yields N
//! `BulkIterationResult`s. Chunks run strictly one after another.

use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, warn};

use crate::client::{settle, CrdpClient};
use crate::envelope::Envelope;
use crate::extract::{
    extract_protected_from_protect_response, extract_protected_list_from_protect_response,
    extract_restored_from_reveal_response, extract_restored_list_from_reveal_response,
};
use crate::http::Transport;

pub const DEFAULT_BATCH_SIZE: usize = 25;

/// Rejected runner arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunnerError {
    InvalidBatchSize(usize),
}

impl fmt::Display for RunnerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunnerError::InvalidBatchSize(size) => {
                write!(f, "batch size must be positive, got {size}")
            }
        }
    }
}

impl std::error::Error for RunnerError {}

/// Outcome of one single-item protect/reveal round trip.
#[derive(Debug, Clone, Serialize)]
pub struct IterationResult {
    pub data: String,
    pub protect_response: Envelope,
    pub reveal_response: Envelope,
    pub protected_token: Option<String>,
    pub restored: Option<String>,
    pub elapsed: Duration,
}

impl IterationResult {
    /// The restored value equals the original input. Absent means no match.
    pub fn is_match(&self) -> bool {
        self.restored.as_deref() == Some(self.data.as_str())
    }

    pub fn success(&self) -> bool {
        self.protect_response.is_success() && self.reveal_response.is_success()
    }
}

/// Outcome of one chunk of a bulk run.
#[derive(Debug, Clone, Serialize)]
pub struct BulkIterationResult {
    pub inputs: Vec<String>,
    pub protect_response: Envelope,
    pub reveal_response: Envelope,
    pub protected_tokens: Vec<String>,
    pub restored_values: Vec<String>,
    pub elapsed: Duration,
}

impl BulkIterationResult {
    /// Upstream returned exactly one protected and one restored value per
    /// input. Position-wise comparison is only meaningful when this holds.
    pub fn length_consistent(&self) -> bool {
        self.protected_tokens.len() == self.inputs.len() && self.restored_values.len() == self.inputs.len()
    }

    /// One flag per input. All false when the lengths disagree, since the
    /// positions can no longer be attributed.
    pub fn matches(&self) -> Vec<bool> {
        if !self.length_consistent() {
            return vec![false; self.inputs.len()];
        }
        self.inputs
            .iter()
            .zip(&self.restored_values)
            .map(|(input, restored)| input == restored)
            .collect()
    }

    pub fn all_match(&self) -> bool {
        self.matches().into_iter().all(|m| m)
    }

    pub fn success(&self) -> bool {
        self.protect_response.is_success() && self.reveal_response.is_success() && self.length_consistent()
    }
}

/// Protect `data`, reveal the resulting token and compare.
///
/// An empty token is sent when the protect leg yields nothing, so the
/// reveal failure stays observable.
pub fn run_single<T: Transport>(client: &CrdpClient<T>, data: &str, username: Option<&str>) -> IterationResult {
    let started = Instant::now();

    let protect_response = settle(client.protect(data));
    let protected_token = extract_protected_from_protect_response(&protect_response);

    let reveal_response = settle(client.reveal(protected_token.as_deref().unwrap_or(""), username));
    let restored = extract_restored_from_reveal_response(&reveal_response);

    let result = IterationResult {
        data: data.to_string(),
        protect_response,
        reveal_response,
        protected_token,
        restored,
        elapsed: started.elapsed(),
    };
    debug!(
        success = result.success(),
        matched = result.is_match(),
        elapsed_ms = result.elapsed.as_millis() as u64,
        "single round trip finished"
    );
    result
}

/// Run protect-bulk then reveal-bulk over consecutive chunks of `inputs`.
pub fn run_bulk<T: Transport>(
    client: &CrdpClient<T>,
    inputs: &[String],
    batch_size: usize,
    username: Option<&str>,
) -> Result<Vec<BulkIterationResult>, RunnerError> {
    if batch_size == 0 {
        return Err(RunnerError::InvalidBatchSize(batch_size));
    }

    let mut results = Vec::with_capacity(inputs.len().div_ceil(batch_size));
    for (index, batch) in inputs.chunks(batch_size).enumerate() {
        let started = Instant::now();

        let protect_response = settle(client.protect_bulk(batch));
        let protected_tokens = extract_protected_list_from_protect_response(&protect_response);

        let reveal_response = settle(client.reveal_bulk(&protected_tokens, username));
        let restored_values = extract_restored_list_from_reveal_response(&reveal_response);

        let result = BulkIterationResult {
            inputs: batch.to_vec(),
            protect_response,
            reveal_response,
            protected_tokens,
            restored_values,
            elapsed: started.elapsed(),
        };
        if result.success() {
            debug!(
                batch = index,
                size = batch.len(),
                elapsed_ms = result.elapsed.as_millis() as u64,
                "bulk batch finished"
            );
        } else {
            warn!(
                batch = index,
                size = batch.len(),
                protect_status = ?result.protect_response.status(),
                reveal_status = ?result.reveal_response.status(),
                protected = result.protected_tokens.len(),
                restored = result.restored_values.len(),
                "bulk batch failed"
            );
        }
        results.push(result);
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::http::{HttpRequest, HttpResponse, TransportError};
    use serde_json::{json, Value};
    use std::cell::RefCell;

    /// Echo upstream: protect prefixes `T:`, reveal strips it.
    fn echo_upstream(req: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let body: Value = serde_json::from_str(req.body.as_deref().unwrap_or("{}")).unwrap();
        let reply = if req.url.ends_with("/v1/protect") {
            json!({"protected_data": format!("T:{}", body["data"].as_str().unwrap())})
        } else if req.url.ends_with("/v1/reveal") {
            match body["protected_data"].as_str().unwrap().strip_prefix("T:") {
                Some(plain) => json!({"data": plain}),
                None => return Ok(response(400, json!({"error": "bad token"}))),
            }
        } else if req.url.ends_with("/v1/protectbulk") {
            let items: Vec<Value> = body["data_array"]
                .as_array()
                .unwrap()
                .iter()
                .map(|d| json!({"protected_data": format!("T:{}", d.as_str().unwrap())}))
                .collect();
            json!({"status": "Success", "protected_data_array": items})
        } else {
            let items: Vec<Value> = body["protected_data_array"]
                .as_array()
                .unwrap()
                .iter()
                .map(|p| json!({"data": p["protected_data"].as_str().unwrap().trim_start_matches("T:")}))
                .collect();
            json!({"status": "Success", "data_array": items})
        };
        Ok(response(200, reply))
    }

    fn response(status: u16, body: Value) -> HttpResponse {
        HttpResponse {
            status,
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    fn inputs(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("{i:03}")).collect()
    }

    #[test]
    fn single_round_trip_matches() {
        let client = CrdpClient::with_transport(ClientConfig::default(), echo_upstream);
        let result = run_single(&client, "1234567890123", Some("alice"));
        assert!(result.success());
        assert!(result.is_match());
        assert_eq!(result.protected_token.as_deref(), Some("T:1234567890123"));
        assert_eq!(result.reveal_response.request_payload().unwrap()["username"], "alice");
    }

    #[test]
    fn single_round_trip_attempts_reveal_with_empty_token() {
        let client = CrdpClient::with_transport(ClientConfig::default(), |req: &HttpRequest| {
            if req.url.ends_with("/v1/protect") {
                Ok(response(200, json!({"unexpected": "shape"})))
            } else {
                echo_upstream(req)
            }
        });
        let result = run_single(&client, "abc", None);
        assert_eq!(result.protected_token, None);
        assert_eq!(result.reveal_response.request_payload().unwrap()["protected_data"], "");
        assert_eq!(result.reveal_response.status(), Some(400));
        assert!(!result.success());
        assert!(!result.is_match());
    }

    #[test]
    fn single_round_trip_survives_connection_failure() {
        let refuse = |_: &HttpRequest| -> Result<HttpResponse, TransportError> {
            Err(TransportError::Connect("refused".to_string()))
        };
        let client = CrdpClient::with_transport(ClientConfig::default(), refuse);
        let result = run_single(&client, "abc", None);
        assert!(!result.success());
        assert!(!result.is_match());
        assert_eq!(result.protect_response.status(), None);
    }

    #[test]
    fn bulk_partitions_into_ordered_chunks() {
        let client = CrdpClient::with_transport(ClientConfig::default(), echo_upstream);
        for (len, size) in [(0, 25), (1, 25), (25, 25), (26, 25), (60, 7), (10, 1)] {
            let data = inputs(len);
            let results = run_bulk(&client, &data, size, None).unwrap();
            assert_eq!(results.len(), len.div_ceil(size), "len {len} size {size}");
            let rejoined: Vec<String> = results.iter().flat_map(|r| r.inputs.clone()).collect();
            assert_eq!(rejoined, data);
            assert!(results.iter().all(|r| r.success() && r.all_match()));
        }
    }

    #[test]
    fn bulk_rejects_zero_batch_size() {
        let client = CrdpClient::with_transport(ClientConfig::default(), echo_upstream);
        let err = run_bulk(&client, &inputs(3), 0, None).unwrap_err();
        assert_eq!(err, RunnerError::InvalidBatchSize(0));
    }

    #[test]
    fn bulk_contains_failure_to_one_chunk() {
        let calls = RefCell::new(0usize);
        let transport = |req: &HttpRequest| {
            if req.url.ends_with("/v1/protectbulk") {
                let mut n = calls.borrow_mut();
                *n += 1;
                if *n == 2 {
                    return Err(TransportError::Connect("connection reset".to_string()));
                }
            }
            echo_upstream(req)
        };
        let client = CrdpClient::with_transport(ClientConfig::default(), transport);
        let results = run_bulk(&client, &inputs(7), 3, None).unwrap();

        assert_eq!(results.len(), 3);
        assert!(results[0].success());
        assert!(!results[1].success());
        assert!(!results[1].protect_response.is_success());
        assert_eq!(results[1].protect_response.status(), None);
        assert!(results[1].protected_tokens.is_empty());
        assert_eq!(results[1].matches(), vec![false; 3]);
        assert!(results[2].success());
        assert_eq!(results[2].inputs, vec!["006"]);
    }

    #[test]
    fn bulk_records_upstream_error_status() {
        let client = CrdpClient::with_transport(ClientConfig::default(), |req: &HttpRequest| {
            if req.url.ends_with("/v1/revealbulk") {
                Ok(response(422, json!({"error": "schema"})))
            } else {
                echo_upstream(req)
            }
        });
        let results = run_bulk(&client, &inputs(4), 25, Some("bob")).unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].protect_response.is_success());
        assert_eq!(results[0].reveal_response.status(), Some(422));
        assert_eq!(results[0].reveal_response.request_payload().unwrap()["username"], "bob");
        assert!(!results[0].success());
    }

    #[test]
    fn short_upstream_list_never_matches() {
        let client = CrdpClient::with_transport(ClientConfig::default(), |req: &HttpRequest| {
            if req.url.ends_with("/v1/revealbulk") {
                Ok(response(200, json!({"data_array": [{"data": "000"}]})))
            } else {
                echo_upstream(req)
            }
        });
        let results = run_bulk(&client, &inputs(2), 25, None).unwrap();
        assert!(!results[0].length_consistent());
        assert_eq!(results[0].matches(), vec![false, false]);
        assert!(!results[0].success());
    }
}
