//! Client core for a CRDP data-protection service.
//!
//! # Overview
//! Builds protect/reveal requests against the upstream `/v1/*` API,
//! executes them through a pluggable `Transport`, wraps every outcome in an
//! `Envelope`, and extracts values from the upstream's loosely specified
//! response shapes. The runners drive protect-then-reveal round trips,
//! single or in fixed-size batches, to verify the service end to end.
//!
//! # Design
//! - `CrdpClient` is stateless; it holds a resolved `ClientConfig` and a
//!   transport, and is built fresh for every inbound request.
//! - Each operation is split into `build_*` (pure) and a call that executes
//!   the request, so payloads can be tested without a network.
//! - Operations are strict (`Result<Envelope, ApiError>`); `settle` turns
//!   a failure into a flagged `Envelope` for workflows that must continue.
//! - Extraction helpers are pure functions over an `Envelope`.

pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
pub mod extract;
pub mod http;
pub mod runner;
pub mod types;

pub use client::{settle, CrdpClient};
pub use config::{ClientConfig, ConfigOverride};
pub use envelope::{Body, Envelope, RequestEcho};
pub use error::ApiError;
pub use extract::{
    extract_protected_from_protect_response, extract_protected_list_from_protect_response,
    extract_restored_from_reveal_response, extract_restored_list_from_reveal_response,
};
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport, TransportError, UreqTransport};
pub use runner::{run_bulk, run_single, BulkIterationResult, IterationResult, RunnerError, DEFAULT_BATCH_SIZE};
