//! Authenticated HTTP gateway in front of a CRDP protect/reveal service.
//!
//! # Overview
//! Users log in with the demo account to obtain a bearer token, then call
//! protect/reveal (single and bulk), round-trip verification and health
//! routes. Every request builds its own `CrdpClient` from the process
//! defaults plus any per-request `policy`/`host`/`port` overrides.
//!
//! # Design
//! - Configuration is parsed once (`Settings`) and shared read-only.
//! - Upstream calls are blocking and run on `spawn_blocking`, one at a time
//!   per request.
//! - Single-call routes surface upstream failures as HTTP errors carrying
//!   the upstream status; verification routes report them in the body.

pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod logging;
pub mod routes;
pub mod state;

use axum::{http::HeaderValue, Router};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

pub use config::Settings;
pub use error::GatewayError;
pub use state::AppState;

pub fn app(settings: Settings) -> Router {
    let cors = cors_layer(&settings.cors_origins);
    routes::routes()
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(AppState::new(settings))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin.trim()).ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}
