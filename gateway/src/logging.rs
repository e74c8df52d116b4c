//! Structured logging setup.
//!
//! `RUST_LOG` selects the filter; without it everything logs at `info`.
//! JSON output is meant for production, plain text for development.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}
