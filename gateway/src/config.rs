//! Process configuration, read once at startup from flags and environment.

use std::time::Duration;

use clap::Parser;
use crdp_core::config::{DEFAULT_HOST, DEFAULT_POLICY, DEFAULT_PORT};
use crdp_core::ClientConfig;

/// Gateway settings. Every flag can also be given as the environment
/// variable shown in `--help`.
#[derive(Parser, Debug, Clone)]
#[command(name = "crdp-gateway")]
#[command(version, about = "Authenticated gateway to a CRDP protect/reveal service", long_about = None)]
pub struct Settings {
    /// Address the HTTP server binds to
    #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1:8000")]
    pub bind: String,

    /// HMAC key used to sign access tokens
    #[arg(long, env = "SECRET_KEY", default_value = "change_me", hide_env_values = true)]
    pub secret_key: String,

    #[arg(long, env = "ACCESS_TOKEN_EXPIRE_MINUTES", default_value_t = 60)]
    pub access_token_expire_minutes: i64,

    #[arg(long, env = "DEMO_USERNAME", default_value = "demo")]
    pub demo_username: String,

    #[arg(long, env = "DEMO_PASSWORD", default_value = "demo", hide_env_values = true)]
    pub demo_password: String,

    #[arg(long, env = "CRDP_API_HOST", default_value = DEFAULT_HOST)]
    pub crdp_api_host: String,

    #[arg(long, env = "CRDP_API_PORT", default_value_t = DEFAULT_PORT)]
    pub crdp_api_port: u16,

    #[arg(long, env = "CRDP_PROTECTION_POLICY", default_value = DEFAULT_POLICY)]
    pub crdp_protection_policy: String,

    /// Health endpoint port, when it differs from the API port
    #[arg(long, env = "CRDP_HEALTHZ_PORT")]
    pub crdp_healthz_port: Option<u16>,

    /// Per-call upstream timeout in seconds
    #[arg(long, env = "CRDP_TIMEOUT_SECS", default_value_t = 10)]
    pub crdp_timeout_secs: u64,

    /// Comma separated list of allowed browser origins
    #[arg(
        long,
        env = "CORS_ORIGINS",
        value_delimiter = ',',
        default_value = "http://localhost:5173,http://127.0.0.1:5173"
    )]
    pub cors_origins: Vec<String>,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON")]
    pub log_json: bool,
}

impl Settings {
    /// Process-wide default upstream configuration.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            host: self.crdp_api_host.clone(),
            port: self.crdp_api_port,
            policy: self.crdp_protection_policy.clone(),
            healthz_port: self.crdp_healthz_port,
            timeout: Duration::from_secs(self.crdp_timeout_secs),
        }
    }

    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.access_token_expire_minutes.max(0) as u64 * 60)
    }
}
