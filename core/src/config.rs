//! Client configuration and per-call override resolution.

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_HOST: &str = "192.168.0.231";
pub const DEFAULT_PORT: u16 = 32082;
pub const DEFAULT_POLICY: &str = "P03";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Effective settings for one `CrdpClient`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub policy: String,
    /// Port serving the health endpoint when it differs from `port`.
    pub healthz_port: Option<u16>,
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            policy: DEFAULT_POLICY.to_string(),
            healthz_port: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Caller-supplied fields that replace the process defaults for one call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub healthz_port: Option<u16>,
}

impl ClientConfig {
    /// Resolve every field independently: override if given, else default.
    /// Blank strings count as not given.
    pub fn with_overrides(&self, overrides: &ConfigOverride) -> ClientConfig {
        ClientConfig {
            host: non_blank(overrides.host.as_deref()).unwrap_or(self.host.as_str()).to_string(),
            port: overrides.port.unwrap_or(self.port),
            policy: non_blank(overrides.policy.as_deref())
                .unwrap_or(self.policy.as_str())
                .to_string(),
            healthz_port: overrides.healthz_port.or(self.healthz_port),
            timeout: self.timeout,
        }
    }

    pub fn effective_healthz_port(&self) -> u16 {
        self.healthz_port.unwrap_or(self.port)
    }

    pub(crate) fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    pub(crate) fn healthz_base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.effective_healthz_port())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_overrides_keeps_defaults() {
        let base = ClientConfig::default();
        assert_eq!(base.with_overrides(&ConfigOverride::default()), base);
    }

    #[test]
    fn each_field_resolves_independently() {
        let base = ClientConfig {
            healthz_port: Some(8080),
            ..ClientConfig::default()
        };
        let only_policy = ConfigOverride {
            policy: Some("P07".to_string()),
            ..ConfigOverride::default()
        };
        let cfg = base.with_overrides(&only_policy);
        assert_eq!(cfg.policy, "P07");
        assert_eq!(cfg.host, DEFAULT_HOST);
        assert_eq!(cfg.port, DEFAULT_PORT);
        assert_eq!(cfg.healthz_port, Some(8080));

        let only_port = ConfigOverride {
            port: Some(9000),
            ..ConfigOverride::default()
        };
        let cfg = base.with_overrides(&only_port);
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.policy, DEFAULT_POLICY);
        assert_eq!(cfg.host, DEFAULT_HOST);
    }

    #[test]
    fn blank_strings_are_ignored() {
        let cfg = ClientConfig::default().with_overrides(&ConfigOverride {
            host: Some("  ".to_string()),
            policy: Some(String::new()),
            ..ConfigOverride::default()
        });
        assert_eq!(cfg.host, DEFAULT_HOST);
        assert_eq!(cfg.policy, DEFAULT_POLICY);
    }

    #[test]
    fn healthz_port_falls_back_to_api_port() {
        let cfg = ClientConfig::default();
        assert_eq!(cfg.effective_healthz_port(), DEFAULT_PORT);
        assert_eq!(cfg.healthz_base_url(), format!("http://{DEFAULT_HOST}:{DEFAULT_PORT}"));

        let cfg = ClientConfig {
            healthz_port: Some(8080),
            ..ClientConfig::default()
        };
        assert_eq!(cfg.effective_healthz_port(), 8080);
    }
}
