//! Shared, read-only application state.

use std::sync::Arc;

use crdp_core::{ClientConfig, ConfigOverride};

use crate::config::Settings;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    defaults: Arc<ClientConfig>,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        let defaults = Arc::new(settings.client_config());
        Self {
            settings: Arc::new(settings),
            defaults,
        }
    }

    /// Effective upstream configuration for one request.
    pub fn resolve(&self, overrides: &ConfigOverride) -> ClientConfig {
        self.defaults.with_overrides(overrides)
    }
}
