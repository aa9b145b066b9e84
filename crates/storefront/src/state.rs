//! Application state shared across handlers.

use std::sync::Arc;

use crate::catalog::StaticCatalog;
use crate::config::StorefrontConfig;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to the
/// catalog tables and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    catalog: StaticCatalog,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(config: StorefrontConfig, catalog: StaticCatalog) -> Self {
        Self {
            inner: Arc::new(AppStateInner { config, catalog }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the catalog served by the API.
    #[must_use]
    pub fn catalog(&self) -> &StaticCatalog {
        &self.inner.catalog
    }
}

/// State backed by the embedded catalog and default configuration.
#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) fn test_state() -> AppState {
    let config = StorefrontConfig::from_lookup(|_| None).unwrap();
    AppState::new(config, StaticCatalog::from_fixture().unwrap())
}
