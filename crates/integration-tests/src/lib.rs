//! Integration tests for Suq.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p suq-integration-tests
//! ```
//!
//! No external services are needed: [`TestServer`] runs the mock catalog and
//! checkout API in-process on an ephemeral port.
//!
//! # Test Categories
//!
//! - `session_flow` - Shopping sessions against the embedded catalog
//! - `api_roundtrip` - HTTP clients against the running mock API

use std::net::SocketAddr;

use suq_storefront::catalog::{CatalogError, StaticCatalog};
use suq_storefront::config::{ConfigError, StorefrontConfig};
use suq_storefront::routes;
use suq_storefront::state::AppState;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Errors raised while starting a [`TestServer`].
#[derive(Debug, Error)]
pub enum StartError {
    #[error("failed to bind test listener: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid test configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("invalid server URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("failed to load catalog: {0}")]
    Catalog(#[from] CatalogError),
}

/// The mock API served on `127.0.0.1` with an OS-assigned port.
///
/// The server shuts down when the handle is dropped.
pub struct TestServer {
    pub base_url: Url,
    pub addr: SocketAddr,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl TestServer {
    /// Start with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound.
    pub async fn start() -> Result<Self, StartError> {
        Self::start_with(&[]).await
    }

    /// Start with extra `SUQ_*` variables (e.g., `SUQ_CHECKOUT_API_KEY`).
    ///
    /// `SUQ_API_URL` always points at the server itself.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound or the variables are
    /// invalid.
    pub async fn start_with(vars: &[(&str, &str)]) -> Result<Self, StartError> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let base_url = Url::parse(&format!("http://{addr}"))?;

        let api_url = base_url.to_string();
        let config = StorefrontConfig::from_lookup(|key| {
            if key == "SUQ_API_URL" {
                return Some(api_url.clone());
            }
            vars.iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| (*value).to_string())
        })?;

        let catalog = StaticCatalog::from_fixture()?;
        let app = routes::routes().with_state(AppState::new(config, catalog));

        let shutdown = CancellationToken::new();
        let signal = shutdown.clone();
        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app)
                .with_graceful_shutdown(async move { signal.cancelled().await })
                .await;
        });

        Ok(Self {
            base_url,
            addr,
            shutdown,
            task,
        })
    }

    /// Stop the server and wait for it to finish.
    pub async fn stop(mut self) {
        self.shutdown.cancel();
        let _ = (&mut self.task).await;
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
