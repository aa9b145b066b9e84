//! Checkout gateway implementations.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use suq_core::CheckoutId;
use tracing::instrument;
use url::Url;

use super::{CheckoutError, CheckoutGateway, CheckoutReceipt, CheckoutRequest};

/// Confirmation delay used when no live gateway is configured.
pub const DEFAULT_SIMULATED_DELAY: Duration = Duration::from_millis(1500);

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Gateway stand-in that confirms every checkout after a fixed delay.
#[derive(Debug, Clone, Copy)]
pub struct SimulatedGateway {
    delay: Duration,
}

impl SimulatedGateway {
    #[must_use]
    pub const fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for SimulatedGateway {
    fn default() -> Self {
        Self::new(DEFAULT_SIMULATED_DELAY)
    }
}

#[async_trait]
impl CheckoutGateway for SimulatedGateway {
    #[instrument(skip(self, request), fields(store_id = %request.store_id))]
    async fn create_checkout(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutReceipt, CheckoutError> {
        tokio::time::sleep(self.delay).await;
        let checkout_id = CheckoutId::generate();
        tracing::info!(%checkout_id, total = %request.total_amount, "Simulated checkout confirmed");
        Ok(CheckoutReceipt {
            payment_url: None,
            checkout_id: Some(checkout_id),
        })
    }
}

/// Client for the `/api/checkout` endpoint.
#[derive(Clone)]
pub struct HttpCheckoutGateway {
    inner: Arc<HttpCheckoutGatewayInner>,
}

struct HttpCheckoutGatewayInner {
    client: reqwest::Client,
    endpoint: Url,
    api_key: Option<SecretString>,
}

impl HttpCheckoutGateway {
    /// Create a gateway client rooted at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint URL cannot be built or the HTTP client
    /// fails to initialize.
    pub fn new(base_url: &Url, api_key: Option<SecretString>) -> Result<Self, CheckoutError> {
        let endpoint = base_url.join("/api/checkout")?;
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            inner: Arc::new(HttpCheckoutGatewayInner {
                client,
                endpoint,
                api_key,
            }),
        })
    }
}

#[async_trait]
impl CheckoutGateway for HttpCheckoutGateway {
    #[instrument(skip(self, request), fields(store_id = %request.store_id))]
    async fn create_checkout(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutReceipt, CheckoutError> {
        let mut builder = self
            .inner
            .client
            .post(self.inner.endpoint.clone())
            .json(request);
        if let Some(key) = &self.inner.api_key {
            builder = builder.bearer_auth(key.expose_secret());
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::warn!(
                status = %status,
                body = %body.chars().take(500).collect::<String>(),
                "Checkout rejected"
            );
            return Err(CheckoutError::Rejected {
                status: status.as_u16(),
                message: body,
            });
        }

        let receipt: CheckoutReceipt = serde_json::from_str(&body)?;
        tracing::info!(
            checkout_id = ?receipt.checkout_id,
            has_payment_url = receipt.payment_url.is_some(),
            "Checkout created"
        );
        Ok(receipt)
    }
}
