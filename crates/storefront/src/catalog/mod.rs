//! Catalog service: categories, shops and products.
//!
//! # Architecture
//!
//! - [`CatalogService`] is the seam between the session and wherever the
//!   reference data lives
//! - [`StaticCatalog`] serves the embedded fixture (and backs the mock API)
//! - [`HttpCatalog`] calls the catalog API with a `moka` cache (5 minute TTL)
//!
//! Catalog data is read-only; nothing in the storefront mutates it.

mod cache;
mod fixture;
mod http;

pub use fixture::StaticCatalog;
pub use http::HttpCatalog;

use async_trait::async_trait;
use suq_core::{Category, CategoryId, Product, ProductId, Shop, ShopId};
use thiserror::Error;

/// Errors that can occur when reading the catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The catalog API answered with a non-success status.
    #[error("catalog API returned {status}: {body}")]
    Status { status: u16, body: String },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The base URL could not be joined with an endpoint path.
    #[error("invalid catalog URL: {0}")]
    Url(#[from] url::ParseError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),
}

/// Read access to catalog reference data.
#[async_trait]
pub trait CatalogService: Send + Sync {
    /// All categories in display order.
    async fn categories(&self) -> Result<Vec<Category>, CatalogError>;

    /// Shops, optionally narrowed to one category.
    async fn shops(&self, category: Option<&CategoryId>) -> Result<Vec<Shop>, CatalogError>;

    /// Shops highlighted on the home page.
    async fn featured_shops(&self) -> Result<Vec<Shop>, CatalogError>;

    /// Products sold by a shop.
    async fn products(&self, shop: &ShopId) -> Result<Vec<Product>, CatalogError>;

    /// A single product by identity.
    async fn product(&self, id: &ProductId) -> Result<Product, CatalogError>;
}
