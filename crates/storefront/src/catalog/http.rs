//! Catalog API client.
//!
//! Talks to the REST catalog (`/api/categories`, `/api/shops`,
//! `/api/shops/featured`, `/api/store/{id}/products`, `/api/products/{id}`)
//! and caches successful responses with `moka` (5-minute TTL). Failures are
//! returned to the caller, never cached.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use serde::de::DeserializeOwned;
use suq_core::{Category, CategoryId, Product, ProductId, Shop, ShopId};
use tracing::{debug, instrument};
use url::Url;

use super::cache::{CacheKey, CacheValue};
use super::{CatalogError, CatalogService};

const CACHE_CAPACITY: u64 = 1000;
const CACHE_TTL: Duration = Duration::from_secs(300);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the catalog REST API.
#[derive(Clone)]
pub struct HttpCatalog {
    inner: Arc<HttpCatalogInner>,
}

struct HttpCatalogInner {
    client: reqwest::Client,
    base_url: Url,
    cache: Cache<CacheKey, CacheValue>,
}

impl HttpCatalog {
    /// Create a client rooted at `base_url` (e.g., `http://localhost:3001`).
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Http`] if the HTTP client cannot be built.
    pub fn new(base_url: Url) -> Result<Self, CatalogError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        let cache = Cache::builder()
            .max_capacity(CACHE_CAPACITY)
            .time_to_live(CACHE_TTL)
            .build();

        Ok(Self {
            inner: Arc::new(HttpCatalogInner {
                client,
                base_url,
                cache,
            }),
        })
    }

    /// Drop all cached responses.
    pub fn invalidate(&self) {
        self.inner.cache.invalidate_all();
    }

    /// Build an endpoint URL from path segments. Each segment is
    /// percent-encoded on its own, so an id can never change the route.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, CatalogError> {
        if let Some(dots) = segments.iter().find(|s| matches!(**s, "" | "." | "..")) {
            return Err(CatalogError::NotFound(format!("invalid path segment {dots:?}")));
        }

        let mut url = self.inner.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| CatalogError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .clear()
            .extend(segments);
        Ok(url)
    }

    /// GET a JSON document from the catalog API.
    async fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, &str)],
    ) -> Result<T, CatalogError> {
        let mut url = self.endpoint(segments)?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }

        debug!(%url, "Fetching catalog resource");
        let response = self.inner.client.get(url.clone()).send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(CatalogError::NotFound(url.path().to_string()));
        }

        let body = response.text().await?;
        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %body.chars().take(500).collect::<String>(),
                "Catalog API returned non-success status"
            );
            return Err(CatalogError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }

    async fn cached(&self, key: &CacheKey) -> Option<CacheValue> {
        let hit = self.inner.cache.get(key).await;
        if hit.is_some() {
            debug!(?key, "Catalog cache hit");
        }
        hit
    }

    async fn fetch_shops(
        &self,
        key: CacheKey,
        segments: &[&str],
        query: &[(&str, &str)],
    ) -> Result<Vec<Shop>, CatalogError> {
        if let Some(CacheValue::Shops(shops)) = self.cached(&key).await {
            return Ok(shops);
        }

        let shops: Vec<Shop> = self.get_json(segments, query).await?;
        self.inner
            .cache
            .insert(key, CacheValue::Shops(shops.clone()))
            .await;
        Ok(shops)
    }
}

#[async_trait]
impl CatalogService for HttpCatalog {
    #[instrument(skip(self))]
    async fn categories(&self) -> Result<Vec<Category>, CatalogError> {
        let key = CacheKey::Categories;
        if let Some(CacheValue::Categories(categories)) = self.cached(&key).await {
            return Ok(categories);
        }

        let categories: Vec<Category> = self.get_json(&["api", "categories"], &[]).await?;
        self.inner
            .cache
            .insert(key, CacheValue::Categories(categories.clone()))
            .await;
        Ok(categories)
    }

    #[instrument(skip(self))]
    async fn shops(&self, category: Option<&CategoryId>) -> Result<Vec<Shop>, CatalogError> {
        let key = CacheKey::Shops {
            category: category.cloned(),
        };
        match category {
            Some(id) => {
                self.fetch_shops(key, &["api", "shops"], &[("category", id.as_str())])
                    .await
            }
            None => self.fetch_shops(key, &["api", "shops"], &[]).await,
        }
    }

    #[instrument(skip(self))]
    async fn featured_shops(&self) -> Result<Vec<Shop>, CatalogError> {
        self.fetch_shops(CacheKey::FeaturedShops, &["api", "shops", "featured"], &[])
            .await
    }

    #[instrument(skip(self))]
    async fn products(&self, shop: &ShopId) -> Result<Vec<Product>, CatalogError> {
        let key = CacheKey::Products(shop.clone());
        if let Some(CacheValue::Products(products)) = self.cached(&key).await {
            return Ok(products);
        }

        let products: Vec<Product> = self
            .get_json(&["api", "store", shop.as_str(), "products"], &[])
            .await?;
        self.inner
            .cache
            .insert(key, CacheValue::Products(products.clone()))
            .await;
        Ok(products)
    }

    #[instrument(skip(self))]
    async fn product(&self, id: &ProductId) -> Result<Product, CatalogError> {
        let key = CacheKey::Product(id.clone());
        if let Some(CacheValue::Product(product)) = self.cached(&key).await {
            return Ok(*product);
        }

        let product: Product = self
            .get_json(&["api", "products", id.as_str()], &[])
            .await?;
        self.inner
            .cache
            .insert(key, CacheValue::Product(Box::new(product.clone())))
            .await;
        Ok(product)
    }
}
