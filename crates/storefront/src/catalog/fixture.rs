//! In-memory catalog seeded from the embedded JSON fixture.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use suq_core::{Category, CategoryId, Product, ProductId, Shop, ShopId};

use super::{CatalogError, CatalogService};

/// Mock catalog shipped with the storefront.
const FIXTURE: &str = include_str!("../../data/catalog.json");

/// Number of shops highlighted on the home page.
const FEATURED_SHOP_COUNT: usize = 2;

#[derive(Debug, Deserialize)]
struct CatalogData {
    categories: Vec<Category>,
    shops: Vec<Shop>,
    products: Vec<Product>,
}

/// Catalog backed by in-memory tables.
///
/// Cheap to clone; the tables are shared.
#[derive(Debug, Clone)]
pub struct StaticCatalog {
    data: Arc<CatalogData>,
}

impl StaticCatalog {
    /// Load the embedded mock catalog.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Parse`] if the fixture is malformed.
    pub fn from_fixture() -> Result<Self, CatalogError> {
        Self::from_json(FIXTURE)
    }

    /// Load a catalog from a JSON document with `categories`, `shops` and
    /// `products` arrays.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Parse`] if the document is malformed.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let data: CatalogData = serde_json::from_str(json)?;
        tracing::debug!(
            categories = data.categories.len(),
            shops = data.shops.len(),
            products = data.products.len(),
            "Loaded catalog"
        );
        Ok(Self {
            data: Arc::new(data),
        })
    }

    /// Build a catalog from already-loaded tables.
    #[must_use]
    pub fn new(categories: Vec<Category>, shops: Vec<Shop>, products: Vec<Product>) -> Self {
        Self {
            data: Arc::new(CatalogData {
                categories,
                shops,
                products,
            }),
        }
    }

    /// Look up a shop by identity.
    #[must_use]
    pub fn shop(&self, id: &ShopId) -> Option<&Shop> {
        self.data.shops.iter().find(|shop| &shop.id == id)
    }

    /// Look up a product by identity without going through the async seam.
    #[must_use]
    pub fn find_product(&self, id: &ProductId) -> Option<&Product> {
        self.data.products.iter().find(|product| &product.id == id)
    }
}

#[async_trait]
impl CatalogService for StaticCatalog {
    async fn categories(&self) -> Result<Vec<Category>, CatalogError> {
        Ok(self.data.categories.clone())
    }

    async fn shops(&self, category: Option<&CategoryId>) -> Result<Vec<Shop>, CatalogError> {
        Ok(self
            .data
            .shops
            .iter()
            .filter(|shop| category.is_none_or(|id| &shop.category_id == id))
            .cloned()
            .collect())
    }

    async fn featured_shops(&self) -> Result<Vec<Shop>, CatalogError> {
        let mut featured: Vec<Shop> = Vec::with_capacity(FEATURED_SHOP_COUNT);
        for product in &self.data.products {
            if featured.len() == FEATURED_SHOP_COUNT {
                break;
            }
            if featured.iter().any(|shop| shop.id == product.shop_id) {
                continue;
            }
            if let Some(shop) = self.shop(&product.shop_id) {
                featured.push(shop.clone());
            }
        }
        Ok(featured)
    }

    async fn products(&self, shop: &ShopId) -> Result<Vec<Product>, CatalogError> {
        Ok(self
            .data
            .products
            .iter()
            .filter(|product| &product.shop_id == shop)
            .cloned()
            .collect())
    }

    async fn product(&self, id: &ProductId) -> Result<Product, CatalogError> {
        self.find_product(id)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(format!("product {id}")))
    }
}
