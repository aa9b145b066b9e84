//! Catalog reference data: categories, shops and products.
//!
//! These records are loaded once (from a fixture or the catalog API) and are
//! never mutated afterwards. Field names on the wire follow the catalog API's
//! camelCase JSON, with the product identity carried as `_id`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{CategoryId, ProductId, ShopId};

/// A top-level browsing category (e.g., Groceries, Cafe).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub image: String,
}

/// A shop belonging to exactly one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shop {
    pub id: ShopId,
    pub name: String,
    /// Foreign key into [`Category`].
    #[serde(rename = "category")]
    pub category_id: CategoryId,
    pub image: String,
    #[serde(default)]
    pub description: String,
}

/// A product sold by a single shop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(rename = "_id")]
    pub id: ProductId,
    pub name: String,
    /// Unit price, never negative.
    pub price: Decimal,
    /// Strikethrough price shown next to a discounted `price`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_price: Option<Decimal>,
    /// Foreign key into [`Shop`].
    pub shop_id: ShopId,
    #[serde(default)]
    pub rating: f32,
    #[serde(default)]
    pub reviews: u32,
    #[serde(default)]
    pub description: String,
    pub image: String,
}

impl Product {
    /// Whether the product is currently discounted below its original price.
    #[must_use]
    pub fn is_discounted(&self) -> bool {
        self.old_price.is_some_and(|old| old > self.price)
    }
}
