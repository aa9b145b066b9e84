//! Cache types for catalog API responses.

use suq_core::{Category, CategoryId, Product, ProductId, Shop, ShopId};

/// Cache key for catalog reads.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum CacheKey {
    Categories,
    Shops { category: Option<CategoryId> },
    FeaturedShops,
    Products(ShopId),
    Product(ProductId),
}

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Categories(Vec<Category>),
    Shops(Vec<Shop>),
    Products(Vec<Product>),
    Product(Box<Product>),
}
