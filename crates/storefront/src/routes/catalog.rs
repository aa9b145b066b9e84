//! Catalog route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use suq_core::{Category, CategoryId, Product, ProductId, Shop, ShopId};

use crate::catalog::CatalogService;
use crate::error::{AppError, Result};
use crate::state::AppState;

/// Shop listing query parameters.
#[derive(Debug, Deserialize)]
pub struct ShopsQuery {
    pub category: Option<CategoryId>,
}

/// List all categories.
pub async fn categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>> {
    Ok(Json(state.catalog().categories().await?))
}

/// List shops, optionally narrowed to one category.
pub async fn shops(
    State(state): State<AppState>,
    Query(query): Query<ShopsQuery>,
) -> Result<Json<Vec<Shop>>> {
    let shops = state.catalog().shops(query.category.as_ref()).await?;
    tracing::debug!(category = ?query.category, count = shops.len(), "Listed shops");
    Ok(Json(shops))
}

/// List the shops highlighted on the home page.
pub async fn featured_shops(State(state): State<AppState>) -> Result<Json<Vec<Shop>>> {
    Ok(Json(state.catalog().featured_shops().await?))
}

/// List the products of one shop.
pub async fn shop_products(
    State(state): State<AppState>,
    Path(id): Path<ShopId>,
) -> Result<Json<Vec<Product>>> {
    if state.catalog().shop(&id).is_none() {
        return Err(AppError::NotFound(format!("shop {id}")));
    }
    Ok(Json(state.catalog().products(&id).await?))
}

/// Show one product.
pub async fn product(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>> {
    Ok(Json(state.catalog().product(&id).await?))
}
