//! HTTP route handlers for the mock catalog/checkout API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                       - Health check
//!
//! # Catalog
//! GET  /api/categories               - All categories
//! GET  /api/shops                    - Shops (optional ?category={id})
//! GET  /api/shops/featured           - Shops highlighted on the home page
//! GET  /api/store/{id}/products      - Products sold by a shop
//! GET  /api/products/{id}            - Product detail
//!
//! # Checkout
//! POST /api/checkout                 - Create a checkout, returns { paymentUrl, checkoutId }
//! ```

pub mod catalog;
pub mod checkout;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the `/api` routes router.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/categories", get(catalog::categories))
        .route("/shops", get(catalog::shops))
        .route("/shops/featured", get(catalog::featured_shops))
        .route("/store/{id}/products", get(catalog::shop_products))
        .route("/products/{id}", get(catalog::product))
        .route("/checkout", post(checkout::create))
}

/// Create the full router, without state or outer layers applied.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .nest("/api", api_routes())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}
