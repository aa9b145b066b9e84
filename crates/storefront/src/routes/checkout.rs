//! Checkout route handler.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::HeaderMap,
};
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use suq_core::CheckoutId;

use crate::checkout::{CheckoutReceipt, CheckoutRequest};
use crate::error::{AppError, Result};
use crate::state::AppState;

/// Create a checkout for one shop's items.
///
/// The request must name a known shop and list at least one item. Its total
/// must equal the catalog prices plus its delivery fee, which is either the
/// configured fee or zero for the later shops of a split cart.
pub async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: std::result::Result<Json<CheckoutRequest>, JsonRejection>,
) -> Result<Json<CheckoutReceipt>> {
    authorize(&state, &headers)?;

    let Json(request) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;
    validate(&state, &request)?;

    let checkout_id = CheckoutId::generate();
    let payment_url = state
        .config()
        .api_url
        .join(&format!("/pay/{checkout_id}"))
        .map_err(|e| AppError::Internal(e.to_string()))?;

    tracing::info!(
        %checkout_id,
        store_id = %request.store_id,
        items = request.items.len(),
        total = %request.total_amount,
        "Checkout created"
    );

    Ok(Json(CheckoutReceipt {
        payment_url: Some(payment_url.into()),
        checkout_id: Some(checkout_id),
    }))
}

/// Require the configured bearer token, if any.
fn authorize(state: &AppState, headers: &HeaderMap) -> Result<()> {
    let Some(expected) = &state.config().checkout.api_key else {
        return Ok(());
    };

    let provided = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    if provided == Some(expected.expose_secret()) {
        Ok(())
    } else {
        tracing::warn!("Checkout rejected: missing or invalid API key");
        Err(AppError::Unauthorized("invalid API key".to_string()))
    }
}

fn validate(state: &AppState, request: &CheckoutRequest) -> Result<()> {
    if request.items.is_empty() {
        return Err(AppError::BadRequest("checkout has no items".to_string()));
    }

    let catalog = state.catalog();
    if catalog.shop(&request.store_id).is_none() {
        return Err(AppError::BadRequest(format!(
            "unknown store {}",
            request.store_id
        )));
    }

    let mut subtotal = Decimal::ZERO;
    for item in &request.items {
        let product = catalog
            .find_product(&item.product_id)
            .filter(|product| product.shop_id == request.store_id)
            .ok_or_else(|| {
                AppError::BadRequest(format!(
                    "product {} is not sold by {}",
                    item.product_id, request.store_id
                ))
            })?;
        if item.quantity == 0 {
            return Err(AppError::BadRequest(format!(
                "quantity for {} must be positive",
                item.product_id
            )));
        }
        subtotal += product.price * Decimal::from(item.quantity);
    }

    let fee = state.config().session.delivery_fee;
    if request.delivery_fee != fee && !request.delivery_fee.is_zero() {
        return Err(AppError::BadRequest(format!(
            "delivery fee {} is neither {fee} nor zero",
            request.delivery_fee
        )));
    }

    let expected = subtotal + request.delivery_fee;
    if request.total_amount != expected {
        return Err(AppError::BadRequest(format!(
            "total {} does not match expected {expected}",
            request.total_amount
        )));
    }

    Ok(())
}
