//! Checkout: request building, payment gateways and the payment state machine.
//!
//! A checkout turns a cart snapshot into one [`CheckoutRequest`] per shop and
//! hands them to a [`CheckoutGateway`]. The [`CheckoutOrchestrator`] tracks the
//! resulting [`PaymentStatus`](suq_core::PaymentStatus) for the confirmation
//! overlay.

mod gateway;
mod orchestrator;

pub use gateway::{DEFAULT_SIMULATED_DELAY, HttpCheckoutGateway, SimulatedGateway};
pub use orchestrator::{CheckoutOrchestrator, Dismissal, PaymentState, ShopReceipt};

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use suq_core::{CheckoutId, ProductId, ShopId};
use thiserror::Error;

use crate::cart::{Cart, CartTotals};

/// Errors that can occur while creating a checkout.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The gateway refused the checkout.
    #[error("checkout rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The gateway URL could not be built.
    #[error("invalid checkout URL: {0}")]
    Url(#[from] url::ParseError),
}

/// One purchased line as sent to the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutItem {
    pub name: String,
    pub price: Decimal,
    pub quantity: u32,
    pub product_id: ProductId,
}

/// A checkout for a single shop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub items: Vec<CheckoutItem>,
    /// Share of the cart's delivery fee carried by this request.
    pub delivery_fee: Decimal,
    /// Subtotal of this shop's items plus `delivery_fee`.
    pub total_amount: Decimal,
    pub store_id: ShopId,
}

/// Gateway acknowledgement of a checkout.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutReceipt {
    /// Where to send the shopper to pay, when the gateway hosts payment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkout_id: Option<CheckoutId>,
}

/// External payment/checkout service.
#[async_trait]
pub trait CheckoutGateway: Send + Sync {
    /// Initiate a checkout and wait for the gateway's verdict.
    async fn create_checkout(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutReceipt, CheckoutError>;
}

/// The requests needed to pay for a whole cart.
///
/// Lines are split by shop, in the order shops first appear in the cart, so
/// a single-shop cart yields exactly one request for the first line's shop.
/// The cart pays the delivery fee once: the first request carries it and the
/// rest carry none, so the plan total always equals the cart total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutPlan {
    requests: Vec<CheckoutRequest>,
}

impl CheckoutPlan {
    /// Build the plan for `cart`. Returns `None` for an empty cart.
    #[must_use]
    pub fn from_cart(cart: &Cart, delivery_fee: Decimal) -> Option<Self> {
        let requests: Vec<CheckoutRequest> = cart
            .shop_groups()
            .into_iter()
            .enumerate()
            .map(|(index, group)| {
                let fee = if index == 0 { delivery_fee } else { Decimal::ZERO };
                let totals = CartTotals::from_subtotal(group.subtotal(), fee);
                CheckoutRequest {
                    items: group
                        .lines
                        .iter()
                        .map(|line| CheckoutItem {
                            name: line.product.name.clone(),
                            price: line.product.price,
                            quantity: line.quantity,
                            product_id: line.product.id.clone(),
                        })
                        .collect(),
                    delivery_fee: totals.delivery_fee,
                    total_amount: totals.total,
                    store_id: group.shop_id.clone(),
                }
            })
            .collect();

        (!requests.is_empty()).then_some(Self { requests })
    }

    #[must_use]
    pub fn requests(&self) -> &[CheckoutRequest] {
        &self.requests
    }

    /// Whether the cart spans more than one shop.
    #[must_use]
    pub fn is_split(&self) -> bool {
        self.requests.len() > 1
    }

    /// Sum of all request totals.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.requests.iter().map(|request| request.total_amount).sum()
    }
}
