//! Session cart: line merging, quantity changes and totals.
//!
//! The cart is an ordered list of lines keyed by product identity. Insertion
//! order is the order in which products were first added; merging into an
//! existing line never moves it.
//!
//! Changing the quantity of a product that is not in the cart is a defined
//! no-op ([`QuantityChange::Missing`]), not an error. A line whose quantity
//! would drop to zero or below is removed rather than kept at zero.

use rust_decimal::Decimal;
use serde::Serialize;
use suq_core::{CurrencyCode, Price, Product, ProductId, ShopId};
use thiserror::Error;

/// Default delivery fee charged on any non-empty cart (ETB).
pub const DEFAULT_DELIVERY_FEE: Decimal = Decimal::from_parts(5000, 0, 0, false, 2);

/// Badge counts above this value render as `"9+"`.
const BADGE_MAX: u32 = 9;

/// Errors from cart mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    /// `add_item` was called with a quantity of zero.
    #[error("quantity must be a positive integer")]
    InvalidQuantity,
}

/// One (product, quantity) pair.
///
/// The product is a snapshot taken when the line was created; later catalog
/// changes do not reprice the cart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CartLine {
    pub product: Product,
    pub quantity: u32,
}

impl CartLine {
    /// Product identity of this line.
    #[must_use]
    pub const fn product_id(&self) -> &ProductId {
        &self.product.id
    }

    /// Unit price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.product.price * Decimal::from(self.quantity)
    }
}

/// Outcome of [`Cart::change_quantity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityChange {
    /// The line kept its position with a new quantity.
    Updated { quantity: u32 },
    /// The quantity reached zero or below and the line was dropped.
    Removed,
    /// No line for this product; the cart is unchanged.
    Missing,
}

/// Derived money figures for a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CartTotals {
    pub subtotal: Decimal,
    pub delivery_fee: Decimal,
    pub total: Decimal,
}

impl CartTotals {
    /// Compute totals for a subtotal. The fee applies only when there is
    /// something to deliver.
    #[must_use]
    pub fn from_subtotal(subtotal: Decimal, delivery_fee: Decimal) -> Self {
        let delivery_fee = if subtotal > Decimal::ZERO {
            delivery_fee
        } else {
            Decimal::ZERO
        };
        Self {
            subtotal,
            delivery_fee,
            total: subtotal + delivery_fee,
        }
    }

    /// Format the three figures for display in the given currency.
    #[must_use]
    pub fn display(&self, currency: CurrencyCode) -> TotalsView {
        TotalsView {
            subtotal: Price::new(self.subtotal, currency).to_string(),
            delivery_fee: Price::new(self.delivery_fee, currency).to_string(),
            total: Price::new(self.total, currency).to_string(),
        }
    }
}

/// Display strings for the cart summary footer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TotalsView {
    pub subtotal: String,
    pub delivery_fee: String,
    pub total: String,
}

/// Lines belonging to one shop, in cart order.
#[derive(Debug, Clone, PartialEq)]
pub struct ShopGroup<'a> {
    pub shop_id: &'a ShopId,
    pub lines: Vec<&'a CartLine>,
}

impl ShopGroup<'_> {
    /// Sum of the group's line totals.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.lines.iter().map(|line| line.line_total()).sum()
    }
}

/// The shopping cart.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    /// Create an empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { lines: Vec::new() }
    }

    /// Add `quantity` units of `product`, merging into an existing line.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::InvalidQuantity`] if `quantity` is zero.
    pub fn add_item(&mut self, product: &Product, quantity: u32) -> Result<&Self, CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }

        if let Some(line) = self.line_mut(&product.id) {
            line.quantity = line.quantity.saturating_add(quantity);
            tracing::debug!(product_id = %product.id, quantity = line.quantity, "Merged cart line");
        } else {
            self.lines.push(CartLine {
                product: product.clone(),
                quantity,
            });
            tracing::debug!(product_id = %product.id, quantity, "Appended cart line");
        }

        Ok(self)
    }

    /// Apply a signed quantity delta to the line for `product_id`.
    pub fn change_quantity(&mut self, product_id: &ProductId, delta: i64) -> QuantityChange {
        let Some(index) = self.position(product_id) else {
            tracing::debug!(%product_id, delta, "Quantity change for product not in cart");
            return QuantityChange::Missing;
        };

        let Some(line) = self.lines.get_mut(index) else {
            return QuantityChange::Missing;
        };

        let next = i64::from(line.quantity).saturating_add(delta);
        if next <= 0 {
            self.lines.remove(index);
            tracing::debug!(%product_id, "Removed cart line");
            return QuantityChange::Removed;
        }

        line.quantity = u32::try_from(next).unwrap_or(u32::MAX);
        QuantityChange::Updated {
            quantity: line.quantity,
        }
    }

    /// Subtotal, delivery fee and grand total.
    #[must_use]
    pub fn totals(&self, delivery_fee: Decimal) -> CartTotals {
        CartTotals::from_subtotal(self.subtotal(), delivery_fee)
    }

    /// Sum of unit price times quantity over all lines.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.lines
            .iter()
            .fold(0_u32, |count, line| count.saturating_add(line.quantity))
    }

    /// Lines in insertion order.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Number of distinct products.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Quantity held for a product, if any.
    #[must_use]
    pub fn quantity_of(&self, product_id: &ProductId) -> Option<u32> {
        self.lines
            .iter()
            .find(|line| line.product_id() == product_id)
            .map(|line| line.quantity)
    }

    /// Drop every line.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Lines grouped by shop, groups ordered by the shop's first appearance.
    #[must_use]
    pub fn shop_groups(&self) -> Vec<ShopGroup<'_>> {
        let mut groups: Vec<ShopGroup<'_>> = Vec::new();
        for line in &self.lines {
            let shop_id = &line.product.shop_id;
            match groups.iter_mut().find(|group| group.shop_id == shop_id) {
                Some(group) => group.lines.push(line),
                None => groups.push(ShopGroup {
                    shop_id,
                    lines: vec![line],
                }),
            }
        }
        groups
    }

    fn position(&self, product_id: &ProductId) -> Option<usize> {
        self.lines
            .iter()
            .position(|line| line.product_id() == product_id)
    }

    fn line_mut(&mut self, product_id: &ProductId) -> Option<&mut CartLine> {
        self.lines
            .iter_mut()
            .find(|line| line.product_id() == product_id)
    }
}

/// Label for the cart badge on the tab bar.
#[must_use]
pub fn badge_label(count: u32) -> Option<String> {
    match count {
        0 => None,
        n if n > BADGE_MAX => Some(format!("{BADGE_MAX}+")),
        n => Some(n.to_string()),
    }
}
