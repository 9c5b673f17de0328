//! # Cart
//!
//! The sale being rung up, before it becomes a [`Transaction`].
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart Operations                                      │
//! │                                                                         │
//! │  Scan / pick product ──► add_item() ──────────► line added or qty += n  │
//! │  Change quantity ──────► update_quantity() ───► qty = n (0 removes)     │
//! │  Line discount ────────► set_discount() ──────► discount = amount       │
//! │  Remove ───────────────► remove_item()                                  │
//! │  Checkout ─────────────► to_transaction() ────► Transaction (Pending)   │
//! │                                                                         │
//! │  Price and per-unit tax are frozen when the line is first added.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{LineItem, PaymentMethod, Product, Totals, Transaction};
use crate::validation::{validate_cart_size, validate_quantity};
use crate::MAX_ITEM_QUANTITY;

/// A line in the cart.
///
/// Holds a frozen copy of the product's price and tax so the cart stays
/// consistent if a download updates the product mid-sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: String,
    pub sku: String,
    pub name: String,

    /// Unit price at the time of adding.
    pub unit_price: Money,

    /// Per-unit tax at the time of adding.
    pub unit_tax: Money,

    pub quantity: i64,

    /// Absolute discount on the whole line.
    pub discount: Money,

    pub added_at: DateTime<Utc>,
}

impl CartItem {
    /// Creates a cart line from a product, freezing price and tax.
    pub fn from_product(product: &Product, quantity: i64) -> Self {
        CartItem {
            product_id: product.id.clone(),
            sku: product.sku.clone(),
            name: product.name.clone(),
            unit_price: product.price,
            unit_tax: product.unit_tax(),
            quantity,
            discount: Money::zero(),
            added_at: Utc::now(),
        }
    }

    /// Converts into the immutable line stored on the transaction.
    pub fn to_line_item(&self) -> LineItem {
        LineItem {
            product_id: self.product_id.clone(),
            name: self.name.clone(),
            price: self.unit_price,
            quantity: self.quantity,
            tax: self.unit_tax,
            discount: self.discount,
        }
    }
}

/// The shopping cart.
///
/// ## Invariants
/// - Lines are unique by `product_id` (adding the same product bumps quantity)
/// - Every quantity is in `1..=MAX_ITEM_QUANTITY`
/// - At most `MAX_CART_ITEMS` lines
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub items: Vec<CartItem>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `quantity` of a product, merging with an existing line.
    pub fn add_item(&mut self, product: &Product, quantity: i64) -> CoreResult<()> {
        validate_quantity(quantity)?;

        if let Some(item) = self.items.iter_mut().find(|i| i.product_id == product.id) {
            let requested = item.quantity + quantity;
            if requested > MAX_ITEM_QUANTITY {
                return Err(CoreError::QuantityTooLarge {
                    requested,
                    max: MAX_ITEM_QUANTITY,
                });
            }
            item.quantity = requested;
            return Ok(());
        }

        validate_cart_size(self.items.len())?;
        self.items.push(CartItem::from_product(product, quantity));
        Ok(())
    }

    /// Sets a line's quantity. Zero removes the line.
    pub fn update_quantity(&mut self, product_id: &str, quantity: i64) -> CoreResult<()> {
        if quantity == 0 {
            return self.remove_item(product_id);
        }

        if quantity > MAX_ITEM_QUANTITY {
            return Err(CoreError::QuantityTooLarge {
                requested: quantity,
                max: MAX_ITEM_QUANTITY,
            });
        }
        validate_quantity(quantity)?;

        let item = self.find_mut(product_id)?;
        item.quantity = quantity;
        if item.discount > item.unit_price.multiply_quantity(quantity) {
            item.discount = Money::zero();
        }
        Ok(())
    }

    /// Applies an absolute discount to a line.
    pub fn set_discount(&mut self, product_id: &str, discount: Money) -> CoreResult<()> {
        let item = self.find_mut(product_id)?;
        let candidate = LineItem {
            discount,
            ..item.to_line_item()
        };
        crate::validation::validate_line_item(&candidate)?;
        item.discount = discount;
        Ok(())
    }

    pub fn remove_item(&mut self, product_id: &str) -> CoreResult<()> {
        let initial_len = self.items.len();
        self.items.retain(|i| i.product_id != product_id);

        if self.items.len() == initial_len {
            Err(CoreError::NotInCart(product_id.to_string()))
        } else {
            Ok(())
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn total_quantity(&self) -> i64 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    /// Current lines as they would be stored on a transaction.
    pub fn line_items(&self) -> Vec<LineItem> {
        self.items.iter().map(CartItem::to_line_item).collect()
    }

    pub fn totals(&self) -> CartTotals {
        CartTotals::from(self)
    }

    /// Freezes the cart into a pending transaction.
    ///
    /// The cart is left untouched; callers clear it once the transaction is
    /// safely persisted.
    pub fn to_transaction(
        &self,
        tenant_id: &str,
        payment_method: PaymentMethod,
        cashier_id: &str,
    ) -> CoreResult<Transaction> {
        Transaction::new(tenant_id, self.line_items(), payment_method, cashier_id)
    }

    fn find_mut(&mut self, product_id: &str) -> CoreResult<&mut CartItem> {
        self.items
            .iter_mut()
            .find(|i| i.product_id == product_id)
            .ok_or_else(|| CoreError::NotInCart(product_id.to_string()))
    }
}

/// Cart totals summary for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartTotals {
    pub item_count: usize,
    pub total_quantity: i64,
    pub subtotal: Money,
    pub tax: Money,
    pub total: Money,
}

impl From<&Cart> for CartTotals {
    fn from(cart: &Cart) -> Self {
        let totals = Totals::of(&cart.line_items());
        CartTotals {
            item_count: cart.item_count(),
            total_quantity: cart.total_quantity(),
            subtotal: totals.subtotal,
            tax: totals.tax,
            total: totals.total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::TaxRate;
    use crate::{DEFAULT_TENANT_ID, MAX_CART_ITEMS};

    fn product(id: &str, price: i64, tax_bps: u32) -> Product {
        Product {
            id: id.to_string(),
            tenant_id: DEFAULT_TENANT_ID.to_string(),
            sku: format!("SKU-{id}"),
            name: format!("Product {id}"),
            category: None,
            price: Money::from_cents(price),
            stock: 10,
            tax_rate: TaxRate::from_bps(tax_bps),
            updated_at: Utc::now(),
            pending_deduction: 0,
        }
    }

    #[test]
    fn test_add_merges_same_product() {
        let mut cart = Cart::new();
        let a = product("a", 1000, 1000);

        cart.add_item(&a, 1).unwrap();
        cart.add_item(&a, 1).unwrap();

        assert_eq!(cart.item_count(), 1);
        assert_eq!(cart.total_quantity(), 2);
    }

    #[test]
    fn test_totals_match_transaction() {
        let mut cart = Cart::new();
        cart.add_item(&product("a", 1000, 1000), 2).unwrap();
        cart.add_item(&product("b", 500, 1000), 1).unwrap();

        let totals = cart.totals();
        assert_eq!(totals.subtotal.cents(), 2500);
        assert_eq!(totals.tax.cents(), 250);
        assert_eq!(totals.total.cents(), 2750);

        let tx = cart.to_transaction(DEFAULT_TENANT_ID, PaymentMethod::Cash, "c1").unwrap();
        assert_eq!(tx.total, totals.total);
        assert_eq!(tx.items.len(), 2);
    }

    #[test]
    fn test_price_frozen_on_add() {
        let mut cart = Cart::new();
        let mut a = product("a", 1000, 0);
        cart.add_item(&a, 1).unwrap();

        a.price = Money::from_cents(9999);
        cart.add_item(&a, 1).unwrap();

        assert_eq!(cart.items[0].unit_price.cents(), 1000);
        assert_eq!(cart.totals().subtotal.cents(), 2000);
    }

    #[test]
    fn test_quantity_limits() {
        let mut cart = Cart::new();
        let a = product("a", 100, 0);
        cart.add_item(&a, 998).unwrap();

        let err = cart.add_item(&a, 2).unwrap_err();
        assert!(matches!(err, CoreError::QuantityTooLarge { requested: 1000, .. }));

        assert!(cart.add_item(&a, 0).is_err());
        assert!(cart.update_quantity("a", 1000).is_err());
    }

    #[test]
    fn test_update_to_zero_removes() {
        let mut cart = Cart::new();
        cart.add_item(&product("a", 100, 0), 3).unwrap();

        cart.update_quantity("a", 0).unwrap();
        assert!(cart.is_empty());
        assert!(matches!(
            cart.update_quantity("a", 1),
            Err(CoreError::NotInCart(_))
        ));
    }

    #[test]
    fn test_discount() {
        let mut cart = Cart::new();
        cart.add_item(&product("a", 1000, 0), 2).unwrap();

        cart.set_discount("a", Money::from_cents(500)).unwrap();
        assert_eq!(cart.totals().total.cents(), 1500);

        assert!(cart.set_discount("a", Money::from_cents(2001)).is_err());

        cart.update_quantity("a", 1).unwrap();
        assert_eq!(cart.items[0].discount.cents(), 500);

        // shrinking the line below its discount drops the discount
        cart.update_quantity("a", 2).unwrap();
        cart.set_discount("a", Money::from_cents(1500)).unwrap();
        cart.update_quantity("a", 1).unwrap();
        assert!(cart.items[0].discount.is_zero());
    }

    #[test]
    fn test_cart_size_limit() {
        let mut cart = Cart::new();
        for i in 0..MAX_CART_ITEMS {
            cart.add_item(&product(&i.to_string(), 100, 0), 1).unwrap();
        }
        assert!(cart.add_item(&product("extra", 100, 0), 1).is_err());
    }

    #[test]
    fn test_empty_cart_cannot_check_out() {
        let cart = Cart::new();
        let err = cart
            .to_transaction(DEFAULT_TENANT_ID, PaymentMethod::Card, "c1")
            .unwrap_err();
        assert!(matches!(err, CoreError::EmptyTransaction));
    }
}
