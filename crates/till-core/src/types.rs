//! # Domain Types
//!
//! Core entities moved between the Local Store, the sync pipelines and the
//! server.
//!
//! ## Entity Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Model                                    │
//! │                                                                         │
//! │  ┌──────────────────┐          ┌──────────────────────────────┐        │
//! │  │    Product       │          │        Transaction           │        │
//! │  │  ─────────────   │          │  ──────────────────────────  │        │
//! │  │  id, sku, name   │◄─────────│  items: Vec<LineItem>        │        │
//! │  │  price, stock    │productId │  subtotal / tax / total      │        │
//! │  │  tax_rate        │          │  payment_method, cashier_id  │        │
//! │  │  updated_at ─────┼─ cursor  │  sync_flag: Pending|Acked    │        │
//! │  └──────────────────┘          └──────────────────────────────┘        │
//! │                                                                         │
//! │  Product: owned by the server, refreshed by the Download Pipeline.      │
//! │  Transaction: created by the terminal, immutable except sync_flag.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wire Format
//! Everything here serializes camelCase, which is the sync protocol's JSON
//! shape. Local-only bookkeeping (`pending_deduction`, `sync_flag`) never
//! travels to the server as meaningful data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::{Money, TaxRate};
use crate::DEFAULT_TENANT_ID;

fn default_tenant_id() -> String {
    DEFAULT_TENANT_ID.to_string()
}

// =============================================================================
// Product
// =============================================================================

/// A catalog item.
///
/// ## Stock Ownership
/// `stock` is the last value the server reported. Sales rung up on this
/// terminal that the server has not seen yet are tracked separately in
/// `pending_deduction`, so a download can overwrite `stock` wholesale
/// without losing or double-counting them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,

    #[serde(default = "default_tenant_id")]
    pub tenant_id: String,

    /// Scan code, unique within a tenant.
    pub sku: String,

    pub name: String,

    #[serde(default)]
    pub category: Option<String>,

    /// Unit price (non-negative).
    pub price: Money,

    /// Server-authoritative stock. May go negative transiently.
    pub stock: i64,

    pub tax_rate: TaxRate,

    /// Sync watermark. Bumped by the server on every change.
    pub updated_at: DateTime<Utc>,

    /// Units sold locally that the server has not reflected yet.
    #[serde(skip)]
    pub pending_deduction: i64,
}

impl Product {
    /// Stock to show at the register: server value minus unsynced local sales.
    #[inline]
    pub fn available_stock(&self) -> i64 {
        self.stock - self.pending_deduction
    }

    /// Per-unit tax for this product at its current rate.
    #[inline]
    pub fn unit_tax(&self) -> Money {
        self.price.calculate_tax(self.tax_rate)
    }
}

// =============================================================================
// Payment Method
// =============================================================================

/// How a transaction was paid.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    /// Card tendered on an external terminal; we only record it.
    Card,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cash" => Ok(PaymentMethod::Cash),
            "card" | "credit" | "debit" => Ok(PaymentMethod::Card),
            other => Err(CoreError::UnknownPaymentMethod(other.to_string())),
        }
    }
}

// =============================================================================
// Sync Flag
// =============================================================================

/// Upload state of a locally created transaction.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncFlag {
    /// Created locally, not yet confirmed by the server.
    #[default]
    Pending,
    /// The server accepted the batch containing this transaction.
    Acknowledged,
}

impl SyncFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncFlag::Pending => "pending",
            SyncFlag::Acknowledged => "acknowledged",
        }
    }
}

impl fmt::Display for SyncFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Line Item
// =============================================================================

/// One line of a sale, frozen at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub product_id: String,

    /// Product name at the time of sale (for receipts and reports).
    #[serde(default)]
    pub name: String,

    /// Unit price.
    pub price: Money,

    /// Units sold, always >= 1.
    pub quantity: i64,

    /// Tax per unit.
    pub tax: Money,

    /// Discount applied to the whole line.
    #[serde(default)]
    pub discount: Money,
}

impl LineItem {
    /// `price × quantity − discount`.
    pub fn subtotal(&self) -> Money {
        self.price.multiply_quantity(self.quantity) - self.discount
    }

    /// `tax × quantity`.
    pub fn tax_total(&self) -> Money {
        self.tax.multiply_quantity(self.quantity)
    }

    /// [`LineItem::subtotal`], or `None` if it leaves the `i64` cent range.
    pub fn checked_subtotal(&self) -> Option<Money> {
        self.price
            .checked_multiply_quantity(self.quantity)?
            .checked_sub(self.discount)
    }

    pub fn checked_tax_total(&self) -> Option<Money> {
        self.tax.checked_multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Transaction
// =============================================================================

/// A completed sale.
///
/// ## Immutability
/// Totals are computed once in [`Transaction::new`] and stored. Nothing
/// recomputes them from current product prices later; the only field that
/// ever changes after creation is `sync_flag`.
///
/// ## Idempotency Key
/// `id` is a UUID v4 generated on the terminal. Retried uploads carry the
/// same id, which is what lets the server drop duplicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,

    #[serde(default = "default_tenant_id")]
    pub tenant_id: String,

    pub items: Vec<LineItem>,

    pub subtotal: Money,
    pub tax: Money,
    pub total: Money,

    pub payment_method: PaymentMethod,

    /// Creation time on the terminal clock.
    pub timestamp: DateTime<Utc>,

    pub cashier_id: String,

    #[serde(default)]
    pub sync_flag: SyncFlag,
}

/// Totals derived from a list of line items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Totals {
    pub subtotal: Money,
    pub tax: Money,
    pub total: Money,
}

impl Totals {
    /// Sums line subtotals and line taxes.
    ///
    /// ```rust
    /// use till_core::{LineItem, Money, Totals};
    ///
    /// let line = |price, quantity, tax| LineItem {
    ///     product_id: "p".into(),
    ///     name: String::new(),
    ///     price: Money::from_cents(price),
    ///     quantity,
    ///     tax: Money::from_cents(tax),
    ///     discount: Money::zero(),
    /// };
    /// let totals = Totals::of(&[line(1000, 2, 100), line(500, 1, 50)]);
    /// assert_eq!(totals.subtotal.cents(), 2500);
    /// assert_eq!(totals.tax.cents(), 250);
    /// assert_eq!(totals.total.cents(), 2750);
    /// ```
    ///
    /// Saturates instead of overflowing; [`Totals::checked_of`] is the exact
    /// version used when a sale is frozen.
    pub fn of(items: &[LineItem]) -> Self {
        let subtotal = items
            .iter()
            .fold(Money::zero(), |acc, item| acc.saturating_add(item.subtotal()));
        let tax = items
            .iter()
            .fold(Money::zero(), |acc, item| acc.saturating_add(item.tax_total()));
        Totals {
            subtotal,
            tax,
            total: subtotal.saturating_add(tax),
        }
    }

    /// `None` when any line amount or running sum overflows.
    pub fn checked_of(items: &[LineItem]) -> Option<Self> {
        let mut subtotal = Money::zero();
        let mut tax = Money::zero();
        for item in items {
            subtotal = subtotal.checked_add(item.checked_subtotal()?)?;
            tax = tax.checked_add(item.checked_tax_total()?)?;
        }
        Some(Totals {
            subtotal,
            tax,
            total: subtotal.checked_add(tax)?,
        })
    }
}

impl Transaction {
    /// Creates a pending transaction with a fresh id and frozen totals.
    ///
    /// ## Errors
    /// - `EmptyTransaction` when `items` is empty
    /// - `Validation` when any line has quantity < 1, negative price/tax/discount,
    ///   or a discount larger than the line amount
    /// - `Validation` when the totals do not fit in `i64` cents
    pub fn new(
        tenant_id: impl Into<String>,
        items: Vec<LineItem>,
        payment_method: PaymentMethod,
        cashier_id: impl Into<String>,
    ) -> CoreResult<Self> {
        if items.is_empty() {
            return Err(CoreError::EmptyTransaction);
        }
        for item in &items {
            crate::validation::validate_line_item(item)?;
        }

        let cashier_id = cashier_id.into();
        crate::validation::validate_cashier_id(&cashier_id)?;

        let totals = Totals::checked_of(&items).ok_or_else(|| ValidationError::OutOfRange {
            field: "total".to_string(),
            min: 0,
            max: i64::MAX,
        })?;

        Ok(Transaction {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.into(),
            items,
            subtotal: totals.subtotal,
            tax: totals.tax,
            total: totals.total,
            payment_method,
            timestamp: Utc::now(),
            cashier_id,
            sync_flag: SyncFlag::Pending,
        })
    }

    /// True when the stored totals still satisfy `subtotal + tax == total`.
    pub fn totals_consistent(&self) -> bool {
        self.subtotal.checked_add(self.tax) == Some(self.total)
    }

    #[inline]
    pub fn is_pending(&self) -> bool {
        self.sync_flag == SyncFlag::Pending
    }

    /// Total units sold across all lines.
    pub fn total_quantity(&self) -> i64 {
        self.items.iter().map(|i| i.quantity).sum()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
