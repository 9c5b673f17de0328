//! # till-core: Pure Business Logic for Till POS
//!
//! Domain types, money arithmetic and cart math shared by the terminal
//! (`till-db`, `till-sync`, `apps/terminal`) and the reference sync server.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Till POS Architecture                            │
//! │                                                                         │
//! │  ┌──────────────────────┐               ┌──────────────────────────┐   │
//! │  │   apps/terminal      │               │   apps/sync-server       │   │
//! │  │   sell / sync / eod  │               │   /sync/* , /stock       │   │
//! │  └──────────┬───────────┘               └────────────┬─────────────┘   │
//! │             │                                        │                  │
//! │  ┌──────────▼───────────┐                            │                  │
//! │  │ till-sync            │ ── JSON over HTTP ─────────┤                  │
//! │  │ till-db              │                            │                  │
//! │  └──────────┬───────────┘                            │                  │
//! │             │                                        │                  │
//! │  ┌──────────▼────────────────────────────────────────▼─────────────┐   │
//! │  │               ★ till-core (THIS CRATE) ★                         │   │
//! │  │                                                                  │   │
//! │  │   types        money        cart         report     validation  │   │
//! │  │   Product      Money        Cart         EndOfDay   rules       │   │
//! │  │   Transaction  TaxRate      CartItem     Summary                │   │
//! │  │                                                                  │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK                              │   │
//! │  └──────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Product, Transaction, LineItem, PaymentMethod, SyncFlag
//! - [`money`] - Integer-cent `Money` and basis-point `TaxRate`
//! - [`cart`] - Cart building and totals freezing
//! - [`report`] - End-of-day aggregation
//! - [`protocol`] - Sync request/response bodies shared with the server
//! - [`validation`] - Business rule validation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use till_core::money::{Money, TaxRate};
//!
//! let price = Money::from_cents(1000); // $10.00
//! let tax = price.calculate_tax(TaxRate::from_bps(1000)); // 10%
//! assert_eq!(tax.cents(), 100);
//! ```

pub mod cart;
pub mod error;
pub mod money;
pub mod protocol;
pub mod report;
pub mod types;
pub mod validation;

pub use cart::{Cart, CartItem, CartTotals};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::{Money, TaxRate};
pub use report::EndOfDaySummary;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Tenant used when a terminal or request does not name one.
pub const DEFAULT_TENANT_ID: &str = "00000000-0000-0000-0000-000000000001";

/// Maximum distinct lines in a single cart.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity of a single line.
///
/// Catches typing 1000 instead of 10 at the register.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Default number of rows returned by product search.
pub const DEFAULT_SEARCH_LIMIT: u32 = 20;
