//! Errors raised by the domain layer.
//!
//! ```text
//!   validate_* ──► ValidationError ──┐
//!                                    ├──► CoreError ──► Checkout / server handler
//!   Cart ops ────────────────────────┘
//! ```
//!
//! Storage and sync failures live in their own crates (`StorageError`,
//! `SyncError`); nothing here touches I/O.

use thiserror::Error;

/// A sale could not be built.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Scan or lookup found no such SKU or id in the Local Store.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Checkout on an empty cart, or an uploaded transaction with no lines.
    #[error("Transaction has no line items")]
    EmptyTransaction,

    #[error("Product {0} not in cart")]
    NotInCart(String),

    /// A line would exceed `MAX_ITEM_QUANTITY`.
    #[error("Quantity {requested} is over the per-line limit of {max}")]
    QuantityTooLarge { requested: i64, max: i64 },

    #[error("Unknown payment method: {0} (expected cash or card)")]
    UnknownPaymentMethod(String),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

/// A field failed a shape or range check.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    #[error("{field} is malformed: {reason}")]
    InvalidFormat { field: String, reason: String },
}

pub type CoreResult<T> = Result<T, CoreError>;
