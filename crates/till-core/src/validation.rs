//! # Validation Module
//!
//! Input validation shared by the terminal and the sync server.
//!
//! ## Where Validation Runs
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Terminal                                                              │
//! │  ├── Cart::add_item / update_quantity  → validate_quantity             │
//! │  ├── Transaction::new                  → validate_line_item            │
//! │  └── Checkout::search / scan           → validate_search_query / sku   │
//! │           │                                                             │
//! │           ▼  POST /sync/transactions                                    │
//! │  Sync Server                                                           │
//! │  ├── validate_transaction (rejects the whole batch on failure)         │
//! │  └── validate_product (seed catalog)                                   │
//! │                                                                         │
//! │  SQLite constraints back both layers up on the terminal.               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::types::{LineItem, Product, Transaction};
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

fn required(field: &str) -> ValidationError {
    ValidationError::Required {
        field: field.to_string(),
    }
}

// =============================================================================
// String Validators
// =============================================================================

/// Validates a SKU.
///
/// ## Rules
/// - Not empty, at most 50 characters
/// - Letters, numbers, hyphens and underscores only
///
/// ```rust
/// use till_core::validation::validate_sku;
///
/// assert!(validate_sku("COKE-330").is_ok());
/// assert!(validate_sku("").is_err());
/// assert!(validate_sku("has space").is_err());
/// ```
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();

    if sku.is_empty() {
        return Err(required("sku"));
    }

    if sku.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "sku".to_string(),
            max: 50,
        });
    }

    if !sku
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "sku".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates a product name (1-200 characters after trimming).
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(required("name"));
    }

    if name.len() > 200 {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Validates and trims a search query. Empty is allowed.
pub fn validate_search_query(query: &str) -> ValidationResult<String> {
    let query = query.trim();

    if query.len() > 100 {
        return Err(ValidationError::TooLong {
            field: "query".to_string(),
            max: 100,
        });
    }

    Ok(query.to_string())
}

/// Validates the cashier id stamped on every transaction.
pub fn validate_cashier_id(cashier_id: &str) -> ValidationResult<()> {
    if cashier_id.trim().is_empty() {
        return Err(required("cashier_id"));
    }
    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity: `1..=MAX_ITEM_QUANTITY`.
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if !(1..=MAX_ITEM_QUANTITY).contains(&qty) {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a price in cents. Zero is allowed (free items).
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: "price".to_string(),
        });
    }

    Ok(())
}

/// Validates cart size before adding another distinct line.
pub fn validate_cart_size(current_items: usize) -> ValidationResult<()> {
    if current_items >= MAX_CART_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "cart items".to_string(),
            min: 0,
            max: MAX_CART_ITEMS as i64,
        });
    }

    Ok(())
}

/// Validates a UUID string.
pub fn validate_uuid(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(required("id"));
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: "id".to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Entity Validators
// =============================================================================

/// Validates a single line of a sale.
///
/// ## Rules
/// - `product_id` present
/// - quantity in `1..=999`
/// - price, tax and discount non-negative
/// - discount no larger than `price × quantity`
/// - `price × quantity` and `tax × quantity` fit in `i64` cents
pub fn validate_line_item(item: &LineItem) -> ValidationResult<()> {
    if item.product_id.trim().is_empty() {
        return Err(required("product_id"));
    }

    validate_quantity(item.quantity)?;
    validate_price_cents(item.price.cents())?;

    if item.tax.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: "tax".to_string(),
        });
    }

    if item.discount.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: "discount".to_string(),
        });
    }

    let gross = item
        .price
        .checked_multiply_quantity(item.quantity)
        .ok_or_else(|| amount_too_large("price", item.quantity))?;
    item.tax
        .checked_multiply_quantity(item.quantity)
        .ok_or_else(|| amount_too_large("tax", item.quantity))?;

    if item.discount > gross {
        return Err(ValidationError::OutOfRange {
            field: "discount".to_string(),
            min: 0,
            max: gross.cents(),
        });
    }

    Ok(())
}

/// Per-unit amount whose product with `quantity` overflows `i64` cents.
fn amount_too_large(field: &str, quantity: i64) -> ValidationError {
    ValidationError::OutOfRange {
        field: field.to_string(),
        min: 0,
        max: i64::MAX / quantity,
    }
}

/// Validates a transaction received over the wire.
///
/// Totals are checked for internal consistency only. They are never
/// recomputed against current prices.
pub fn validate_transaction(tx: &Transaction) -> ValidationResult<()> {
    validate_uuid(&tx.id)?;
    validate_cashier_id(&tx.cashier_id)?;

    if tx.items.is_empty() {
        return Err(required("items"));
    }

    for item in &tx.items {
        validate_line_item(item)?;
    }

    if !tx.totals_consistent() {
        return Err(ValidationError::InvalidFormat {
            field: "total".to_string(),
            reason: format!("{} + {} != {}", tx.subtotal, tx.tax, tx.total),
        });
    }

    Ok(())
}

/// Validates a catalog product.
pub fn validate_product(product: &Product) -> ValidationResult<()> {
    if product.id.trim().is_empty() {
        return Err(required("id"));
    }
    validate_sku(&product.sku)?;
    validate_product_name(&product.name)?;
    validate_price_cents(product.price.cents())?;
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
