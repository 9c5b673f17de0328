//! # Money Module
//!
//! `Money` (integer cents) and `TaxRate` (basis points).
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │    0.1 + 0.2 = 0.30000000000000004                                      │
//! │                                                                         │
//! │  A transaction total is frozen at sale time and must satisfy            │
//! │  subtotal + tax == total exactly, on the terminal AND on the server.    │
//! │  Integer cents make that an equality check, not an epsilon compare.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wire Representation
//! The sync protocol carries prices as decimal numbers in major units
//! (`"price": 10.99`) and tax rates as fractions (`"taxRate": 0.0825`).
//! Both types convert at the serde boundary and round to the nearest
//! cent / basis point, so nothing past deserialization sees a float.
//!
//! ```rust
//! use till_core::money::Money;
//!
//! let price: Money = serde_json::from_str("10.99").unwrap();
//! assert_eq!(price.cents(), 1099);
//! assert_eq!(serde_json::to_string(&Money::from_cents(2750)).unwrap(), "27.5");
//! ```

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};

/// Largest decimal amount accepted off the wire (about 92 trillion).
const MAX_DECIMAL_AMOUNT: f64 = (i64::MAX / 100) as f64;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents).
///
/// ## Where Money Flows
/// ```text
/// Product.price ──► CartItem.unit_price ──► LineItem.price ──┐
///                                                            ▼
///                 Transaction.subtotal + Transaction.tax = Transaction.total
///                                                            │
///                                  EndOfDaySummary.total_sales ◄┘
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from major and minor units.
    ///
    /// ```rust
    /// use till_core::money::Money;
    ///
    /// assert_eq!(Money::from_major_minor(10, 99).cents(), 1099);
    /// assert_eq!(Money::from_major_minor(-5, 50).cents(), -550);
    /// ```
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Converts a decimal amount in major units, rounding to the nearest cent.
    ///
    /// Returns `None` for NaN, infinities and amounts outside the i64 cent range.
    pub fn from_decimal(amount: f64) -> Option<Self> {
        if !amount.is_finite() || amount.abs() > MAX_DECIMAL_AMOUNT {
            return None;
        }
        Some(Money((amount * 100.0).round() as i64))
    }

    /// Returns the amount in major units as a float (wire/display only).
    #[inline]
    pub fn to_decimal(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit (dollars) portion.
    #[inline]
    pub const fn dollars(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Calculates tax at `rate`, rounding half up.
    ///
    /// ## Implementation
    /// Integer math only: `(cents * bps + 5000) / 10000`.
    ///
    /// ```rust
    /// use till_core::money::{Money, TaxRate};
    ///
    /// // $10.00 × 8.25% = $0.825 → $0.83
    /// let tax = Money::from_cents(1000).calculate_tax(TaxRate::from_bps(825));
    /// assert_eq!(tax.cents(), 83);
    /// ```
    pub fn calculate_tax(&self, rate: TaxRate) -> Money {
        // i128 keeps large amounts from overflowing before the division
        let tax_cents = (self.0 as i128 * rate.bps() as i128 + 5000) / 10000;
        Money::from_cents(tax_cents as i64)
    }

    /// Multiplies a unit amount by a quantity, saturating at the `i64` bounds.
    ///
    /// Display and cart paths only. Anything that must reject an oversized
    /// amount uses [`Money::checked_multiply_quantity`].
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Money {
        Money(self.0.saturating_mul(qty))
    }

    /// `None` when `self × qty` does not fit in `i64` cents.
    ///
    /// ```rust
    /// use till_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(150).checked_multiply_quantity(3), Some(Money::from_cents(450)));
    /// assert_eq!(Money::from_cents(i64::MAX / 2 + 1).checked_multiply_quantity(2), None);
    /// ```
    #[inline]
    pub const fn checked_multiply_quantity(&self, qty: i64) -> Option<Money> {
        match self.0.checked_mul(qty) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    #[inline]
    pub const fn checked_add(self, rhs: Money) -> Option<Money> {
        match self.0.checked_add(rhs.0) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    #[inline]
    pub const fn checked_sub(self, rhs: Money) -> Option<Money> {
        match self.0.checked_sub(rhs.0) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    #[inline]
    pub const fn saturating_add(self, rhs: Money) -> Money {
        Money(self.0.saturating_add(rhs.0))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}${}.{:02}", sign, self.dollars().abs(), self.cents_part())
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Money) {
        self.0 -= rhs.0;
    }
}

impl Mul<i64> for Money {
    type Output = Money;

    fn mul(self, rhs: i64) -> Money {
        Money(self.0 * rhs)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::zero(), Add::add)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.to_decimal())
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let amount = f64::deserialize(deserializer)?;
        Money::from_decimal(amount)
            .ok_or_else(|| de::Error::custom(format!("invalid monetary amount: {amount}")))
    }
}

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate in basis points (1 bps = 0.01%).
///
/// Valid rates are fractions in `[0, 1)`, i.e. `0..10000` bps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Exclusive upper bound in basis points (100%).
    pub const MAX_BPS: u32 = 10_000;

    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Converts a fraction (`0.0825` = 8.25%) to basis points.
    ///
    /// Returns `None` outside `[0, 1)`.
    pub fn from_fraction(fraction: f64) -> Option<Self> {
        if !fraction.is_finite() || !(0.0..1.0).contains(&fraction) {
            return None;
        }
        let bps = (fraction * Self::MAX_BPS as f64).round() as u32;
        (bps < Self::MAX_BPS).then_some(TaxRate(bps))
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// The rate as a fraction (wire/display only).
    #[inline]
    pub fn fraction(&self) -> f64 {
        self.0 as f64 / Self::MAX_BPS as f64
    }

    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for TaxRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}

impl Serialize for TaxRate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.fraction())
    }
}

impl<'de> Deserialize<'de> for TaxRate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let fraction = f64::deserialize(deserializer)?;
        TaxRate::from_fraction(fraction).ok_or_else(|| {
            de::Error::custom(format!("tax rate must be a fraction in [0, 1), got {fraction}"))
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cents() {
        let money = Money::from_cents(1099);
        assert_eq!(money.cents(), 1099);
        assert_eq!(money.dollars(), 10);
        assert_eq!(money.cents_part(), 99);
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(1099).to_string(), "$10.99");
        assert_eq!(Money::from_cents(500).to_string(), "$5.00");
        assert_eq!(Money::from_cents(-550).to_string(), "-$5.50");
        assert_eq!(Money::from_cents(-50).to_string(), "-$0.50");
        assert_eq!(Money::zero().to_string(), "$0.00");
    }

    #[test]
    fn test_arithmetic_and_sum() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);

        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        assert_eq!((a * 3).cents(), 3000);

        let total: Money = [a, b, b].into_iter().sum();
        assert_eq!(total.cents(), 2000);
    }

    #[test]
    fn test_checked_arithmetic_at_i64_bounds() {
        // the largest price the deserializer accepts
        let huge: Money = serde_json::from_str("90000000000000000").unwrap();

        assert_eq!(huge.checked_multiply_quantity(1), Some(huge));
        assert_eq!(huge.checked_multiply_quantity(2), None);
        assert_eq!(huge.multiply_quantity(2), Money::from_cents(i64::MAX));

        assert_eq!(huge.checked_add(huge), None);
        assert_eq!(huge.saturating_add(huge), Money::from_cents(i64::MAX));
        assert_eq!(Money::from_cents(i64::MIN).checked_sub(Money::from_cents(1)), None);
        assert_eq!(
            Money::from_cents(1000).checked_sub(Money::from_cents(250)),
            Some(Money::from_cents(750))
        );
    }

    #[test]
    fn test_tax_calculation_with_rounding() {
        let amount = Money::from_cents(1000);
        assert_eq!(amount.calculate_tax(TaxRate::from_bps(1000)).cents(), 100);
        assert_eq!(amount.calculate_tax(TaxRate::from_bps(825)).cents(), 83);
        assert_eq!(amount.calculate_tax(TaxRate::zero()).cents(), 0);
    }

    #[test]
    fn test_decimal_conversion_rounds_to_cent() {
        assert_eq!(Money::from_decimal(10.99).map(|m| m.cents()), Some(1099));
        assert_eq!(Money::from_decimal(0.005).map(|m| m.cents()), Some(1));
        assert_eq!(Money::from_decimal(-5.5).map(|m| m.cents()), Some(-550));
        assert!(Money::from_decimal(f64::NAN).is_none());
        assert!(Money::from_decimal(f64::INFINITY).is_none());
        assert!(Money::from_decimal(1e300).is_none());
    }

    #[test]
    fn test_money_wire_format() {
        assert_eq!(serde_json::to_string(&Money::from_cents(2750)).unwrap(), "27.5");
        assert_eq!(serde_json::to_string(&Money::from_cents(1000)).unwrap(), "10.0");

        let parsed: Money = serde_json::from_str("10").unwrap();
        assert_eq!(parsed.cents(), 1000);
        let parsed: Money = serde_json::from_str("0.1").unwrap();
        assert_eq!(parsed.cents(), 10);

        assert!(serde_json::from_str::<Money>("\"ten\"").is_err());
    }

    #[test]
    fn test_tax_rate_fraction() {
        assert_eq!(TaxRate::from_fraction(0.1).map(|r| r.bps()), Some(1000));
        assert_eq!(TaxRate::from_fraction(0.0825).map(|r| r.bps()), Some(825));
        assert_eq!(TaxRate::from_fraction(0.0).map(|r| r.bps()), Some(0));
        assert!(TaxRate::from_fraction(1.0).is_none());
        assert!(TaxRate::from_fraction(-0.1).is_none());
        assert!(TaxRate::from_fraction(0.99999).is_none()); // rounds to 100%
    }

    #[test]
    fn test_tax_rate_wire_format() {
        let rate: TaxRate = serde_json::from_str("0.08").unwrap();
        assert_eq!(rate.bps(), 800);
        assert_eq!(serde_json::to_string(&rate).unwrap(), "0.08");
        assert!(serde_json::from_str::<TaxRate>("1.5").is_err());
        assert_eq!(TaxRate::from_bps(825).to_string(), "8.25%");
    }
}
