//! Non-negative monetary amounts using decimal arithmetic.
//!
//! The storefront deals in a single currency, so [`Money`] carries only an
//! amount. Arithmetic is exact (`rust_decimal`); rounding happens only where a
//! rule asks for it (the tax estimate) and always to two decimal places.

use core::fmt;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Errors that can occur when constructing [`Money`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MoneyError {
    /// The amount is below zero.
    #[error("amount cannot be negative (got {0})")]
    Negative(Decimal),

    /// The result does not fit in a decimal amount.
    #[error("amount out of range")]
    Overflow,
}

/// A non-negative amount of money in the store's currency.
///
/// ```
/// use cartsync_core::Money;
/// use rust_decimal::Decimal;
///
/// let price = Money::new(Decimal::new(1999, 2)).unwrap();
/// assert_eq!(price.to_string(), "$19.99");
/// assert!(Money::new(Decimal::NEGATIVE_ONE).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

impl Money {
    /// Zero.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create an amount, rejecting negative values.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Negative`] if `amount < 0`.
    pub fn new(amount: Decimal) -> Result<Self, MoneyError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(MoneyError::Negative(amount));
        }
        Ok(Self(amount))
    }

    /// Create an amount from whole currency units.
    #[must_use]
    pub fn from_units(units: u32) -> Self {
        Self(Decimal::from(units))
    }

    /// Create an amount from cents (e.g. `from_cents(29200)` is 292.00).
    #[must_use]
    pub fn from_cents(cents: u32) -> Self {
        Self(Decimal::new(i64::from(cents), 2))
    }

    /// The underlying decimal amount.
    #[must_use]
    pub const fn amount(self) -> Decimal {
        self.0
    }

    /// Whether the amount is exactly zero.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    /// Multiply by a non-negative decimal factor (a rate or a quantity).
    ///
    /// Negative factors clamp to zero so the result stays a valid amount.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Overflow`] if the product is out of range.
    pub fn checked_times(self, factor: Decimal) -> Result<Self, MoneyError> {
        self.0
            .checked_mul(factor)
            .map(|product| Self(product.max(Decimal::ZERO)))
            .ok_or(MoneyError::Overflow)
    }

    /// `self + other`.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Overflow`] if the sum is out of range.
    pub fn checked_add(self, other: Self) -> Result<Self, MoneyError> {
        self.0
            .checked_add(other.0)
            .map(Self)
            .ok_or(MoneyError::Overflow)
    }

    /// Sum a sequence of amounts.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Overflow`] if the running sum goes out of range.
    pub fn checked_sum(amounts: impl IntoIterator<Item = Self>) -> Result<Self, MoneyError> {
        amounts
            .into_iter()
            .try_fold(Self::ZERO, Self::checked_add)
    }

    /// Round to cents, midpoint away from zero.
    #[must_use]
    pub fn round_cents(self) -> Self {
        Self(
            self.0
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
        )
    }

    /// Signed difference `self - other`, for showing estimate drift.
    #[must_use]
    pub fn difference(self, other: Self) -> Decimal {
        self.0 - other.0
    }
}

impl TryFrom<Decimal> for Money {
    type Error = MoneyError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Self {
        money.0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${:.2}", self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_negative() {
        assert_eq!(
            Money::new(Decimal::new(-1, 2)),
            Err(MoneyError::Negative(Decimal::new(-1, 2)))
        );
        assert!(Money::new(Decimal::ZERO).is_ok());
    }

    #[test]
    fn test_round_cents_midpoint_away_from_zero() {
        let m = Money::new(Decimal::new(10_005, 3)).unwrap(); // 10.005
        assert_eq!(m.round_cents().amount(), Decimal::new(1001, 2));
    }

    #[test]
    fn test_sum_and_display() {
        let total = Money::checked_sum([Money::from_units(100), Money::from_cents(4200)]).unwrap();
        assert_eq!(total.to_string(), "$142.00");
    }

    #[test]
    fn test_arithmetic_overflow_is_an_error() {
        let huge = Money::new(Decimal::MAX).unwrap();
        assert_eq!(huge.checked_add(Money::from_units(1)), Err(MoneyError::Overflow));
        assert_eq!(huge.checked_times(Decimal::TWO), Err(MoneyError::Overflow));
        assert_eq!(
            Money::checked_sum([huge, huge]),
            Err(MoneyError::Overflow)
        );
        assert_eq!(
            Money::from_units(3).checked_times(Decimal::NEGATIVE_ONE),
            Ok(Money::ZERO)
        );
    }

    #[test]
    fn test_deserialize_from_json_number() {
        let m: Money = serde_json::from_str("292.5").unwrap();
        assert_eq!(m, Money::from_cents(29250));
        assert!(serde_json::from_str::<Money>("-3").is_err());
    }
}
