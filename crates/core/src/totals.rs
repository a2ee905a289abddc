//! Client-side order totals.
//!
//! Every figure here is an **estimate** shown while the cart is still
//! editable. At finalize time the server computes the authoritative total and
//! the client displays that one instead; the two are never forced to agree.
//!
//! # Rules
//!
//! - `subtotal = Σ unit_price × quantity`
//! - `tax = subtotal × 21%`, rounded to cents (zero for an empty cart)
//! - `shipping = 0` when the subtotal is zero or above the free-shipping
//!   threshold (1000), otherwise a flat 50
//! - `total = subtotal + tax + shipping`, with no further rounding
//!
//! Amounts that do not fit in a decimal are an error, never a panic.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{CartLine, Money, MoneyError};

/// The rates and thresholds behind the estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TotalsPolicy {
    /// Tax rate as a fraction (0.21 for 21%).
    pub tax_rate: Decimal,
    /// Subtotals strictly above this ship free.
    pub free_shipping_above: Money,
    /// Shipping charged below the threshold.
    pub flat_shipping: Money,
}

impl Default for TotalsPolicy {
    fn default() -> Self {
        Self {
            tax_rate: Decimal::new(21, 2),
            free_shipping_above: Money::from_units(1000),
            flat_shipping: Money::from_units(50),
        }
    }
}

impl TotalsPolicy {
    /// Compute the estimate for a set of lines under this policy.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Overflow`] if any intermediate amount is out of
    /// range.
    pub fn compute(&self, lines: &[CartLine]) -> Result<TotalsEstimate, MoneyError> {
        let subtotal = lines
            .iter()
            .map(CartLine::line_total)
            .try_fold(Money::ZERO, |sum, line| sum.checked_add(line?))?;
        self.from_subtotal(subtotal)
    }

    /// Compute the estimate for a known subtotal.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Overflow`] if the tax or total is out of range.
    pub fn from_subtotal(&self, subtotal: Money) -> Result<TotalsEstimate, MoneyError> {
        if subtotal.is_zero() {
            return Ok(TotalsEstimate::default());
        }

        let tax_estimate = subtotal.checked_times(self.tax_rate)?.round_cents();
        let shipping_estimate = if subtotal > self.free_shipping_above {
            Money::ZERO
        } else {
            self.flat_shipping
        };

        Ok(TotalsEstimate {
            subtotal,
            tax_estimate,
            shipping_estimate,
            total: subtotal
                .checked_add(tax_estimate)?
                .checked_add(shipping_estimate)?,
        })
    }
}

/// Subtotal, tax, shipping and grand total for a cart.
///
/// Always derived from lines; never stored as a source of truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TotalsEstimate {
    /// Merchandise subtotal.
    pub subtotal: Money,
    /// Estimated tax.
    pub tax_estimate: Money,
    /// Estimated shipping.
    pub shipping_estimate: Money,
    /// `subtotal + tax_estimate + shipping_estimate`.
    pub total: Money,
}

/// Compute the estimate with the storefront's standard policy.
///
/// ```
/// use cartsync_core::{CartLine, Money, ProductId, Quantity, compute_totals};
///
/// let lines = [CartLine {
///     product_id: ProductId::new(1),
///     display_name: "Mochila".into(),
///     unit_price: Money::from_units(100),
///     quantity: Quantity::new(2).unwrap(),
///     image_ref: None,
/// }];
/// let totals = compute_totals(&lines).unwrap();
/// assert_eq!(totals.total, Money::from_units(292));
/// ```
///
/// # Errors
///
/// Returns [`MoneyError::Overflow`] if any amount is out of range.
pub fn compute_totals(lines: &[CartLine]) -> Result<TotalsEstimate, MoneyError> {
    TotalsPolicy::default().compute(lines)
}
