//! Cart lines and the cart they make up.

use core::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::ProductId;
use super::money::{Money, MoneyError};

/// Errors that can occur when constructing a [`Quantity`].
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityError {
    /// Quantities start at one; zero or below means "no line".
    #[error("quantity must be at least 1 (got {0})")]
    NotPositive(i64),
    /// The value does not fit the API's quantity range.
    #[error("quantity {0} is too large")]
    TooLarge(i64),
}

/// A line quantity, always `>= 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u32")]
pub struct Quantity(u32);

impl Quantity {
    /// A single unit.
    pub const ONE: Self = Self(1);

    /// Create a quantity from any integer, rejecting values below one.
    ///
    /// # Errors
    ///
    /// Returns [`QuantityError::NotPositive`] for `n < 1` and
    /// [`QuantityError::TooLarge`] when `n` exceeds `u32::MAX`.
    pub fn new(n: i64) -> Result<Self, QuantityError> {
        if n < 1 {
            return Err(QuantityError::NotPositive(n));
        }
        u32::try_from(n)
            .map(Self)
            .map_err(|_| QuantityError::TooLarge(n))
    }

    /// The quantity as an unsigned integer.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// `self - other` when `self` is the larger quantity.
    #[must_use]
    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).filter(|n| *n > 0).map(Self)
    }
}

impl TryFrom<i64> for Quantity {
    type Error = QuantityError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quantity> for u32 {
    fn from(q: Quantity) -> Self {
        q.0
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One product and its quantity in a cart, as confirmed by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// Product in this line. Appears at most once per cart.
    pub product_id: ProductId,
    /// Product name for display.
    pub display_name: String,
    /// Price of one unit.
    pub unit_price: Money,
    /// Units in the cart.
    pub quantity: Quantity,
    /// Product image URL or path, when the server sends one.
    pub image_ref: Option<String>,
}

impl CartLine {
    /// `unit_price × quantity`.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Overflow`] if the product is out of range.
    pub fn line_total(&self) -> Result<Money, MoneyError> {
        self.unit_price
            .checked_times(Decimal::from(self.quantity.get()))
    }
}

/// An ordered sequence of cart lines scoped to one session.
///
/// A cart is never persisted locally: it is always rebuilt from the
/// server's answer, so there is no way to mutate lines in place.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    /// An empty cart.
    #[must_use]
    pub const fn empty() -> Self {
        Self { lines: Vec::new() }
    }

    /// Build a cart from server lines.
    ///
    /// If the server repeats a product, the repeats are merged into the
    /// first occurrence so the one-line-per-product rule holds.
    #[must_use]
    pub fn from_lines(lines: impl IntoIterator<Item = CartLine>) -> Self {
        let mut merged: Vec<CartLine> = Vec::new();
        for line in lines {
            if let Some(existing) = merged
                .iter_mut()
                .find(|l| l.product_id == line.product_id)
            {
                let combined = existing.quantity.get().saturating_add(line.quantity.get());
                existing.quantity = Quantity(combined);
            } else {
                merged.push(line);
            }
        }
        Self { lines: merged }
    }

    /// The lines, in server order.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Find the line for a product.
    #[must_use]
    pub fn line(&self, product_id: ProductId) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.product_id == product_id)
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.lines.iter().map(|l| u64::from(l.quantity.get())).sum()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn line(id: i64, price: u32, qty: i64) -> CartLine {
        CartLine {
            product_id: ProductId::new(id),
            display_name: format!("Producto {id}"),
            unit_price: Money::from_units(price),
            quantity: Quantity::new(qty).unwrap(),
            image_ref: None,
        }
    }

    #[test]
    fn test_quantity_must_be_positive() {
        assert_eq!(Quantity::new(0), Err(QuantityError::NotPositive(0)));
        assert_eq!(Quantity::new(-3), Err(QuantityError::NotPositive(-3)));
        assert_eq!(Quantity::new(2).unwrap().get(), 2);
        assert!(matches!(
            Quantity::new(i64::from(u32::MAX) + 1),
            Err(QuantityError::TooLarge(_))
        ));
    }

    #[test]
    fn test_quantity_checked_sub() {
        let five = Quantity::new(5).unwrap();
        let two = Quantity::new(2).unwrap();
        assert_eq!(five.checked_sub(two), Some(Quantity::new(3).unwrap()));
        assert_eq!(two.checked_sub(five), None);
        assert_eq!(two.checked_sub(two), None);
    }

    #[test]
    fn test_line_total() {
        assert_eq!(line(1, 100, 2).line_total(), Ok(Money::from_units(200)));
    }

    #[test]
    fn test_from_lines_merges_repeated_products() {
        let cart = Cart::from_lines([line(1, 100, 2), line(2, 10, 1), line(1, 100, 3)]);
        assert_eq!(cart.lines().len(), 2);
        assert_eq!(cart.line(ProductId::new(1)).unwrap().quantity.get(), 5);
        assert_eq!(cart.item_count(), 6);
    }

    #[test]
    fn test_empty_cart() {
        let cart = Cart::empty();
        assert!(cart.is_empty());
        assert_eq!(cart.item_count(), 0);
        assert!(cart.line(ProductId::new(1)).is_none());
    }
}
