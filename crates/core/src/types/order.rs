//! Finalized orders, as reported by the server's purchase history.
//!
//! Orders are created only by a successful finalize and never change
//! afterwards, so every field here is read-only data.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::cart::Quantity;
use super::id::{OrderId, ProductId};
use super::money::{Money, MoneyError};

/// One purchased line, with the unit price frozen at finalize time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    /// Product that was bought. Older history entries may not carry it.
    pub product_id: Option<ProductId>,
    /// Product name at the time of purchase.
    pub display_name: String,
    /// Unit price charged.
    pub unit_price: Money,
    /// Units bought.
    pub quantity: Quantity,
}

impl OrderLine {
    /// `unit_price × quantity`.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Overflow`] if the product is out of range.
    pub fn line_total(&self) -> Result<Money, MoneyError> {
        self.unit_price
            .checked_times(rust_decimal::Decimal::from(self.quantity.get()))
    }
}

/// A purchase the server has recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizedOrder {
    /// Server-assigned order number.
    pub id: OrderId,
    /// When the order was placed (server local time).
    pub placed_at: NaiveDateTime,
    /// Where it ships.
    pub shipping_address: String,
    /// Last four digits of the card.
    pub payment_reference: String,
    /// Purchased lines, in server order.
    pub lines: Vec<OrderLine>,
    /// Shipping charged.
    pub shipping_cost: Money,
    /// Authoritative total charged.
    pub total: Money,
}

impl FinalizedOrder {
    /// Sum of the line totals, before tax and shipping.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Overflow`] if a line or the sum is out of range.
    pub fn merchandise_subtotal(&self) -> Result<Money, MoneyError> {
        self.lines
            .iter()
            .map(OrderLine::line_total)
            .try_fold(Money::ZERO, |sum, line| sum.checked_add(line?))
    }

    /// The list-view projection of this order.
    #[must_use]
    pub fn summary(&self) -> OrderSummary {
        OrderSummary {
            id: self.id,
            placed_at: self.placed_at,
            total: self.total,
            item_count: self.lines.iter().map(|l| u64::from(l.quantity.get())).sum(),
        }
    }
}

/// What the history list shows for each order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSummary {
    /// Server-assigned order number.
    pub id: OrderId,
    /// When the order was placed.
    pub placed_at: NaiveDateTime,
    /// Authoritative total charged.
    pub total: Money,
    /// Units across all lines (zero when the server omits lines in lists).
    pub item_count: u64,
}
