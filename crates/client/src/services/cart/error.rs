//! Cart error types.

use thiserror::Error;

use cartsync_core::{MoneyError, ProductId, QuantityError};

use crate::api::ApiError;

/// Errors that can occur during cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// No one is logged in.
    #[error("you must log in to use the cart")]
    NotAuthenticated,

    /// The server rejected the token; the session has been ended.
    #[error("your session has expired, please log in again")]
    SessionExpired,

    /// The server refused the quantity for lack of stock.
    #[error("{0}")]
    InsufficientStock(String),

    /// The product has no line in the cart (already removed elsewhere).
    #[error("product {0} is not in the cart")]
    LineNotFound(ProductId),

    /// The product does not exist in the catalog.
    #[error("product {0} does not exist")]
    ProductNotFound(ProductId),

    /// The requested quantity is out of range.
    #[error(transparent)]
    InvalidQuantity(#[from] QuantityError),

    /// The server cart holds amounts too large to total.
    #[error("cart totals out of range: {0}")]
    Totals(#[from] MoneyError),

    /// Transport or unexpected server failure.
    #[error("api error: {0}")]
    Api(#[from] ApiError),
}

impl CartError {
    /// Whether the requested end state already holds despite the error
    /// (removing a line that is already gone).
    #[must_use]
    pub const fn is_already_satisfied(&self) -> bool {
        matches!(self, Self::LineNotFound(_))
    }
}
