//! Checkout error types.

use thiserror::Error;

use cartsync_core::CheckoutValidationError;

use crate::api::ApiError;

/// Errors that can occur when finalizing an order.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// A local precondition failed; nothing was sent.
    #[error(transparent)]
    Validation(#[from] CheckoutValidationError),

    /// Another submission is still being validated or submitted.
    #[error("a checkout is already in progress")]
    InProgress,

    /// The server rejected the token; the session has been ended.
    #[error("your session has expired, please log in again")]
    SessionExpired,

    /// The server refused the order (stock changed, bad field).
    #[error("{0}")]
    Rejected(String),

    /// Transport or unexpected server failure. The order may or may not
    /// exist; check the purchase history before resubmitting.
    #[error("api error: {0}")]
    Api(#[from] ApiError),
}
