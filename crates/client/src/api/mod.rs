//! Storefront REST API access.
//!
//! # Architecture
//!
//! - [`StoreApi`] is the only seam between the stores and the network; the
//!   stores never see HTTP types
//! - [`HttpApi`] implements it over `reqwest` against the JSON API
//! - Wire shapes live in `wire` and are converted to domain types at the
//!   boundary, so field-name variants never leak past this module
//!
//! # Endpoints
//!
//! | Operation      | Request                       |
//! |----------------|-------------------------------|
//! | login          | `POST /iniciar-sesion`        |
//! | register       | `POST /registrar`             |
//! | fetch cart     | `GET /carrito`                |
//! | upsert line    | `POST /carrito`               |
//! | delete line    | `DELETE /carrito/{producto}`  |
//! | clear cart     | `POST /carrito/cancelar`      |
//! | finalize       | `POST /carrito/finalizar`     |
//! | list orders    | `GET /compras`                |
//! | get order      | `GET /compras/{id}`           |

mod http;
mod wire;

pub use http::HttpApi;

use async_trait::async_trait;
use secrecy::SecretString;
use thiserror::Error;

use cartsync_core::{
    CartLine, Email, FinalizedOrder, Money, OrderId, OrderSummary, PaymentReference, ProductId,
    Quantity, ShippingAddress, UserId,
};

use crate::models::{AccessToken, Identity};

/// Errors that can occur when talking to the storefront API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server rejected the credentials or the bearer token (401/403).
    #[error("Unauthorized")]
    Unauthorized,

    /// The addressed resource does not exist (404).
    #[error("Not found: {0}")]
    NotFound(String),

    /// Any other non-success status, with the server's `detail` message.
    #[error("Rejected ({status}): {detail}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Human-readable reason supplied by the server.
        detail: String,
    },

    /// HTTP request failed before a response arrived.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The response body did not have the expected shape.
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// An endpoint URL could not be built from the base URL.
    #[error("Invalid endpoint URL: {0}")]
    Url(#[from] url::ParseError),
}

impl ApiError {
    /// The server-supplied message, if the server answered at all.
    #[must_use]
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::NotFound(detail) | Self::Rejected { detail, .. } => Some(detail),
            _ => None,
        }
    }

    /// HTTP status of a rejection, if the server answered with one.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized => Some(401),
            Self::NotFound(_) => Some(404),
            Self::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the failure happened below the application protocol
    /// (connection, timeout, undecodable body).
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Decode(_) | Self::Url(_))
    }
}

/// What a successful login returns.
#[derive(Debug, Clone)]
pub struct LoginGrant {
    /// Bearer token for subsequent calls.
    pub access_token: AccessToken,
    /// Account ID, when the server sends it on its own.
    pub user_id: Option<UserId>,
    /// Full identity, when the server sends a `user` object.
    pub user: Option<Identity>,
}

/// Input for account creation.
#[derive(Debug, Clone)]
pub struct Registration {
    /// Display name.
    pub name: String,
    /// Login email.
    pub email: Email,
    /// Chosen password.
    pub secret: SecretString,
}

/// What a successful finalize returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinalizeReceipt {
    /// Server-assigned order number.
    pub order_id: OrderId,
    /// Authoritative total charged.
    pub total: Money,
}

/// The storefront API as the stores see it.
///
/// Every authenticated call takes the token explicitly; callers pass the
/// snapshot they read at the start of the operation.
#[async_trait]
pub trait StoreApi: Send + Sync {
    /// Exchange credentials for a token.
    async fn login(&self, email: &Email, secret: &SecretString) -> Result<LoginGrant, ApiError>;

    /// Create an account. Does not log in.
    async fn register(&self, registration: &Registration) -> Result<(), ApiError>;

    /// The authoritative cart lines, in server order.
    async fn fetch_cart(&self, token: &AccessToken) -> Result<Vec<CartLine>, ApiError>;

    /// Add `quantity` units of a product (the server merges into an
    /// existing line).
    async fn upsert_line(
        &self,
        token: &AccessToken,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<(), ApiError>;

    /// Remove a product's line entirely.
    async fn delete_line(&self, token: &AccessToken, product_id: ProductId)
    -> Result<(), ApiError>;

    /// Remove every line.
    async fn clear_cart(&self, token: &AccessToken) -> Result<(), ApiError>;

    /// Turn the server-side cart into an order.
    async fn finalize(
        &self,
        token: &AccessToken,
        address: &ShippingAddress,
        payment: &PaymentReference,
    ) -> Result<FinalizeReceipt, ApiError>;

    /// Orders placed by the token's account, in server order.
    async fn list_orders(&self, token: &AccessToken) -> Result<Vec<OrderSummary>, ApiError>;

    /// One order with its lines.
    async fn get_order(
        &self,
        token: &AccessToken,
        order_id: OrderId,
    ) -> Result<FinalizedOrder, ApiError>;
}
