//! Purchase history reader.
//!
//! Read-only view of the orders the server has recorded for the current
//! account. Nothing is cached: every call reflects the server at that moment.

use std::sync::Arc;

use thiserror::Error;
use tracing::instrument;

use cartsync_core::{FinalizedOrder, OrderId, OrderSummary};

use crate::api::{ApiError, StoreApi};
use crate::models::AccessToken;
use crate::services::session::SessionStore;

/// Errors that can occur when reading the purchase history.
#[derive(Debug, Error)]
pub enum HistoryError {
    /// No one is logged in; nothing was sent.
    #[error("you must log in to see your orders")]
    Unauthorized,

    /// The server rejected the token; the session has been ended.
    #[error("your session has expired, please log in again")]
    SessionExpired,

    /// The order does not exist or belongs to another account.
    #[error("order {0} not found")]
    NotFound(OrderId),

    /// Transport or unexpected server failure.
    #[error("api error: {0}")]
    Api(#[from] ApiError),
}

/// Reads finalized orders for the current session.
pub struct HistoryReader {
    session: Arc<SessionStore>,
    api: Arc<dyn StoreApi>,
}

impl HistoryReader {
    /// Create a reader bound to `session`.
    #[must_use]
    pub fn new(session: Arc<SessionStore>, api: Arc<dyn StoreApi>) -> Self {
        Self { session, api }
    }

    /// Summaries of every order, in the order the server returns them.
    ///
    /// # Errors
    ///
    /// Returns `HistoryError::Unauthorized` without a session.
    #[instrument(skip(self))]
    pub async fn list_orders(&self) -> Result<Vec<OrderSummary>, HistoryError> {
        let token = self.token()?;
        self.api
            .list_orders(&token)
            .await
            .map_err(|e| self.map_error(&token, e, None))
    }

    /// One order with its lines.
    ///
    /// # Errors
    ///
    /// Returns `HistoryError::Unauthorized` without a session and
    /// `HistoryError::NotFound` if the order is not the account's.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_order(&self, order_id: OrderId) -> Result<FinalizedOrder, HistoryError> {
        let token = self.token()?;
        self.api
            .get_order(&token, order_id)
            .await
            .map_err(|e| self.map_error(&token, e, Some(order_id)))
    }

    fn token(&self) -> Result<AccessToken, HistoryError> {
        self.session.token().ok_or(HistoryError::Unauthorized)
    }

    fn map_error(&self, token: &AccessToken, err: ApiError, order_id: Option<OrderId>) -> HistoryError {
        if self.session.expire_if_unauthorized(token, &err) {
            return HistoryError::SessionExpired;
        }
        match (err, order_id) {
            (ApiError::NotFound(_), Some(id)) => HistoryError::NotFound(id),
            (other, _) => HistoryError::Api(other),
        }
    }
}
