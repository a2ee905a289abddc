//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type for front ends. Every store error
//! converts into it; [`AppError::kind`] places it in the user-facing
//! taxonomy and [`AppError::user_message`] gives text safe to show.

use thiserror::Error;

use cartsync_core::CheckoutValidationError;

use crate::api::ApiError;
use crate::config::ConfigError;
use crate::models::Identity;
use crate::services::{CartError, CheckoutError, HistoryError, SessionError};
use crate::storage::StorageError;

/// Application-level error type for cartsync front ends.
#[derive(Debug, Error)]
pub enum AppError {
    /// Login, registration or logout failed.
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// A cart operation failed.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Checkout failed.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Reading the purchase history failed.
    #[error("History error: {0}")]
    History(#[from] HistoryError),

    /// Direct API failure outside any store.
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Local storage failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Where an error falls in the user-facing taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad credentials or no session; shown on the login form.
    Authentication,
    /// The server rejected the token; the user has been logged out.
    SessionExpired,
    /// Not enough stock; shown next to the offending line.
    Stock,
    /// Missing or malformed input; nothing was sent.
    Validation,
    /// Line or order absent.
    NotFound,
    /// The server refused the action for another business reason.
    Rejected,
    /// The server could not be reached or answered garbage.
    Network,
    /// Local misconfiguration or storage failure.
    Internal,
}

impl AppError {
    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Session(err) => match err {
                SessionError::InvalidCredentials => ErrorKind::Authentication,
                SessionError::DuplicateAccount | SessionError::Validation(_) => {
                    ErrorKind::Validation
                }
                SessionError::Storage(_) => ErrorKind::Internal,
                SessionError::Api(api) => api_kind(api),
            },
            Self::Cart(err) => match err {
                CartError::NotAuthenticated => ErrorKind::Authentication,
                CartError::SessionExpired => ErrorKind::SessionExpired,
                CartError::InsufficientStock(_) => ErrorKind::Stock,
                CartError::LineNotFound(_) | CartError::ProductNotFound(_) => ErrorKind::NotFound,
                CartError::InvalidQuantity(_) => ErrorKind::Validation,
                // The server sent amounts no cart can hold
                CartError::Totals(_) => ErrorKind::Network,
                CartError::Api(api) => api_kind(api),
            },
            Self::Checkout(err) => match err {
                CheckoutError::Validation(CheckoutValidationError::NoSession) => {
                    ErrorKind::Authentication
                }
                CheckoutError::Validation(_) | CheckoutError::InProgress => ErrorKind::Validation,
                CheckoutError::SessionExpired => ErrorKind::SessionExpired,
                CheckoutError::Rejected(_) => ErrorKind::Rejected,
                CheckoutError::Api(api) => api_kind(api),
            },
            Self::History(err) => match err {
                HistoryError::Unauthorized => ErrorKind::Authentication,
                HistoryError::SessionExpired => ErrorKind::SessionExpired,
                HistoryError::NotFound(_) => ErrorKind::NotFound,
                HistoryError::Api(api) => api_kind(api),
            },
            Self::Api(api) => api_kind(api),
            Self::Config(_) | Self::Storage(_) => ErrorKind::Internal,
        }
    }

    /// Text to show the user. Never contains transport internals.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self.kind() {
            ErrorKind::Network => {
                "Could not reach the store. Check your connection and try again.".to_string()
            }
            ErrorKind::Internal => match self {
                Self::Config(err) => err.to_string(),
                _ => "Something went wrong on this device.".to_string(),
            },
            _ => match self {
                Self::Session(SessionError::Api(api))
                | Self::Cart(CartError::Api(api))
                | Self::Checkout(CheckoutError::Api(api))
                | Self::History(HistoryError::Api(api))
                | Self::Api(api) => api
                    .detail()
                    .map_or_else(|| "The store rejected the request.".to_string(), String::from),
                Self::Session(err) => err.to_string(),
                Self::Cart(err) => err.to_string(),
                Self::Checkout(err) => err.to_string(),
                Self::History(err) => err.to_string(),
                Self::Config(err) => err.to_string(),
                Self::Storage(err) => err.to_string(),
            },
        }
    }

    /// Log the error and, for failures the user cannot fix, send it to
    /// Sentry. Returns the Sentry event ID when one was captured.
    pub fn report(&self) -> Option<sentry::types::Uuid> {
        if matches!(self.kind(), ErrorKind::Network | ErrorKind::Internal) {
            let event_id = sentry::capture_error(self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Operation failed"
            );
            Some(event_id)
        } else {
            tracing::info!(error = %self, kind = ?self.kind(), "Operation rejected");
            None
        }
    }
}

const fn api_kind(err: &ApiError) -> ErrorKind {
    match err {
        ApiError::Unauthorized => ErrorKind::SessionExpired,
        ApiError::NotFound(_) => ErrorKind::NotFound,
        ApiError::Rejected { .. } => ErrorKind::Rejected,
        ApiError::Http(_) | ApiError::Decode(_) | ApiError::Url(_) => ErrorKind::Network,
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from the logged-in identity.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(identity: &Identity) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: identity.id.map(|id| id.to_string()),
            email: Some(identity.email.to_string()),
            username: Some(identity.display_name.clone()),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added to cart", Some(&[("product_id", "123")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use cartsync_core::{OrderId, ProductId};

    use super::*;

    #[test]
    fn test_app_error_display() {
        let err = AppError::Cart(CartError::InsufficientStock(
            "No hay stock suficiente".to_string(),
        ));
        assert_eq!(err.to_string(), "Cart error: No hay stock suficiente");

        let err = AppError::History(HistoryError::NotFound(OrderId::new(3)));
        assert_eq!(err.to_string(), "History error: order 3 not found");
    }

    #[test]
    fn test_app_error_kinds() {
        assert_eq!(
            AppError::from(SessionError::InvalidCredentials).kind(),
            ErrorKind::Authentication
        );
        assert_eq!(
            AppError::from(CartError::SessionExpired).kind(),
            ErrorKind::SessionExpired
        );
        assert_eq!(
            AppError::from(CartError::InsufficientStock(String::new())).kind(),
            ErrorKind::Stock
        );
        assert_eq!(
            AppError::from(CheckoutError::Validation(CheckoutValidationError::EmptyCart)).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            AppError::from(CartError::LineNotFound(ProductId::new(1))).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            AppError::from(HistoryError::Unauthorized).kind(),
            ErrorKind::Authentication
        );
        let decode = serde_json::from_str::<u8>("x").unwrap_err();
        assert_eq!(
            AppError::from(CartError::Api(ApiError::Decode(decode))).kind(),
            ErrorKind::Network
        );
    }

    #[test]
    fn test_user_message_hides_transport_details() {
        let decode = serde_json::from_str::<u8>("x").unwrap_err();
        let err = AppError::from(CheckoutError::Api(ApiError::Decode(decode)));
        assert!(!err.user_message().contains("expected"));
        assert!(err.user_message().contains("Could not reach the store"));
    }

    #[test]
    fn test_user_message_uses_server_detail() {
        let err = AppError::from(CheckoutError::Rejected(
            "Stock insuficiente para Mochila".to_string(),
        ));
        assert_eq!(err.user_message(), "Stock insuficiente para Mochila");

        let err = AppError::from(ApiError::Rejected {
            status: 500,
            detail: "Error interno".to_string(),
        });
        assert_eq!(err.user_message(), "Error interno");
    }

    #[test]
    fn test_report_without_sentry_is_noop() {
        let err = AppError::from(CartError::InsufficientStock("x".to_string()));
        assert!(err.report().is_none());
    }
}
