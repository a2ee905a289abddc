//! Session error types.

use thiserror::Error;

use crate::api::ApiError;
use crate::storage::StorageError;

/// Errors that can occur during login, registration, or logout.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The server rejected the email/password pair.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// An account with this email already exists.
    #[error("an account with this email already exists")]
    DuplicateAccount,

    /// A field was missing or malformed, locally or per the server.
    #[error("{0}")]
    Validation(String),

    /// Durable storage failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Transport or unexpected server failure.
    #[error("api error: {0}")]
    Api(#[from] ApiError),
}

impl From<cartsync_core::EmailError> for SessionError {
    fn from(err: cartsync_core::EmailError) -> Self {
        Self::Validation(err.to_string())
    }
}
