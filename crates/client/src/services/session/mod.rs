//! Session store.
//!
//! Holds the current token and identity, persists them under two fixed keys
//! and restores them on start. Other stores read the token through
//! [`SessionStore::token`] and report authorization rejections back through
//! [`SessionStore::expire_if_unauthorized`]; only this store ever writes the
//! session.

mod error;

pub use error::SessionError;

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use secrecy::{ExposeSecret, SecretString};
use tracing::{info, instrument, warn};

use cartsync_core::Email;

use crate::api::{ApiError, Registration, StoreApi};
use crate::error::{add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::models::session::keys;
use crate::models::{AccessToken, Identity, Session};
use crate::storage::LocalStorage;

type EndListener = Box<dyn Fn() + Send + Sync>;

/// Current authentication state.
pub struct SessionStore {
    api: Arc<dyn StoreApi>,
    storage: Arc<dyn LocalStorage>,
    current: RwLock<Option<Session>>,
    end_listeners: Mutex<Vec<EndListener>>,
}

impl SessionStore {
    /// Create the store, restoring any persisted session.
    ///
    /// A session is restored only when both keys are present and the
    /// identity parses; a partial or corrupt pair is removed and the store
    /// starts unauthenticated.
    pub fn restore(api: Arc<dyn StoreApi>, storage: Arc<dyn LocalStorage>) -> Self {
        let current = load_persisted(storage.as_ref());
        if let Some(session) = &current {
            info!(email = %session.identity().email, "Restored persisted session");
            set_sentry_user(session.identity());
        }

        Self {
            api,
            storage,
            current: RwLock::new(current),
            end_listeners: Mutex::new(Vec::new()),
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// The current session, if any.
    #[must_use]
    pub fn current(&self) -> Option<Session> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Snapshot of the bearer token for one authenticated call.
    #[must_use]
    pub fn token(&self) -> Option<AccessToken> {
        self.current().map(|s| s.token().clone())
    }

    /// The logged-in identity.
    #[must_use]
    pub fn identity(&self) -> Option<Identity> {
        self.current().map(|s| s.identity().clone())
    }

    /// Whether someone is logged in.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    // =========================================================================
    // Login / Registration
    // =========================================================================

    /// Log in and persist the session.
    ///
    /// Replaces any existing session. A failure to persist is logged but does
    /// not fail the login; the session then lasts until the process exits.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Validation` for a malformed email or empty
    /// password (no request is sent).
    /// Returns `SessionError::InvalidCredentials` if the server rejects them.
    #[instrument(skip(self, secret))]
    pub async fn authenticate(
        &self,
        email: &str,
        secret: &SecretString,
    ) -> Result<Session, SessionError> {
        let email = Email::parse(email)?;
        if secret.expose_secret().is_empty() {
            return Err(SessionError::Validation("password is required".to_string()));
        }

        let grant = self
            .api
            .login(&email, secret)
            .await
            .map_err(|e| match e {
                ApiError::Unauthorized => SessionError::InvalidCredentials,
                ApiError::Rejected { status: 400 | 422, detail } => {
                    SessionError::Validation(detail)
                }
                other => SessionError::Api(other),
            })?;

        let identity = grant
            .user
            .unwrap_or_else(|| Identity::from_email(grant.user_id, email));
        let session = Session::new(grant.access_token, identity);

        if let Err(e) = persist(self.storage.as_ref(), &session) {
            warn!(error = %e, "Failed to persist session; it will not survive a restart");
        }

        let previous = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(session.clone());
        if previous.is_some() {
            self.notify_end();
        }

        set_sentry_user(session.identity());
        add_breadcrumb("session", "Logged in", None);
        info!(email = %session.identity().email, "Authenticated");

        Ok(session)
    }

    /// Create an account.
    ///
    /// Never logs in: the current session (if any) is left untouched and the
    /// new account must authenticate explicitly.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Validation` for a blank name, malformed email or
    /// empty password (no request is sent), or when the server rejects a field.
    /// Returns `SessionError::DuplicateAccount` if the email is taken.
    #[instrument(skip(self, secret))]
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        secret: &SecretString,
    ) -> Result<(), SessionError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SessionError::Validation("name is required".to_string()));
        }
        let email = Email::parse(email)?;
        if secret.expose_secret().is_empty() {
            return Err(SessionError::Validation("password is required".to_string()));
        }

        let registration = Registration {
            name: name.to_string(),
            email,
            secret: secret.clone(),
        };
        self.api
            .register(&registration)
            .await
            .map_err(map_register_error)?;

        add_breadcrumb("session", "Registered account", None);
        info!(email = %registration.email, "Registered account");
        Ok(())
    }

    // =========================================================================
    // Logout / Expiry
    // =========================================================================

    /// Clear the session from memory and storage. Never fails, never calls
    /// the network.
    pub fn end_session(&self) {
        let previous = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        for key in [keys::AUTH_TOKEN, keys::AUTH_USER] {
            if let Err(e) = self.storage.remove(key) {
                warn!(key, error = %e, "Failed to remove persisted session key");
            }
        }

        clear_sentry_user();
        if previous.is_some() {
            add_breadcrumb("session", "Session ended", None);
            info!("Session ended");
        }
        self.notify_end();
    }

    /// End the session if `err` is an authorization rejection of `used`.
    ///
    /// A rejection of a token that has since been replaced by a new login
    /// leaves the new session alone. Returns whether `err` was a rejection.
    pub fn expire_if_unauthorized(&self, used: &AccessToken, err: &ApiError) -> bool {
        if !matches!(err, ApiError::Unauthorized) {
            return false;
        }

        let still_current = self
            .token()
            .is_some_and(|current| current.expose() == used.expose());
        if still_current {
            warn!("Authorization rejected; ending session");
            self.end_session();
        }
        true
    }

    /// Run `listener` every time a session ends (logout, expiry, or
    /// replacement by another login).
    pub fn on_session_end(&self, listener: impl Fn() + Send + Sync + 'static) {
        self.end_listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(listener));
    }

    fn notify_end(&self) {
        let listeners = self
            .end_listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for listener in listeners.iter() {
            listener();
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn load_persisted(storage: &dyn LocalStorage) -> Option<Session> {
    let token = storage.get(keys::AUTH_TOKEN);
    let user = storage.get(keys::AUTH_USER);

    let (token, user) = match (token, user) {
        (Ok(token), Ok(user)) => (token, user),
        (Err(e), _) | (_, Err(e)) => {
            warn!(error = %e, "Failed to read persisted session; starting logged out");
            return None;
        }
    };

    match (token, user) {
        (None, None) => None,
        (Some(token), Some(user)) if !token.trim().is_empty() => {
            match serde_json::from_str::<Identity>(&user) {
                Ok(identity) => Some(Session::new(AccessToken::new(token.trim()), identity)),
                Err(e) => {
                    warn!(error = %e, "Persisted identity is invalid; discarding session");
                    discard(storage);
                    None
                }
            }
        }
        _ => {
            warn!("Persisted session is incomplete; discarding it");
            discard(storage);
            None
        }
    }
}

fn discard(storage: &dyn LocalStorage) {
    for key in [keys::AUTH_TOKEN, keys::AUTH_USER] {
        if let Err(e) = storage.remove(key) {
            warn!(key, error = %e, "Failed to remove stale session key");
        }
    }
}

fn persist(storage: &dyn LocalStorage, session: &Session) -> Result<(), SessionError> {
    let identity = serde_json::to_string(session.identity()).map_err(ApiError::from)?;
    storage.set(keys::AUTH_TOKEN, session.token().expose())?;
    storage.set(keys::AUTH_USER, &identity)?;
    Ok(())
}

fn map_register_error(err: ApiError) -> SessionError {
    match err {
        ApiError::Rejected { status: 409, .. } => SessionError::DuplicateAccount,
        ApiError::Rejected {
            status: 400 | 422,
            detail,
        } => {
            let lower = detail.to_lowercase();
            if ["registrad", "exist", "already"]
                .iter()
                .any(|needle| lower.contains(needle))
            {
                SessionError::DuplicateAccount
            } else {
                SessionError::Validation(detail)
            }
        }
        other => SessionError::Api(other),
    }
}
