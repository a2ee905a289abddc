//! The storefront context shared by every view.

use std::sync::Arc;

use secrecy::SecretString;
use tracing::warn;

use cartsync_core::TotalsPolicy;

use crate::api::{ApiError, HttpApi, StoreApi};
use crate::config::ClientConfig;
use crate::models::Session;
use crate::services::{
    CartStore, CheckoutOrchestrator, HistoryReader, SessionError, SessionStore,
};
use crate::storage::{FileStorage, LocalStorage};

/// Every store, constructed once and handed out by reference.
///
/// This struct is cheaply cloneable via `Arc`; clones share the same stores.
#[derive(Clone)]
pub struct Storefront {
    inner: Arc<StorefrontInner>,
}

struct StorefrontInner {
    session: Arc<SessionStore>,
    cart: Arc<CartStore>,
    checkout: CheckoutOrchestrator,
    history: HistoryReader,
}

impl Storefront {
    /// Wire the stores over an API and a storage backend, restoring any
    /// persisted session.
    #[must_use]
    pub fn new(api: Arc<dyn StoreApi>, storage: Arc<dyn LocalStorage>) -> Self {
        Self::with_policy(api, storage, TotalsPolicy::default())
    }

    /// Same as [`Self::new`] with a custom totals policy.
    #[must_use]
    pub fn with_policy(
        api: Arc<dyn StoreApi>,
        storage: Arc<dyn LocalStorage>,
        policy: TotalsPolicy,
    ) -> Self {
        let session = Arc::new(SessionStore::restore(Arc::clone(&api), storage));
        let cart = Arc::new(CartStore::new(
            Arc::clone(&session),
            Arc::clone(&api),
            policy,
        ));
        let checkout =
            CheckoutOrchestrator::new(Arc::clone(&session), Arc::clone(&cart), Arc::clone(&api));
        let history = HistoryReader::new(Arc::clone(&session), api);

        Self {
            inner: Arc::new(StorefrontInner {
                session,
                cart,
                checkout,
                history,
            }),
        }
    }

    /// Build the HTTP client and file storage described by `config`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Http` if the HTTP client cannot be built.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ApiError> {
        let api = Arc::new(HttpApi::new(config)?);
        let storage = Arc::new(FileStorage::new(config.state_dir.clone()));
        Ok(Self::new(api, storage))
    }

    /// Get a reference to the session store.
    #[must_use]
    pub fn session(&self) -> &SessionStore {
        &self.inner.session
    }

    /// Get a reference to the cart store.
    #[must_use]
    pub fn cart(&self) -> &CartStore {
        &self.inner.cart
    }

    /// Get a reference to the checkout orchestrator.
    #[must_use]
    pub fn checkout(&self) -> &CheckoutOrchestrator {
        &self.inner.checkout
    }

    /// Get a reference to the purchase history reader.
    #[must_use]
    pub fn history(&self) -> &HistoryReader {
        &self.inner.history
    }

    /// Log in, then load the account's cart.
    ///
    /// A failed cart load does not undo the login; the cart view shows it
    /// empty until the next reload.
    ///
    /// # Errors
    ///
    /// Same as [`SessionStore::authenticate`].
    pub async fn login(&self, email: &str, secret: &SecretString) -> Result<Session, SessionError> {
        let session = self.session().authenticate(email, secret).await?;
        if let Err(e) = self.cart().reload().await {
            warn!(error = %e, "Cart load after login failed");
        }
        Ok(session)
    }

    /// End the session. The cart empties through the session-end hook.
    pub fn logout(&self) {
        self.session().end_session();
        self.checkout().reset();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use cartsync_core::{ProductId, Quantity};

    use super::*;
    use crate::storage::MemoryStorage;
    use crate::test_support::FakeApi;

    #[tokio::test]
    async fn test_login_loads_cart_and_logout_clears_it() {
        let api = Arc::new(FakeApi::seeded());
        api.seed_cart(&[(1, 1)]);
        let storefront = Storefront::new(api.clone(), Arc::new(MemoryStorage::new()));

        storefront
            .login("ana@example.com", &SecretString::from("secret".to_string()))
            .await
            .unwrap();
        assert_eq!(storefront.cart().cart().item_count(), 1);

        storefront.logout();
        assert!(storefront.cart().cart().is_empty());
        assert!(!storefront.session().is_authenticated());
    }

    #[tokio::test]
    async fn test_clones_share_stores() {
        let api = Arc::new(FakeApi::seeded());
        let storefront = Storefront::new(api.clone(), Arc::new(MemoryStorage::new()));
        let view = storefront.clone();

        storefront
            .login("ana@example.com", &SecretString::from("secret".to_string()))
            .await
            .unwrap();
        view.cart()
            .add_line(ProductId::new(2), Quantity::ONE)
            .await
            .unwrap();

        assert!(view.session().is_authenticated());
        assert_eq!(storefront.cart().cart().item_count(), 1);
    }

    #[tokio::test]
    async fn test_restored_session_reaches_every_store() {
        let api = Arc::new(FakeApi::seeded());
        let storage = Arc::new(MemoryStorage::new());
        Storefront::new(api.clone(), storage.clone())
            .login("ana@example.com", &SecretString::from("secret".to_string()))
            .await
            .unwrap();

        let restarted = Storefront::new(api.clone(), storage);
        restarted.cart().reload().await.unwrap();

        assert!(restarted.session().is_authenticated());
        assert_eq!(api.call_count("fetch_cart"), 2);
    }
}
