//! Cart store.
//!
//! Holds the last server-confirmed cart and its totals. Every mutation is a
//! round trip followed by a reload; local lines are only ever replaced
//! wholesale by what the server returns, never edited speculatively.
//!
//! Operations are serialized: a mutation or reload finishes (or fails)
//! before the next one starts, so line lists never interleave. A checkout
//! submission takes the same turn, so no mutation lands between the cart
//! it validated and the order it finalized.

mod error;

pub use error::CartError;

use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard, watch};
use tracing::{debug, error, info, instrument, warn};

use cartsync_core::{Cart, ProductId, Quantity, TotalsEstimate, TotalsPolicy};

use crate::api::{ApiError, StoreApi};
use crate::error::add_breadcrumb;
use crate::models::AccessToken;
use crate::services::session::SessionStore;

/// What a cart view renders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CartSnapshot {
    /// Last server-confirmed cart.
    pub cart: Cart,
    /// Estimate derived from `cart`.
    pub totals: TotalsEstimate,
    /// A round trip is in flight; `cart` is the previous confirmed state.
    pub loading: bool,
}

#[derive(Debug, Clone, Copy)]
enum Mutation {
    Add(ProductId),
    Remove(ProductId),
    Clear,
}

/// Server-confirmed cart state for the current session.
pub struct CartStore {
    session: Arc<SessionStore>,
    api: Arc<dyn StoreApi>,
    policy: TotalsPolicy,
    serial: Mutex<()>,
    snapshot: Arc<watch::Sender<CartSnapshot>>,
}

impl CartStore {
    /// Create an empty store bound to `session`.
    ///
    /// The cart is emptied whenever the session ends.
    pub fn new(session: Arc<SessionStore>, api: Arc<dyn StoreApi>, policy: TotalsPolicy) -> Self {
        let (tx, _rx) = watch::channel(CartSnapshot::default());
        let snapshot = Arc::new(tx);

        let on_end = Arc::clone(&snapshot);
        session.on_session_end(move || {
            on_end.send_replace(CartSnapshot::default());
        });

        Self {
            session,
            api,
            policy,
            serial: Mutex::new(()),
            snapshot,
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> CartSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Last confirmed cart.
    #[must_use]
    pub fn cart(&self) -> Cart {
        self.snapshot.borrow().cart.clone()
    }

    /// Totals of the last confirmed cart.
    #[must_use]
    pub fn totals(&self) -> TotalsEstimate {
        self.snapshot.borrow().totals
    }

    /// Receive every new snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartSnapshot> {
        self.snapshot.subscribe()
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Replace local state with the server's cart.
    ///
    /// Without a session the cart is emptied and no request is sent.
    ///
    /// # Errors
    ///
    /// Returns `CartError::SessionExpired` if the token was rejected (the
    /// session is ended). Other failures leave the previous state in place.
    #[instrument(skip(self))]
    pub async fn reload(&self) -> Result<(), CartError> {
        let _serial = self.serial.lock().await;
        self.reload_locked().await.map(|_| ())
    }

    /// Add units of a product. The server merges into an existing line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InsufficientStock` if the server refuses the
    /// quantity and `CartError::ProductNotFound` for an unknown product; in
    /// both cases the cart is unchanged.
    #[instrument(skip(self), fields(product_id = %product_id, quantity = %quantity))]
    pub async fn add_line(&self, product_id: ProductId, quantity: Quantity) -> Result<(), CartError> {
        let _serial = self.serial.lock().await;
        let token = self.require_token()?;

        self.set_loading(true);
        if let Err(e) = self.api.upsert_line(&token, product_id, quantity).await {
            return Err(self.fail(&token, e, Mutation::Add(product_id)));
        }

        let (id, qty) = (product_id.to_string(), quantity.to_string());
        add_breadcrumb(
            "cart",
            "Added to cart",
            Some(&[("product_id", id.as_str()), ("quantity", qty.as_str())]),
        );
        self.reload_locked().await.map(|_| ())
    }

    /// Remove a product's line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::LineNotFound` if the line was already gone; the
    /// cart is reloaded first so the view reflects the server. See
    /// [`CartError::is_already_satisfied`].
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn remove_line(&self, product_id: ProductId) -> Result<(), CartError> {
        let _serial = self.serial.lock().await;
        let token = self.require_token()?;

        self.set_loading(true);
        match self.api.delete_line(&token, product_id).await {
            Ok(()) => {
                let id = product_id.to_string();
                add_breadcrumb("cart", "Removed from cart", Some(&[("product_id", id.as_str())]));
                self.reload_locked().await.map(|_| ())
            }
            Err(ApiError::NotFound(_)) => {
                debug!(%product_id, "Line already gone");
                self.reload_locked().await?;
                Err(CartError::LineNotFound(product_id))
            }
            Err(e) => Err(self.fail(&token, e, Mutation::Remove(product_id))),
        }
    }

    /// Set a line to an absolute quantity; zero or below removes it.
    ///
    /// The server only offers additive upserts, so the store reloads the
    /// authoritative line first and sends the difference. Lowering a
    /// quantity deletes the line and re-adds the target; if the re-add
    /// fails the previous quantity is put back.
    ///
    /// # Errors
    ///
    /// Same as [`Self::add_line`] and [`Self::remove_line`].
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn change_quantity(&self, product_id: ProductId, quantity: i64) -> Result<(), CartError> {
        if quantity <= 0 {
            return self.remove_line(product_id).await;
        }
        let target = Quantity::new(quantity)?;

        let _serial = self.serial.lock().await;
        let token = self.require_token()?;
        let current = self
            .reload_locked()
            .await?
            .line(product_id)
            .map(|line| line.quantity);

        self.set_loading(true);
        let result = match current {
            None => self.api.upsert_line(&token, product_id, target).await,
            Some(current) if current == target => {
                self.set_loading(false);
                return Ok(());
            }
            Some(current) => match target.checked_sub(current) {
                Some(delta) => self.api.upsert_line(&token, product_id, delta).await,
                None => self.replace_line(&token, product_id, current, target).await,
            },
        };

        if let Err(e) = result {
            let err = self.fail(&token, e, Mutation::Add(product_id));
            if !matches!(err, CartError::SessionExpired) {
                // A compensated or partial change may have touched the server
                if let Err(reload) = self.reload_locked().await {
                    warn!(error = %reload, "Reload after failed quantity change failed");
                }
            }
            return Err(err);
        }

        let (id, qty) = (product_id.to_string(), target.to_string());
        add_breadcrumb(
            "cart",
            "Changed quantity",
            Some(&[("product_id", id.as_str()), ("quantity", qty.as_str())]),
        );
        self.reload_locked().await.map(|_| ())
    }

    /// Empty the cart on the server.
    ///
    /// # Errors
    ///
    /// Returns `CartError::SessionExpired` if the token was rejected.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<(), CartError> {
        let _serial = self.serial.lock().await;
        let token = self.require_token()?;

        self.set_loading(true);
        if let Err(e) = self.api.clear_cart(&token).await {
            return Err(self.fail(&token, e, Mutation::Clear));
        }

        add_breadcrumb("cart", "Cleared cart", None);
        self.reload_locked().await.map(|_| ())
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn require_token(&self) -> Result<AccessToken, CartError> {
        self.session.token().ok_or(CartError::NotAuthenticated)
    }

    /// Wait for in-flight cart operations and hold off new ones until the
    /// guard drops. Checkout runs its whole submission under this guard.
    pub(crate) async fn serialized(&self) -> MutexGuard<'_, ()> {
        self.serial.lock().await
    }

    /// Fetch and publish the server cart. Caller holds `serial`.
    pub(crate) async fn reload_locked(&self) -> Result<Cart, CartError> {
        let Some(token) = self.session.token() else {
            self.publish(Cart::empty())?;
            return Ok(Cart::empty());
        };

        self.set_loading(true);
        let lines = match self.api.fetch_cart(&token).await {
            Ok(lines) => lines,
            Err(e) => {
                self.set_loading(false);
                if self.session.expire_if_unauthorized(&token, &e) {
                    return Err(CartError::SessionExpired);
                }
                error!(error = %e, "Failed to load cart");
                return Err(CartError::Api(e));
            }
        };

        // The session may have ended or changed hands while the request was
        // in flight; its cart must not be shown to the next session.
        let still_current = self
            .session
            .token()
            .is_some_and(|current| current.expose() == token.expose());
        if !still_current {
            debug!("Discarding cart fetched for a session that has ended");
            self.set_loading(false);
            return Ok(self.cart());
        }

        let cart = Cart::from_lines(lines);
        debug!(lines = cart.lines().len(), "Cart reloaded");
        self.publish(cart.clone())?;
        Ok(cart)
    }

    /// Lower a line by deleting it and re-adding the target quantity.
    async fn replace_line(
        &self,
        token: &AccessToken,
        product_id: ProductId,
        current: Quantity,
        target: Quantity,
    ) -> Result<(), ApiError> {
        self.api.delete_line(token, product_id).await?;
        if let Err(e) = self.api.upsert_line(token, product_id, target).await {
            if let Err(restore) = self.api.upsert_line(token, product_id, current).await {
                warn!(
                    %product_id,
                    error = %restore,
                    "Failed to restore line after a rejected quantity change"
                );
            }
            return Err(e);
        }
        Ok(())
    }

    /// Map a failed mutation, leaving the confirmed cart untouched.
    fn fail(&self, token: &AccessToken, err: ApiError, mutation: Mutation) -> CartError {
        self.set_loading(false);
        if self.session.expire_if_unauthorized(token, &err) {
            return CartError::SessionExpired;
        }

        let mapped = match (err, mutation) {
            (ApiError::Rejected { status: 400 | 409, detail }, Mutation::Add(_)) => {
                CartError::InsufficientStock(detail)
            }
            (ApiError::NotFound(_), Mutation::Add(product_id)) => {
                CartError::ProductNotFound(product_id)
            }
            (ApiError::NotFound(_), Mutation::Remove(product_id)) => {
                CartError::LineNotFound(product_id)
            }
            (other, _) => {
                error!(error = %other, ?mutation, "Cart mutation failed");
                CartError::Api(other)
            }
        };
        info!(error = %mapped, "Cart mutation rejected");
        mapped
    }

    /// Publish a confirmed cart. A cart whose totals overflow is refused
    /// and the previous snapshot stays.
    fn publish(&self, cart: Cart) -> Result<(), CartError> {
        let totals = match self.policy.compute(cart.lines()) {
            Ok(totals) => totals,
            Err(e) => {
                self.set_loading(false);
                error!(error = %e, lines = cart.lines().len(), "Cart totals out of range");
                return Err(CartError::Totals(e));
            }
        };
        self.snapshot.send_replace(CartSnapshot {
            cart,
            totals,
            loading: false,
        });
        Ok(())
    }

    fn set_loading(&self, loading: bool) {
        self.snapshot.send_if_modified(|snapshot| {
            let changed = snapshot.loading != loading;
            snapshot.loading = loading;
            changed
        });
    }
}
