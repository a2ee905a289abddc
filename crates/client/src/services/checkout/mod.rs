//! Checkout orchestrator.
//!
//! Drives `Idle -> Validating -> Submitting -> Confirmed | Failed`.
//! `Confirmed` and `Failed` hold until the next submit or a reset. The
//! finalize request is the only side effect and is never retried: finalize
//! is not idempotent, so a failure is reported and the user must submit
//! again explicitly.
//!
//! A submission holds the cart store's turn from validation through the
//! post-order reload, so cart mutations wait for it (and it waits for them).

mod error;

pub use error::CheckoutError;

use std::sync::{Arc, Mutex, PoisonError};

use rust_decimal::Decimal;
use tokio::sync::watch;
use tracing::{info, instrument, warn};

use cartsync_core::{
    CheckoutValidationError, Money, OrderId, PaymentReference, ShippingAddress, TotalsEstimate,
};

use crate::api::{ApiError, StoreApi};
use crate::error::add_breadcrumb;
use crate::services::cart::CartStore;
use crate::services::session::SessionStore;

/// Raw checkout form input.
#[derive(Debug, Clone, Default)]
pub struct CheckoutForm {
    /// Free-form shipping address.
    pub shipping_address: String,
    /// Last four digits of the card.
    pub payment_reference: String,
}

/// A finalized order as the confirmation view shows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    /// Server-assigned order number.
    pub order_id: OrderId,
    /// What the server charged. This is the figure to display.
    pub authoritative_total: Money,
    /// The client estimate at submit time.
    pub estimate: TotalsEstimate,
}

impl Confirmation {
    /// `authoritative_total - estimate.total`. Informational only.
    #[must_use]
    pub fn estimate_discrepancy(&self) -> Decimal {
        self.authoritative_total.difference(self.estimate.total)
    }
}

/// Where the checkout currently is.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CheckoutPhase {
    /// Waiting for a submit.
    #[default]
    Idle,
    /// Checking local preconditions.
    Validating,
    /// The finalize request is in flight.
    Submitting,
    /// The server accepted the order.
    Confirmed(Confirmation),
    /// The last submit failed. Holds until the next submit or a reset.
    Failed(String),
}

impl CheckoutPhase {
    /// Whether a submission is under way.
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        matches!(self, Self::Validating | Self::Submitting)
    }
}

/// Turns the confirmed cart into an order.
pub struct CheckoutOrchestrator {
    session: Arc<SessionStore>,
    cart: Arc<CartStore>,
    api: Arc<dyn StoreApi>,
    phase: watch::Sender<CheckoutPhase>,
    last_failure: Mutex<Option<String>>,
}

impl CheckoutOrchestrator {
    /// Create an idle orchestrator.
    pub fn new(session: Arc<SessionStore>, cart: Arc<CartStore>, api: Arc<dyn StoreApi>) -> Self {
        let (phase, _rx) = watch::channel(CheckoutPhase::Idle);
        Self {
            session,
            cart,
            api,
            phase,
            last_failure: Mutex::new(None),
        }
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> CheckoutPhase {
        self.phase.borrow().clone()
    }

    /// Receive every phase change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CheckoutPhase> {
        self.phase.subscribe()
    }

    /// Message of the most recent failed submit, cleared by the next submit
    /// or a reset.
    #[must_use]
    pub fn last_failure(&self) -> Option<String> {
        self.last_failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Leave a confirmation or failure and return to `Idle`.
    ///
    /// Does nothing while a submission is under way.
    pub fn reset(&self) {
        let reset = self.phase.send_if_modified(|phase| {
            if matches!(phase, CheckoutPhase::Confirmed(_) | CheckoutPhase::Failed(_)) {
                *phase = CheckoutPhase::Idle;
                true
            } else {
                false
            }
        });
        if reset {
            *self
                .last_failure
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = None;
        }
    }

    /// Validate the form against the current session and cart, then
    /// finalize.
    ///
    /// Waits for any cart operation in flight, and cart operations started
    /// meanwhile wait until the order is finalized and the cart reloaded.
    /// On success the cart is reloaded (the server empties it) and the
    /// phase becomes `Confirmed`. A failure of that reload is logged and
    /// does not affect the confirmation. On failure the phase becomes
    /// `Failed` with the error message.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::InProgress` while another submit is running.
    /// Returns `CheckoutError::Validation` without any request for a missing
    /// session, an empty cart, a blank address or a malformed card reference.
    /// Returns `CheckoutError::Rejected` with the server's message if it
    /// refuses the order, and `CheckoutError::SessionExpired` if the token
    /// was rejected (the session is ended).
    #[instrument(skip(self, form))]
    pub async fn submit(&self, form: &CheckoutForm) -> Result<Confirmation, CheckoutError> {
        let started = self.phase.send_if_modified(|phase| {
            if phase.is_busy() {
                false
            } else {
                *phase = CheckoutPhase::Validating;
                true
            }
        });
        if !started {
            return Err(CheckoutError::InProgress);
        }
        *self
            .last_failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;

        match self.run(form).await {
            Ok(confirmation) => {
                self.phase
                    .send_replace(CheckoutPhase::Confirmed(confirmation.clone()));
                Ok(confirmation)
            }
            Err(e) => {
                let message = e.to_string();
                info!(error = %message, "Checkout failed");
                *self
                    .last_failure
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = Some(message.clone());
                self.phase.send_replace(CheckoutPhase::Failed(message));
                Err(e)
            }
        }
    }

    async fn run(&self, form: &CheckoutForm) -> Result<Confirmation, CheckoutError> {
        let _serial = self.cart.serialized().await;
        let token = self
            .session
            .token()
            .ok_or(CheckoutValidationError::NoSession)?;
        let snapshot = self.cart.snapshot();
        if snapshot.cart.is_empty() {
            return Err(CheckoutValidationError::EmptyCart.into());
        }
        let address = ShippingAddress::parse(&form.shipping_address)
            .map_err(CheckoutValidationError::from)?;
        let payment = PaymentReference::parse(&form.payment_reference)
            .map_err(CheckoutValidationError::from)?;

        self.phase.send_replace(CheckoutPhase::Submitting);
        add_breadcrumb("checkout", "Submitting order", None);

        let receipt = match self.api.finalize(&token, &address, &payment).await {
            Ok(receipt) => receipt,
            Err(e) => {
                if self.session.expire_if_unauthorized(&token, &e) {
                    return Err(CheckoutError::SessionExpired);
                }
                return Err(match e {
                    ApiError::Rejected { detail, .. } | ApiError::NotFound(detail) => {
                        CheckoutError::Rejected(detail)
                    }
                    other => {
                        tracing::error!(error = %other, "Finalize request failed");
                        CheckoutError::Api(other)
                    }
                });
            }
        };

        let confirmation = Confirmation {
            order_id: receipt.order_id,
            authoritative_total: receipt.total,
            estimate: snapshot.totals,
        };
        let order_id = receipt.order_id.to_string();
        add_breadcrumb(
            "checkout",
            "Order confirmed",
            Some(&[("order_id", order_id.as_str())]),
        );
        info!(
            order_id = %confirmation.order_id,
            total = %confirmation.authoritative_total,
            estimate = %confirmation.estimate.total,
            "Order confirmed"
        );

        if let Err(e) = self.cart.reload_locked().await {
            warn!(error = %e, "Cart reload after checkout failed");
        }

        Ok(confirmation)
    }
}
