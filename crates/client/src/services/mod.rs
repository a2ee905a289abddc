//! The stores that make up the client state layer.
//!
//! Each store is constructed once and shared by reference; see
//! [`crate::state::Storefront`].

pub mod cart;
pub mod checkout;
pub mod history;
pub mod session;

pub use cart::{CartError, CartSnapshot, CartStore};
pub use checkout::{
    CheckoutError, CheckoutForm, CheckoutOrchestrator, CheckoutPhase, Confirmation,
};
pub use history::{HistoryError, HistoryReader};
pub use session::{SessionError, SessionStore};
