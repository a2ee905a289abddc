//! Core types for cartsync.
//!
//! This module provides type-safe wrappers for the storefront's domain concepts.

pub mod cart;
pub mod checkout;
pub mod email;
pub mod id;
pub mod money;
pub mod order;

pub use cart::{Cart, CartLine, Quantity, QuantityError};
pub use checkout::{
    CheckoutValidationError, PaymentReference, PaymentReferenceError, ShippingAddress,
    ShippingAddressError,
};
pub use email::{Email, EmailError};
pub use id::*;
pub use money::{Money, MoneyError};
pub use order::{FinalizedOrder, OrderLine, OrderSummary};
