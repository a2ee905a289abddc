//! Cartsync Core - Shared domain types and totals.
//!
//! This crate provides the types every cartsync component speaks:
//! - `client` - Session, cart, checkout and purchase-history state
//! - `cli` - Terminal front end driving the client
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients, no storage. This keeps it lightweight and allows it to be used
//! anywhere, including by the mock API in the integration tests.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, money, quantities, emails, cart
//!   lines and finalized orders
//! - [`totals`] - The client-side totals estimate (subtotal, tax, shipping)

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod totals;
pub mod types;

pub use totals::{TotalsEstimate, TotalsPolicy, compute_totals};
pub use types::*;
