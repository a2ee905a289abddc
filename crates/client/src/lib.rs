//! Cartsync client library.
//!
//! The client-side state layer of the storefront: who is logged in, what is
//! in their cart, what it is estimated to cost, and how a cart becomes an
//! order. The remote API is the source of truth for all of it; this crate
//! only holds server-confirmed snapshots and defers to the server's figures.
//!
//! # Architecture
//!
//! - [`services::SessionStore`] - token and identity, persisted locally
//! - [`services::CartStore`] - server-confirmed cart lines and their totals
//! - [`services::CheckoutOrchestrator`] - the finalize state machine
//! - [`services::HistoryReader`] - read-only purchase history
//! - [`state::Storefront`] - constructs the stores once and hands them out
//!
//! All network access goes through the [`api::StoreApi`] trait, implemented
//! for HTTP by [`api::HttpApi`].

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod state;
pub mod storage;

#[cfg(test)]
mod test_support;

pub use error::{AppError, ErrorKind};
pub use state::Storefront;
