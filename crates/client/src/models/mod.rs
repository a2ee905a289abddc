//! Client-side state types that are not part of the shared domain.

pub mod session;

pub use session::{AccessToken, Identity, Session};
