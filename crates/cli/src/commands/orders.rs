//! Purchase history commands.
//!
//! # Usage
//!
//! ```bash
//! cartsync orders list
//! cartsync orders show 42
//! ```

use cartsync_client::{AppError, Storefront};
use cartsync_core::OrderId;

use crate::output;

/// List every order.
///
/// # Errors
///
/// Returns `AppError::History` without a session.
pub async fn list(storefront: &Storefront) -> Result<String, AppError> {
    let orders = storefront.history().list_orders().await?;
    Ok(output::order_list(&orders))
}

/// Show one order.
///
/// # Errors
///
/// Returns `AppError::History` if the order is not the account's.
pub async fn show(storefront: &Storefront, order_id: OrderId) -> Result<String, AppError> {
    let order = storefront.history().get_order(order_id).await?;
    Ok(output::order(&order))
}
