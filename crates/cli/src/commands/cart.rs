//! Cart commands.
//!
//! # Usage
//!
//! ```bash
//! cartsync cart show
//! cartsync cart add 12 --quantity 2
//! cartsync cart set 12 5
//! cartsync cart remove 12
//! cartsync cart clear
//! ```

use cartsync_client::services::CartError;
use cartsync_client::{AppError, Storefront};
use cartsync_core::{ProductId, Quantity};

use crate::output;

/// Reload and render the cart.
///
/// # Errors
///
/// Returns `AppError::Cart` if the cart cannot be loaded.
pub async fn show(storefront: &Storefront) -> Result<String, AppError> {
    storefront.cart().reload().await?;
    Ok(output::cart(&storefront.cart().snapshot()))
}

/// Add units of a product.
///
/// # Errors
///
/// Returns `AppError::Cart` for a bad quantity, missing stock or an unknown
/// product.
pub async fn add(
    storefront: &Storefront,
    product_id: ProductId,
    quantity: i64,
) -> Result<String, AppError> {
    let quantity = Quantity::new(quantity).map_err(CartError::from)?;
    storefront.cart().add_line(product_id, quantity).await?;
    Ok(output::cart(&storefront.cart().snapshot()))
}

/// Set a line to an absolute quantity (0 removes it).
///
/// # Errors
///
/// Returns `AppError::Cart` for missing stock or an unknown product.
pub async fn set(
    storefront: &Storefront,
    product_id: ProductId,
    quantity: i64,
) -> Result<String, AppError> {
    match storefront
        .cart()
        .change_quantity(product_id, quantity)
        .await
    {
        Ok(()) => Ok(output::cart(&storefront.cart().snapshot())),
        Err(e) if e.is_already_satisfied() => Ok(already_gone(storefront, product_id)),
        Err(e) => Err(e.into()),
    }
}

/// Remove a product's line.
///
/// # Errors
///
/// Returns `AppError::Cart` if the cart cannot be reached.
pub async fn remove(storefront: &Storefront, product_id: ProductId) -> Result<String, AppError> {
    match storefront.cart().remove_line(product_id).await {
        Ok(()) => Ok(output::cart(&storefront.cart().snapshot())),
        Err(e) if e.is_already_satisfied() => Ok(already_gone(storefront, product_id)),
        Err(e) => Err(e.into()),
    }
}

/// Empty the cart.
///
/// # Errors
///
/// Returns `AppError::Cart` if the cart cannot be reached.
pub async fn clear(storefront: &Storefront) -> Result<String, AppError> {
    storefront.cart().clear().await?;
    Ok(output::cart(&storefront.cart().snapshot()))
}

fn already_gone(storefront: &Storefront, product_id: ProductId) -> String {
    format!(
        "Product {product_id} was already out of your cart.\n{}",
        output::cart(&storefront.cart().snapshot())
    )
}
