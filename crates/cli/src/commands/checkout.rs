//! Checkout command.
//!
//! # Usage
//!
//! ```bash
//! cartsync checkout --address "Av. Siempre Viva 742" --card 4242
//! ```

use cartsync_client::services::CheckoutForm;
use cartsync_client::{AppError, Storefront};

use crate::output;

/// Load the cart and finalize it.
///
/// The cart is reloaded first so the estimate and the empty-cart check
/// reflect the server, not a previous run.
///
/// # Errors
///
/// Returns `AppError::Checkout` if validation fails or the server refuses
/// the order.
pub async fn run(storefront: &Storefront, address: String, card: String) -> Result<String, AppError> {
    storefront.cart().reload().await?;
    let form = CheckoutForm {
        shipping_address: address,
        payment_reference: card,
    };
    let confirmation = storefront.checkout().submit(&form).await?;
    Ok(output::confirmation(&confirmation))
}
