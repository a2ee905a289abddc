//! Session commands.
//!
//! # Usage
//!
//! ```bash
//! cartsync register -n "Ana Pérez" -e ana@example.com --password secret
//! cartsync login -e ana@example.com --password secret
//! cartsync whoami
//! cartsync logout
//! ```

use secrecy::SecretString;

use cartsync_client::{AppError, Storefront};

use crate::output;

/// Log in and load the cart.
///
/// # Errors
///
/// Returns `AppError::Session` on bad credentials.
pub async fn login(
    storefront: &Storefront,
    email: &str,
    password: SecretString,
) -> Result<String, AppError> {
    let session = storefront.login(email, &password).await?;
    let items = storefront.cart().cart().item_count();
    Ok(format!(
        "Logged in as {}.\n{items} item(s) in your cart.",
        output::identity(session.identity())
    ))
}

/// Create an account. Does not log in.
///
/// # Errors
///
/// Returns `AppError::Session` if the email is taken or a field is invalid.
pub async fn register(
    storefront: &Storefront,
    name: &str,
    email: &str,
    password: SecretString,
) -> Result<String, AppError> {
    storefront
        .session()
        .register(name, email, &password)
        .await?;
    Ok(format!(
        "Account created for {}. Log in with `cartsync login`.",
        email.trim()
    ))
}

pub fn logout(storefront: &Storefront) -> String {
    let was_logged_in = storefront.session().is_authenticated();
    storefront.logout();
    if was_logged_in {
        "Logged out.".to_string()
    } else {
        "You were not logged in.".to_string()
    }
}

pub fn whoami(storefront: &Storefront) -> String {
    storefront
        .session()
        .identity()
        .map_or_else(|| "Not logged in.".to_string(), |i| output::identity(&i))
}
