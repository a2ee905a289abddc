//! Checkout form values and the local checks that gate a finalize request.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`PaymentReference`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PaymentReferenceError {
    /// Wrong number of characters.
    #[error("card reference must be exactly {expected} digits")]
    WrongLength {
        /// Required length.
        expected: usize,
    },
    /// A character other than 0-9.
    #[error("card reference may contain digits only")]
    NonDigit,
}

/// The last four digits of the card used to pay.
///
/// This is the only payment data the client ever handles; the server keeps
/// it on the order for display.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PaymentReference(String);

impl PaymentReference {
    /// Number of digits in a reference.
    pub const LENGTH: usize = 4;

    /// Parse a reference, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns an error unless the input is exactly four ASCII digits.
    pub fn parse(s: &str) -> Result<Self, PaymentReferenceError> {
        let s = s.trim();
        if !s.chars().all(|c| c.is_ascii_digit()) {
            return Err(PaymentReferenceError::NonDigit);
        }
        if s.len() != Self::LENGTH {
            return Err(PaymentReferenceError::WrongLength {
                expected: Self::LENGTH,
            });
        }
        Ok(Self(s.to_owned()))
    }

    /// The digits.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PaymentReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PaymentReference(****{})", self.0)
    }
}

impl fmt::Display for PaymentReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "**** **** **** {}", self.0)
    }
}

impl TryFrom<String> for PaymentReference {
    type Error = PaymentReferenceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PaymentReference> for String {
    fn from(r: PaymentReference) -> Self {
        r.0
    }
}

/// Errors that can occur when parsing a [`ShippingAddress`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ShippingAddressError {
    /// Nothing but whitespace.
    #[error("shipping address is required")]
    Blank,
    /// Longer than the server accepts.
    #[error("shipping address must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
}

/// A free-form delivery address ("street, number, city, postal code").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShippingAddress(String);

impl ShippingAddress {
    /// Maximum accepted length, in characters.
    pub const MAX_LENGTH: usize = 500;

    /// Parse an address, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is blank or too long.
    pub fn parse(s: &str) -> Result<Self, ShippingAddressError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ShippingAddressError::Blank);
        }
        if s.chars().count() > Self::MAX_LENGTH {
            return Err(ShippingAddressError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        Ok(Self(s.to_owned()))
    }

    /// The address text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShippingAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A precondition of finalize that failed locally; no request was sent.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CheckoutValidationError {
    /// Nobody is logged in.
    #[error("you must log in to check out")]
    NoSession,
    /// The confirmed cart has no lines.
    #[error("the cart is empty")]
    EmptyCart,
    /// Bad shipping address.
    #[error(transparent)]
    ShippingAddress(#[from] ShippingAddressError),
    /// Bad card reference.
    #[error(transparent)]
    PaymentReference(#[from] PaymentReferenceError),
}
