//! Session-related types.
//!
//! A session is a bearer token plus the identity it was issued to. The two
//! always travel together: there is no way to build one without the other.

use core::fmt;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use cartsync_core::{Email, UserId};

/// Opaque bearer token issued by the API.
#[derive(Clone)]
pub struct AccessToken(SecretString);

impl AccessToken {
    /// Wrap a raw token string.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(SecretString::from(raw.into()))
    }

    /// The raw token, for building the `Authorization` header or persisting.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken([REDACTED])")
    }
}

/// Who is logged in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Account ID on the server, when the login response carried one.
    #[serde(default)]
    pub id: Option<UserId>,
    /// Name shown in the UI.
    pub display_name: String,
    /// Login email.
    pub email: Email,
}

impl Identity {
    /// Build an identity when the server only returned an ID, naming the
    /// user after the local part of their email.
    #[must_use]
    pub fn from_email(id: Option<UserId>, email: Email) -> Self {
        Self {
            id,
            display_name: email.local_part().to_string(),
            email,
        }
    }
}

/// An authenticated session: token and identity, never one without the other.
#[derive(Clone)]
pub struct Session {
    token: AccessToken,
    identity: Identity,
}

impl Session {
    /// Pair a token with the identity it was issued to.
    #[must_use]
    pub const fn new(token: AccessToken, identity: Identity) -> Self {
        Self { token, identity }
    }

    /// The bearer token.
    #[must_use]
    pub const fn token(&self) -> &AccessToken {
        &self.token
    }

    /// The logged-in identity.
    #[must_use]
    pub const fn identity(&self) -> &Identity {
        &self.identity
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &"[REDACTED]")
            .field("identity", &self.identity)
            .finish()
    }
}

/// Durable storage keys for the persisted session.
pub mod keys {
    /// Key for the raw bearer token.
    pub const AUTH_TOKEN: &str = "auth_token";

    /// Key for the JSON-encoded [`super::Identity`].
    pub const AUTH_USER: &str = "auth_user";
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn identity() -> Identity {
        Identity::from_email(Some(UserId::new(7)), Email::parse("ana@example.com").unwrap())
    }

    #[test]
    fn test_identity_from_email_uses_local_part() {
        let identity = identity();
        assert_eq!(identity.display_name, "ana");
        assert_eq!(identity.id, Some(UserId::new(7)));
    }

    #[test]
    fn test_identity_without_id_deserializes() {
        let identity: Identity =
            serde_json::from_str(r#"{"display_name":"ana","email":"ana@example.com"}"#).unwrap();
        assert_eq!(identity.id, None);
    }

    #[test]
    fn test_session_debug_redacts_token() {
        let session = Session::new(AccessToken::new("super-secret-jwt"), identity());
        let debug = format!("{session:?}");
        assert!(!debug.contains("super-secret-jwt"));
        assert!(debug.contains("REDACTED"));
        assert!(debug.contains("ana@example.com"));
        assert_eq!(session.token().expose(), "super-secret-jwt");
    }

    #[test]
    fn test_identity_json_roundtrip_shape() {
        let json = serde_json::to_value(identity()).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["display_name"], "ana");
        assert_eq!(json["email"], "ana@example.com");
    }
}
