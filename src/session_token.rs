//! Provides the session token that binds nonces to one login session.
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{TryRngCore, rngs::OsRng};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::error::Error;

/// A randomly generated session token created using `OsRng` and Base64URL-encoded.
///
/// Nonces mixed with the session token stop working once the session ends, even
/// inside their lifetime.
/// # Example
/// ```rust,no_run
/// use tiny_nonce::session_token::SessionToken;
///
/// let session_token = SessionToken::new().expect("Failed to generate session token");
/// println!("Generated session token: {}", session_token.value());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionToken(pub(crate) String);

impl SessionToken {
    /// Generates a new session token using a secure random generator.
    /// - Uses `OsRng` for cryptographic security.
    /// - Encodes the random bytes in Base64URL format without padding.
    /// - Returns an `Error::GenToken` if the random generation fails.
    pub fn new() -> Result<Self, Error> {
        let mut key = [0u8; 32];
        OsRng.try_fill_bytes(&mut key).map_err(|e| {
            error!("Failed to generate session token: {:?}", e);
            Error::GenToken
        })?;
        Ok(Self(URL_SAFE_NO_PAD.encode(key)))
    }

    /// Returns the session token as a string reference.
    pub fn value(&self) -> &str {
        &self.0
    }
}

impl From<String> for SessionToken {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SessionToken {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

// ==========Tests==========
#[cfg(test)]
mod tests {
    use super::SessionToken;

    #[test]
    fn test_session_token_new() {
        let token = SessionToken::new().unwrap();
        assert_eq!(token.value().len(), 43);
        assert_ne!(token, SessionToken::new().unwrap());
    }

    #[test]
    fn test_session_token_default_is_empty() {
        assert!(SessionToken::default().value().is_empty());
    }
}
