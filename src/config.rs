//! Defines structures and builders related to nonce configuration.
//!
//! Provides a structured way to handle the secret key, token lifetime and admin
//! location required to mint and verify nonces.
//!
//! ## Structures
//! - `Config`: Stores everything a [`RequestHost`](crate::host::RequestHost) needs.
//! - `ConfigBuilder`: A builder for constructing a `Config` instance.
//!
//! # Example
//! ```rust,no_run
//! use std::time::Duration;
//! use tiny_nonce::config::Config;
//!
//! let config = Config::builder()
//!     .secret_key(b"a long random secret")
//!     .nonce_life(Duration::from_secs(12 * 60 * 60))
//!     .admin_url("https://example.com/admin/")
//!     .build();
//! ```
use std::{fmt, sync::Arc, time::Duration};

use base64::{Engine, engine::general_purpose::STANDARD};
use rand::{TryRngCore, rngs::OsRng};
use tracing::{error, warn};

use crate::error::Error;

/// Default lifetime of a nonce: one day.
pub const DEFAULT_NONCE_LIFE: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Clone, Default, PartialEq)]
pub(crate) struct SecretKey(pub Vec<u8>);

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretKey([redacted; {}])", self.0.len())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct NonceLife(pub Duration);

impl Default for NonceLife {
    fn default() -> Self {
        Self(DEFAULT_NONCE_LIFE)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct AdminUrl(pub String);

/// Hook that picks the user id used for logged-out visitors.
///
/// Receives the current id (always `0`) and the action being hashed.
pub type LoggedOutUid = Arc<dyn Fn(u64, &str) -> u64 + Send + Sync>;

/// Holds everything needed to mint and verify nonces.
///
/// It is designed to be immutable once constructed and shared by every request.
///
/// # Fields
/// - `secret_key`: Key for the nonce HMAC.
/// - `nonce_life`: How long a token stays valid. Tokens rotate every half of it.
/// - `admin_url`: Prefix of the administrative area, used by admin referer checks.
/// - `logged_out_uid`: Optional hook overriding the user id of logged-out visitors.
#[derive(Clone)]
pub struct Config {
    pub(crate) secret_key: SecretKey,
    pub(crate) nonce_life: NonceLife,
    pub(crate) admin_url: AdminUrl,
    pub(crate) logged_out_uid: Option<LoggedOutUid>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("secret_key", &self.secret_key)
            .field("nonce_life", &self.nonce_life)
            .field("admin_url", &self.admin_url)
            .field("logged_out_uid", &self.logged_out_uid.is_some())
            .finish()
    }
}

// ==========impl Config==========
impl Config {
    /// Returns a new `ConfigBuilder` instance to create a `Config` object.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    pub fn nonce_life(&self) -> Duration {
        self.nonce_life.0
    }

    pub fn admin_url(&self) -> &str {
        &self.admin_url.0
    }

    /// Applies the logged-out hook when `uid` is `0`.
    pub fn effective_uid(&self, uid: u64, action: &str) -> u64 {
        match (&self.logged_out_uid, uid) {
            (Some(hook), 0) => hook(uid, action),
            _ => uid,
        }
    }
}

/// Provides a convenient way to create a `Config` instance step by step.
///
/// # Example
/// ```rust,no_run
/// use tiny_nonce::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .random_secret_key()
///     .expect("Failed to generate key")
///     .admin_url("https://example.com/admin/")
///     .build();
/// ```
#[derive(Clone, Default)]
pub struct ConfigBuilder {
    secret_key: SecretKey,
    nonce_life: NonceLife,
    admin_url: AdminUrl,
    logged_out_uid: Option<LoggedOutUid>,
}

// ==========impl ConfigBuilder==========
impl ConfigBuilder {
    /// Creates a new `ConfigBuilder` instance with default values.
    pub fn new() -> Self {
        ConfigBuilder::default()
    }

    /// Sets the HMAC key from raw bytes.
    pub fn secret_key(mut self, secret_key: &[u8]) -> Self {
        self.secret_key = SecretKey(secret_key.to_vec());
        self
    }

    /// Sets the HMAC key from a standard Base64 string, e.g. read from the environment.
    pub fn secret_key_base64(mut self, secret_key: &str) -> Result<Self, Error> {
        let bytes = STANDARD.decode(secret_key.trim()).map_err(|e| {
            error!("Failed to decode secret key: {}", e);
            Error::SecretKey
        })?;
        if bytes.is_empty() {
            return Err(Error::SecretKey);
        }
        self.secret_key = SecretKey(bytes);
        Ok(self)
    }

    /// Sets a fresh 32 byte HMAC key from `OsRng`.
    ///
    /// Tokens minted with a random key do not survive a restart.
    pub fn random_secret_key(mut self) -> Result<Self, Error> {
        let mut key = [0u8; 32];
        OsRng.try_fill_bytes(&mut key).map_err(|e| {
            error!("Failed to generate secret key: {:?}", e);
            Error::SecretKey
        })?;
        self.secret_key = SecretKey(key.to_vec());
        Ok(self)
    }

    /// Sets how long a token stays valid.
    pub fn nonce_life(mut self, nonce_life: Duration) -> Self {
        self.nonce_life = NonceLife(nonce_life);
        self
    }

    /// Sets the prefix of the administrative area.
    pub fn admin_url(mut self, admin_url: &str) -> Self {
        self.admin_url = AdminUrl(admin_url.to_string());
        self
    }

    /// Sets the hook that chooses the user id for logged-out visitors.
    pub fn nonce_user_logged_out<F>(mut self, hook: F) -> Self
    where
        F: Fn(u64, &str) -> u64 + Send + Sync + 'static,
    {
        self.logged_out_uid = Some(Arc::new(hook));
        self
    }

    /// Constructs a `Config` instance with the provided values.
    pub fn build(self) -> Config {
        if self.secret_key.0.is_empty() {
            warn!("Building nonce config without a secret key, minting will fail");
        }
        Config {
            secret_key: self.secret_key,
            nonce_life: self.nonce_life,
            admin_url: self.admin_url,
            logged_out_uid: self.logged_out_uid,
        }
    }
}
