//! Key to handle table for sharing nonce definitions.
//!
//! The application's composition root owns one `NonceRegistry`, registers every named nonce
//! at startup and passes the registry (usually behind an `Arc`) to the code that renders or
//! verifies them.
//!
//! # Example
//! ```rust,no_run
//! use tiny_nonce::{format::Arg, registry::NonceRegistry};
//!
//! let mut nonces = NonceRegistry::new();
//! nonces.register("delete-post", "delete-post-%d", vec![Arg::from(5)]);
//!
//! let nonce = nonces.get("delete-post");
//! assert_eq!(nonce.action(&[Arg::from(5)]).unwrap(), "delete-post-5");
//! ```
use std::{borrow::Cow, collections::HashMap};

use tracing::warn;

use crate::{error::Error, format::Arg, nonce::NonceHandle};

#[derive(Debug, Clone, Default)]
pub struct NonceRegistry {
    nonces: HashMap<String, NonceHandle>,
}

impl NonceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handle under `key`.
    ///
    /// A key can only be registered once: a second registration logs a warning and leaves
    /// the first handle in place.
    pub fn register(&mut self, key: &str, format: impl Into<String>, args: Vec<Arg>) {
        if let Err(e) = self.try_register(key, format, args) {
            warn!("{}", e);
        }
    }

    /// Like [`register`](Self::register), but returns `Error::DuplicateRegistration`.
    pub fn try_register(
        &mut self,
        key: &str,
        format: impl Into<String>,
        args: Vec<Arg>,
    ) -> Result<(), Error> {
        if self.nonces.contains_key(key) {
            return Err(Error::DuplicateRegistration(key.to_string()));
        }
        self.nonces
            .insert(key.to_string(), NonceHandle::with_args(format, args));
        Ok(())
    }

    /// Returns the handle registered under `key`.
    ///
    /// An unknown key logs a warning and yields a fresh default handle, so callers keep
    /// working.
    pub fn get(&self, key: &str) -> Cow<'_, NonceHandle> {
        match self.try_get(key) {
            Ok(nonce) => Cow::Borrowed(nonce),
            Err(e) => {
                warn!("{}", e);
                Cow::Owned(NonceHandle::default())
            }
        }
    }

    /// Like [`get`](Self::get), but returns `Error::UnknownKey`.
    pub fn try_get(&self, key: &str) -> Result<&NonceHandle, Error> {
        self.nonces
            .get(key)
            .ok_or_else(|| Error::UnknownKey(key.to_string()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.nonces.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.nonces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nonces.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.nonces.keys().map(String::as_str)
    }
}

// ==========Tests==========
#[cfg(test)]
mod tests {
    use std::{
        borrow::Cow,
        io,
        sync::{Arc, Mutex},
    };

    use itertools::Itertools;

    use crate::{error::Error, format::Arg, nonce::NonceHandle};

    use super::NonceRegistry;

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    // Runs `f` and returns what it logged.
    fn captured_logs<F: FnOnce()>(f: F) -> String {
        let buffer = LogBuffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        tracing::subscriber::with_default(subscriber, f);

        let bytes = buffer.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_register_and_get() {
        let mut nonces = NonceRegistry::new();
        nonces.register("caleb", "qwerty %s %d", vec![Arg::from("caleb"), Arg::from(15)]);

        let nonce = nonces.get("caleb");
        assert!(matches!(nonce, Cow::Borrowed(_)));
        assert_eq!(nonce.format(), "qwerty %s %d");
        assert_eq!(nonce.args().len(), 2);
        assert!(nonces.contains("caleb"));
        assert_eq!(nonces.len(), 1);
    }

    #[test]
    fn test_register_duplicate_keeps_original() {
        let mut nonces = NonceRegistry::new();
        nonces.register("x", "first", vec![]);
        let logs = captured_logs(|| nonces.register("x", "second", vec![]));

        assert!(logs.contains("WARN"));
        assert!(logs.contains("Nonce with key `x` is already registered"));
        assert_eq!(nonces.len(), 1);
        assert_eq!(nonces.get("x").format(), "first");
        assert_eq!(
            nonces.try_register("x", "third", vec![]),
            Err(Error::DuplicateRegistration("x".to_string()))
        );
        assert_eq!(nonces.get("x").format(), "first");
    }

    #[test]
    fn test_get_unknown_key_falls_back() {
        let nonces = NonceRegistry::new();

        let logs = captured_logs(|| {
            nonces.get("nonexistent");
        });
        assert!(logs.contains("WARN"));
        assert!(logs.contains("Nonce with key `nonexistent` is not registered"));

        let nonce = nonces.get("nonexistent");
        assert!(matches!(nonce, Cow::Owned(_)));
        assert_eq!(*nonce, NonceHandle::default());
        assert_eq!(nonce.action(&[]).unwrap(), "-1");
        assert!(nonces.is_empty());
        assert_eq!(
            nonces.try_get("nonexistent"),
            Err(Error::UnknownKey("nonexistent".to_string()))
        );
    }

    #[test]
    fn test_keys() {
        let mut nonces = NonceRegistry::new();
        nonces.register("b", "b", vec![]);
        nonces.register("a", "a", vec![]);

        assert_eq!(nonces.keys().sorted().collect::<Vec<_>>(), vec!["a", "b"]);
    }
}
