//! Tick computation and keyed hashing behind nonce tokens.
use std::time::Duration;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::error;

use crate::error::Error;

pub(crate) type HmacSha256 = Hmac<Sha256>;

/// Length of a nonce token in hex characters.
pub const TOKEN_LEN: usize = 10;

/// Number of the time bucket `now` falls into.
///
/// A bucket spans half of `nonce_life`, so a token is accepted during the bucket it was
/// minted in and the one after it.
pub fn nonce_tick(now: u64, nonce_life: Duration) -> u64 {
    let half = (nonce_life.as_secs() / 2).max(1);
    now.div_ceil(half)
}

/// Hex encoded HMAC-SHA256 of `tick|action|uid|session_token`.
///
/// An empty `key` is refused with `Error::SecretKey`.
pub fn nonce_hash(
    key: &[u8],
    tick: u64,
    action: &str,
    uid: u64,
    session_token: &str,
) -> Result<String, Error> {
    if key.is_empty() {
        error!("Refusing to hash a nonce without a secret key");
        return Err(Error::SecretKey);
    }
    let mut mac = HmacSha256::new_from_slice(key).map_err(|e| {
        error!("Failed to key nonce hash: {:?}", e);
        Error::SecretKey
    })?;
    mac.update(format!("{}|{}|{}|{}", tick, action, uid, session_token).as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Cuts the token out of a full hash: the ten characters ending two before the end.
pub fn truncate_token(hash: &str) -> &str {
    let end = hash.len().saturating_sub(2);
    let start = end.saturating_sub(TOKEN_LEN);
    &hash[start..end]
}

/// Compares two strings without short-circuiting on the first differing byte.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes().zip(b.bytes()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

// ==========Tests==========
#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{constant_time_eq, nonce_hash, nonce_tick, truncate_token};
    use crate::error::Error;

    const DAY: Duration = Duration::from_secs(86_400);

    #[test]
    fn test_tick_rotates_every_half_life() {
        assert_eq!(nonce_tick(1, DAY), 1);
        assert_eq!(nonce_tick(43_200, DAY), 1);
        assert_eq!(nonce_tick(43_201, DAY), 2);
        assert_eq!(nonce_tick(86_400, DAY), 2);
    }

    #[test]
    fn test_tick_tiny_life_does_not_divide_by_zero() {
        assert_eq!(nonce_tick(10, Duration::from_secs(1)), 10);
    }

    #[test]
    fn test_hash_depends_on_every_part() {
        let key = b"secret";
        let hash = |key: &[u8], tick, action, uid, session| {
            nonce_hash(key, tick, action, uid, session).unwrap()
        };
        let base = hash(key, 1, "action", 1, "session");
        assert_eq!(base.len(), 64);
        assert_eq!(base, hash(key, 1, "action", 1, "session"));
        assert_ne!(base, hash(key, 2, "action", 1, "session"));
        assert_ne!(base, hash(key, 1, "other", 1, "session"));
        assert_ne!(base, hash(key, 1, "action", 2, "session"));
        assert_ne!(base, hash(key, 1, "action", 1, "other"));
        assert_ne!(base, hash(b"other", 1, "action", 1, "session"));
    }

    #[test]
    fn test_hash_rejects_empty_key() {
        assert_eq!(
            nonce_hash(b"", 1, "action", 1, "session"),
            Err(Error::SecretKey)
        );
    }

    #[test]
    fn test_truncate_token() {
        assert_eq!(truncate_token("abcdefghijklmnop"), "efghijklmn");
        assert_eq!(truncate_token("abc"), "a");
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq("abc", "abc"));
        assert!(!constant_time_eq("abc", "abd"));
        assert!(!constant_time_eq("abc", "abcd"));
    }
}
