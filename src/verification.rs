//! Outcome of checking a submitted nonce.
use serde::{Deserialize, Serialize};

/// Tri-state result of a nonce check.
///
/// Tokens stay valid for two ticks. A token minted in the current tick verifies as
/// `Current`, one minted in the tick before as `Previous`. The discriminants match the
/// raw codes (`0`, `1`, `2`) hosts traditionally return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Verification {
    Invalid = 0,
    Current = 1,
    Previous = 2,
}

impl Verification {
    /// `true` for `Current` and `Previous`.
    pub fn is_valid(self) -> bool {
        self != Verification::Invalid
    }

    /// Raw tri-state code.
    pub fn code(self) -> i32 {
        self as i32
    }
}

impl From<Verification> for i32 {
    fn from(value: Verification) -> Self {
        value.code()
    }
}

// ==========Tests==========
#[cfg(test)]
mod tests {
    use super::Verification;

    #[test]
    fn test_verification_codes() {
        assert_eq!(Verification::Invalid.code(), 0);
        assert_eq!(Verification::Current.code(), 1);
        assert_eq!(i32::from(Verification::Previous), 2);
    }

    #[test]
    fn test_verification_is_valid() {
        assert!(!Verification::Invalid.is_valid());
        assert!(Verification::Current.is_valid());
        assert!(Verification::Previous.is_valid());
    }
}
