use serde::{Deserialize, Serialize};

/// A 16-byte identifier binding every protocol message to one session
/// configuration.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfigDigest(pub [u8; 16]);

impl ConfigDigest {
    /// The all-zero digest used to mark an uninitialised contract.
    pub const ZERO: Self = Self([0u8; 16]);

    /// `true` if this is the all-zero digest.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self == &Self::ZERO
    }
}

impl std::fmt::Debug for ConfigDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ConfigDigest(0x{})", hex::encode(self.0))
    }
}

impl std::fmt::Display for ConfigDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl From<[u8; 16]> for ConfigDigest {
    fn from(value: [u8; 16]) -> Self {
        Self(value)
    }
}

impl AsRef<[u8]> for ConfigDigest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::ConfigDigest;

    #[test]
    fn zero_digest_is_zero() {
        assert!(ConfigDigest::ZERO.is_zero());
        assert!(!ConfigDigest::from([1u8; 16]).is_zero());
    }

    #[test]
    fn debug_and_display_are_hex() {
        let digest = ConfigDigest::from([0xabu8; 16]);
        assert_eq!(format!("{digest}"), format!("0x{}", "ab".repeat(16)));
        assert!(format!("{digest:?}").contains("ab"));
    }
}
