use zeroize::{Zeroize, ZeroizeOnDrop};

/// A 128-bit session secret, known only to the oracles listed in the
/// configuration it was derived for. Zeroed on drop, since this material
/// must not outlive the `SharedConfig` it parameterizes.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SharedSecret([u8; 16]);

impl SharedSecret {
    /// Wraps a raw 16-byte secret.
    #[must_use]
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Borrows the raw secret bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

// Manual Debug impl: never print the secret itself.
impl std::fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SharedSecret(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::SharedSecret;

    #[test]
    fn debug_does_not_leak_bytes() {
        let secret = SharedSecret::new([0x42u8; 16]);
        assert_eq!(format!("{secret:?}"), "SharedSecret(..)");
    }
}
