//! BLAKE3 hashing primitives.
//!
//! Provides a 256-bit hash type with hex serialization support.

use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

/// A 256-bit (32-byte) hash value using BLAKE3.
#[derive(Clone, Default, Serialize, Deserialize, Zeroize)]
pub struct Hash256([u8; 32]);

impl Hash256 {
    /// Hash size in bytes.
    pub const SIZE: usize = 32;

    /// Create a Hash256 from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not exactly 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> crate::Result<Self> {
        if bytes.len() != Self::SIZE {
            return Err(crate::CryptoError::InvalidHashLength {
                expected: Self::SIZE,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(bytes);
        Ok(Self(arr))
    }

    /// Get the hash as a byte slice.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to owned byte array.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0
    }

    /// Hash a single input.
    pub fn hash(data: &[u8]) -> Self {
        let hash = blake3::hash(data);
        Self(*hash.as_bytes())
    }

    /// Hash multiple inputs with length prefixes.
    ///
    /// Each input is length-prefixed to prevent ambiguity between
    /// concatenations.
    pub fn hash_many(inputs: &[&[u8]]) -> Self {
        let mut hasher = blake3::Hasher::new();
        for input in inputs {
            hasher.update(&(input.len() as u64).to_le_bytes());
            hasher.update(input);
        }
        let hash = hasher.finalize();
        Self(*hash.as_bytes())
    }

    /// Derive a key from this hash using BLAKE3 key derivation.
    pub fn derive_key(&self, context: &str) -> [u8; 32] {
        blake3::derive_key(context, &self.0)
    }

    /// Check if this hash is all zeros.
    ///
    /// Uses constant-time comparison to prevent timing side-channels.
    pub fn is_zero(&self) -> bool {
        self.0.ct_eq(&[0u8; 32]).into()
    }

    /// Format as hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not a valid 64-character hex string.
    pub fn from_hex(s: &str) -> crate::Result<Self> {
        let bytes = hex::decode(s)
            .map_err(|e| crate::CryptoError::InvalidEncoding(format!("invalid hex: {}", e)))?;
        Self::from_bytes(&bytes)
    }
}

impl PartialEq for Hash256 {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl Eq for Hash256 {}

impl std::fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Hash256({}...)", &self.to_hex()[..8])
    }
}

impl std::fmt::Display for Hash256 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_deterministic() {
        let h1 = Hash256::hash(b"cachet");
        let h2 = Hash256::hash(b"cachet");
        assert_eq!(h1, h2);
    }

    #[test]
    fn test_hash_different_inputs() {
        assert_ne!(Hash256::hash(b"a"), Hash256::hash(b"b"));
    }

    #[test]
    fn test_hash_many_length_prefixing() {
        // Without length prefixes these would collide
        let h1 = Hash256::hash_many(&[b"ab", b"c"]);
        let h2 = Hash256::hash_many(&[b"a", b"bc"]);
        assert_ne!(h1, h2);
    }

    #[test]
    fn test_hex_roundtrip() {
        let hash = Hash256::hash(b"roundtrip");
        let hex = hash.to_hex();
        assert_eq!(hex.len(), 64);
        let restored = Hash256::from_hex(&hex).unwrap();
        assert_eq!(hash, restored);
    }

    #[test]
    fn test_from_hex_invalid() {
        assert!(Hash256::from_hex("zz").is_err());
        assert!(Hash256::from_hex("ab").is_err());
    }

    #[test]
    fn test_bytes_roundtrip() {
        let hash = Hash256::hash(b"bytes");
        let restored = Hash256::from_bytes(&hash.to_bytes()).unwrap();
        assert_eq!(hash, restored);
    }

    #[test]
    fn test_from_bytes_invalid_length() {
        let result = Hash256::from_bytes(&[0u8; 16]);
        assert!(matches!(
            result,
            Err(crate::CryptoError::InvalidHashLength {
                expected: 32,
                actual: 16
            })
        ));
    }

    #[test]
    fn test_is_zero() {
        assert!(Hash256::default().is_zero());
        assert!(!Hash256::hash(b"not zero").is_zero());
    }

    #[test]
    fn test_derive_key_different_contexts() {
        let hash = Hash256::hash(b"secret");
        let k1 = hash.derive_key("cachet context a");
        let k2 = hash.derive_key("cachet context b");
        assert_ne!(k1, k2);
    }

    #[test]
    fn test_debug_truncated() {
        let hash = Hash256::hash(b"debug");
        let debug = format!("{:?}", hash);
        assert!(debug.contains("Hash256"));
        assert!(debug.contains("..."));
    }
}
