//! X25519 Diffie-Hellman key agreement.
//!
//! Provides the agreement half of the hybrid protocol: long-term static
//! agreement keys published in a key bundle, and single-use ephemeral key
//! pairs generated per message for forward secrecy.
//!
//! ## Security Notes
//!
//! - Private keys are zeroized on drop
//! - Uses OsRng for key generation
//! - Received public keys must pass [`validate_agreement_key`] before any
//!   DH computation (rejects low-order points)

use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use x25519_dalek::{EphemeralSecret, PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{codec, CryptoError, Result};

/// Size of X25519 public key in bytes.
pub const PUBLIC_KEY_SIZE: usize = 32;

/// Size of X25519 private key in bytes.
pub const PRIVATE_KEY_SIZE: usize = 32;

/// Size of shared secret in bytes.
pub const SHARED_SECRET_SIZE: usize = 32;

/// Known low-order points on Curve25519 that must be rejected.
///
/// Using these in ECDH yields a zero or predictable shared secret.
const LOW_ORDER_POINTS: [[u8; 32]; 8] = [
    // Point at infinity (order 1)
    [
        0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
        0, 0,
    ],
    // Point of order 8
    [
        1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
        0, 0,
    ],
    // Other low-order points (orders 2, 4, 8)
    [
        0xe0, 0xeb, 0x7a, 0x7c, 0x3b, 0x41, 0xb8, 0xae, 0x16, 0x56, 0xe3, 0xfa, 0xf1, 0x9f, 0xc4,
        0x6a, 0xda, 0x09, 0x8d, 0xeb, 0x9c, 0x32, 0xb1, 0xfd, 0x86, 0x62, 0x05, 0x16, 0x5f, 0x49,
        0xb8, 0x00,
    ],
    [
        0x5f, 0x9c, 0x95, 0xbc, 0xa3, 0x50, 0x8c, 0x24, 0xb1, 0xd0, 0xb1, 0x55, 0x9c, 0x83, 0xef,
        0x5b, 0x04, 0x44, 0x5c, 0xc4, 0x58, 0x1c, 0x8e, 0x86, 0xd8, 0x22, 0x4e, 0xdd, 0xd0, 0x9f,
        0x11, 0x57,
    ],
    [
        0xec, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
        0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
        0xff, 0x7f,
    ],
    [
        0xed, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
        0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
        0xff, 0x7f,
    ],
    [
        0xee, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
        0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
        0xff, 0x7f,
    ],
    // Non-canonical point (x >= p, the field prime)
    [
        0xed, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
        0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
        0xff, 0xff,
    ],
];

/// Validate a received X25519 public key before use in ECDH.
///
/// Rejects the all-zero key and known low-order points, using
/// constant-time comparison throughout.
///
/// # Errors
///
/// Returns `CryptoError::InvalidPublicKey` for a rejected key. The error
/// is intentionally cause-free.
pub fn validate_agreement_key(key: &AgreementPublicKey) -> Result<()> {
    let bytes = key.as_bytes();

    for low_order in &LOW_ORDER_POINTS {
        if bool::from(bytes.ct_eq(low_order)) {
            return Err(CryptoError::InvalidPublicKey);
        }
    }

    Ok(())
}

/// X25519 public key for key agreement.
///
/// Serializes as a Base64 string on the wire.
#[derive(Clone, PartialEq, Eq)]
pub struct AgreementPublicKey {
    bytes: [u8; PUBLIC_KEY_SIZE],
}

impl AgreementPublicKey {
    /// Create from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not exactly 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != PUBLIC_KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength {
                expected: PUBLIC_KEY_SIZE,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; PUBLIC_KEY_SIZE];
        arr.copy_from_slice(bytes);
        Ok(Self { bytes: arr })
    }

    /// Get the key as bytes.
    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.bytes
    }

    /// Convert to byte array.
    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_SIZE] {
        self.bytes
    }
}

impl std::fmt::Debug for AgreementPublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "AgreementPublicKey({:02x}{:02x}..)",
            self.bytes[0], self.bytes[1]
        )
    }
}

impl Serialize for AgreementPublicKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        codec::serialize_b64(&self.bytes, serializer)
    }
}

impl<'de> Deserialize<'de> for AgreementPublicKey {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        Ok(Self {
            bytes: codec::deserialize_b64_array(deserializer)?,
        })
    }
}

impl From<PublicKey> for AgreementPublicKey {
    fn from(key: PublicKey) -> Self {
        Self {
            bytes: key.to_bytes(),
        }
    }
}

impl From<&AgreementPublicKey> for PublicKey {
    fn from(key: &AgreementPublicKey) -> Self {
        PublicKey::from(key.bytes)
    }
}

/// X25519 static private key for long-term agreement.
///
/// Use this for the agreement half of a key bundle. Intentionally not
/// `Clone`: secret material should not be silently duplicated.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct AgreementPrivateKey {
    bytes: [u8; PRIVATE_KEY_SIZE],
}

impl AgreementPrivateKey {
    /// Generate a new random private key.
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        Self {
            bytes: secret.to_bytes(),
        }
    }

    /// Create from raw bytes.
    ///
    /// # Security
    ///
    /// Only use bytes from a secure source.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != PRIVATE_KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength {
                expected: PRIVATE_KEY_SIZE,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; PRIVATE_KEY_SIZE];
        arr.copy_from_slice(bytes);
        Ok(Self { bytes: arr })
    }

    /// Get the corresponding public key.
    pub fn public_key(&self) -> AgreementPublicKey {
        let secret = StaticSecret::from(self.bytes);
        AgreementPublicKey::from(PublicKey::from(&secret))
    }

    /// Perform Diffie-Hellman key agreement with a peer public key.
    pub fn diffie_hellman(&self, peer_public: &AgreementPublicKey) -> SharedSecret {
        let secret = StaticSecret::from(self.bytes);
        let shared = secret.diffie_hellman(&PublicKey::from(peer_public));
        SharedSecret {
            bytes: shared.to_bytes(),
        }
    }

    /// Get raw bytes (for encrypted-at-rest serialization only).
    ///
    /// # Security
    ///
    /// Handle with care - this exposes the private key.
    pub fn as_bytes(&self) -> &[u8; PRIVATE_KEY_SIZE] {
        &self.bytes
    }
}

impl std::fmt::Debug for AgreementPrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AgreementPrivateKey([REDACTED])")
    }
}

/// Single-use X25519 key pair for per-message agreement.
///
/// The private half is consumed by [`EphemeralAgreement::diffie_hellman`]
/// and cannot be used twice.
pub struct EphemeralAgreement {
    secret: EphemeralSecret,
    public: AgreementPublicKey,
}

impl EphemeralAgreement {
    /// Generate a new ephemeral key pair.
    pub fn generate() -> Self {
        let secret = EphemeralSecret::random_from_rng(OsRng);
        let public = AgreementPublicKey::from(PublicKey::from(&secret));
        Self { secret, public }
    }

    /// Get the public key to embed in envelope metadata.
    pub fn public_key(&self) -> &AgreementPublicKey {
        &self.public
    }

    /// Perform Diffie-Hellman and consume the ephemeral key.
    ///
    /// The private key is destroyed after this operation.
    pub fn diffie_hellman(self, peer_public: &AgreementPublicKey) -> SharedSecret {
        let shared = self.secret.diffie_hellman(&PublicKey::from(peer_public));
        SharedSecret {
            bytes: shared.to_bytes(),
        }
    }
}

impl std::fmt::Debug for EphemeralAgreement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EphemeralAgreement {{ public: {:?} }}", self.public)
    }
}

/// Shared secret derived from Diffie-Hellman key agreement.
///
/// Always run through [`SharedSecret::derive_key`] with a context string;
/// never use the raw secret as an encryption key.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SharedSecret {
    bytes: [u8; SHARED_SECRET_SIZE],
}

impl SharedSecret {
    /// Get the shared secret as bytes.
    pub fn as_bytes(&self) -> &[u8; SHARED_SECRET_SIZE] {
        &self.bytes
    }

    /// Derive an encryption key using BLAKE3 key derivation.
    pub fn derive_key(&self, context: &str) -> [u8; 32] {
        blake3::derive_key(context, &self.bytes)
    }
}

impl std::fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SharedSecret([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_key_agreement() {
        let alice = AgreementPrivateKey::generate();
        let bob = AgreementPrivateKey::generate();

        let alice_shared = alice.diffie_hellman(&bob.public_key());
        let bob_shared = bob.diffie_hellman(&alice.public_key());

        assert_eq!(alice_shared.as_bytes(), bob_shared.as_bytes());
    }

    #[test]
    fn test_ephemeral_against_static() {
        let recipient = AgreementPrivateKey::generate();
        let ephemeral = EphemeralAgreement::generate();
        let ephemeral_public = ephemeral.public_key().clone();

        let sender_shared = ephemeral.diffie_hellman(&recipient.public_key());
        let recipient_shared = recipient.diffie_hellman(&ephemeral_public);

        assert_eq!(sender_shared.as_bytes(), recipient_shared.as_bytes());
    }

    #[test]
    fn test_different_peers_different_secrets() {
        let alice = AgreementPrivateKey::generate();
        let bob = AgreementPrivateKey::generate();
        let carol = AgreementPrivateKey::generate();

        let shared_ab = alice.diffie_hellman(&bob.public_key());
        let shared_ac = alice.diffie_hellman(&carol.public_key());

        assert_ne!(shared_ab.as_bytes(), shared_ac.as_bytes());
    }

    #[test]
    fn test_derive_key_context_separation() {
        let alice = AgreementPrivateKey::generate();
        let bob = AgreementPrivateKey::generate();
        let shared = alice.diffie_hellman(&bob.public_key());

        let k1 = shared.derive_key("cachet message key wrap v1");
        let k2 = shared.derive_key("cachet transport seal v1");
        assert_ne!(k1, k2);
    }

    #[test]
    fn test_private_key_bytes_roundtrip() {
        let original = AgreementPrivateKey::generate();
        let restored = AgreementPrivateKey::from_bytes(original.as_bytes()).unwrap();
        assert_eq!(original.public_key(), restored.public_key());
    }

    #[test]
    fn test_public_key_serde_roundtrip() {
        let key = AgreementPrivateKey::generate().public_key();
        let json = serde_json::to_string(&key).unwrap();
        let restored: AgreementPublicKey = serde_json::from_str(&json).unwrap();
        assert_eq!(key, restored);
    }

    #[test]
    fn test_invalid_key_length() {
        assert!(AgreementPublicKey::from_bytes(&[0u8; 16]).is_err());
        assert!(AgreementPrivateKey::from_bytes(&[0u8; 16]).is_err());
    }

    #[test]
    fn test_validate_rejects_zero_key() {
        let zero = AgreementPublicKey::from_bytes(&[0u8; 32]).unwrap();
        assert!(matches!(
            validate_agreement_key(&zero),
            Err(CryptoError::InvalidPublicKey)
        ));
    }

    #[test]
    fn test_validate_rejects_low_order_points() {
        for point in &LOW_ORDER_POINTS {
            let key = AgreementPublicKey::from_bytes(point).unwrap();
            assert!(validate_agreement_key(&key).is_err());
        }
    }

    #[test]
    fn test_validate_accepts_real_keys() {
        for _ in 0..8 {
            let key = AgreementPrivateKey::generate().public_key();
            assert!(validate_agreement_key(&key).is_ok());
        }
    }

    #[test]
    fn test_debug_redacted() {
        let private = AgreementPrivateKey::generate();
        assert!(format!("{:?}", private).contains("REDACTED"));

        let shared = private.diffie_hellman(&AgreementPrivateKey::generate().public_key());
        assert!(format!("{:?}", shared).contains("REDACTED"));
    }
}
