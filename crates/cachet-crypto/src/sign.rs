//! Ed25519 digital signatures.
//!
//! Provides the signing half of a key bundle: detached signatures binding
//! plaintext to a message identity, verified against the published signing
//! public key.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::{codec, CryptoError, Result};

/// Size of an Ed25519 public key in bytes.
pub const SIGNING_PUBLIC_KEY_SIZE: usize = 32;

/// Size of an Ed25519 private key seed in bytes.
pub const SIGNING_PRIVATE_KEY_SIZE: usize = 32;

/// Size of an Ed25519 signature in bytes.
pub const SIGNATURE_SIZE: usize = 64;

/// Ed25519 public key for signature verification.
///
/// Serializes as a Base64 string on the wire.
#[derive(Clone, PartialEq, Eq)]
pub struct SigningPublicKey {
    bytes: [u8; SIGNING_PUBLIC_KEY_SIZE],
}

impl SigningPublicKey {
    /// Create from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not exactly 32 bytes or is not a
    /// valid curve point.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != SIGNING_PUBLIC_KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength {
                expected: SIGNING_PUBLIC_KEY_SIZE,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; SIGNING_PUBLIC_KEY_SIZE];
        arr.copy_from_slice(bytes);
        // Reject encodings that are not valid points up front
        VerifyingKey::from_bytes(&arr).map_err(|_| CryptoError::InvalidPublicKey)?;
        Ok(Self { bytes: arr })
    }

    /// Get the key as bytes.
    pub fn as_bytes(&self) -> &[u8; SIGNING_PUBLIC_KEY_SIZE] {
        &self.bytes
    }

    /// Verify a detached signature over a message.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::SignatureVerification` if the signature does
    /// not verify or the key is malformed.
    pub fn verify(&self, message: &[u8], signature: &SignatureBytes) -> Result<()> {
        let key = VerifyingKey::from_bytes(&self.bytes)
            .map_err(|_| CryptoError::SignatureVerification)?;
        let sig = Signature::from_bytes(signature.as_bytes());
        key.verify(message, &sig)
            .map_err(|_| CryptoError::SignatureVerification)
    }
}

impl std::fmt::Debug for SigningPublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "SigningPublicKey({:02x}{:02x}..)",
            self.bytes[0], self.bytes[1]
        )
    }
}

impl Serialize for SigningPublicKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        codec::serialize_b64(&self.bytes, serializer)
    }
}

impl<'de> Deserialize<'de> for SigningPublicKey {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let bytes: [u8; SIGNING_PUBLIC_KEY_SIZE] = codec::deserialize_b64_array(deserializer)?;
        Self::from_bytes(&bytes).map_err(serde::de::Error::custom)
    }
}

/// Ed25519 private key for signing.
///
/// Intentionally not `Clone`. The inner key zeroizes its secret scalar on
/// drop.
pub struct SigningPrivateKey {
    key: SigningKey,
}

impl SigningPrivateKey {
    /// Generate a new random signing key.
    pub fn generate() -> Self {
        Self {
            key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Create from a 32-byte seed.
    ///
    /// # Security
    ///
    /// Only use bytes from a secure source.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != SIGNING_PRIVATE_KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength {
                expected: SIGNING_PRIVATE_KEY_SIZE,
                actual: bytes.len(),
            });
        }
        let mut seed = [0u8; SIGNING_PRIVATE_KEY_SIZE];
        seed.copy_from_slice(bytes);
        Ok(Self {
            key: SigningKey::from_bytes(&seed),
        })
    }

    /// Get the corresponding public key.
    pub fn public_key(&self) -> SigningPublicKey {
        SigningPublicKey {
            bytes: self.key.verifying_key().to_bytes(),
        }
    }

    /// Sign a message, producing a detached signature.
    pub fn sign(&self, message: &[u8]) -> SignatureBytes {
        SignatureBytes {
            bytes: self.key.sign(message).to_bytes(),
        }
    }

    /// Get the seed bytes (for encrypted-at-rest serialization only).
    ///
    /// # Security
    ///
    /// Handle with care - this exposes the private key.
    pub fn as_bytes(&self) -> [u8; SIGNING_PRIVATE_KEY_SIZE] {
        self.key.to_bytes()
    }
}

impl std::fmt::Debug for SigningPrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SigningPrivateKey([REDACTED])")
    }
}

/// A detached Ed25519 signature.
///
/// Serializes as a Base64 string on the wire.
#[derive(Clone)]
pub struct SignatureBytes {
    bytes: [u8; SIGNATURE_SIZE],
}

impl SignatureBytes {
    /// Create from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not exactly 64 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != SIGNATURE_SIZE {
            return Err(CryptoError::InvalidKeyLength {
                expected: SIGNATURE_SIZE,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; SIGNATURE_SIZE];
        arr.copy_from_slice(bytes);
        Ok(Self { bytes: arr })
    }

    /// Get the signature as bytes.
    pub fn as_bytes(&self) -> &[u8; SIGNATURE_SIZE] {
        &self.bytes
    }
}

impl std::fmt::Debug for SignatureBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "SignatureBytes({:02x}{:02x}...)",
            self.bytes[0], self.bytes[1]
        )
    }
}

impl PartialEq for SignatureBytes {
    fn eq(&self, other: &Self) -> bool {
        self.bytes.ct_eq(&other.bytes).into()
    }
}

impl Eq for SignatureBytes {}

impl Serialize for SignatureBytes {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        codec::serialize_b64(&self.bytes, serializer)
    }
}

impl<'de> Deserialize<'de> for SignatureBytes {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        Ok(Self {
            bytes: codec::deserialize_b64_array(deserializer)?,
        })
    }
}
