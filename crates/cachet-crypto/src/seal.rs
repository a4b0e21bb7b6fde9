//! Sealed-box key transport.
//!
//! Asymmetric encryption to a long-term transport public key: the sender
//! generates an internal single-use X25519 key pair, agrees with the
//! recipient's transport key, derives an AEAD key, and encrypts the
//! payload. Only the holder of the transport private key can open the box.
//!
//! This fills the key-transport role of the two-stage wrap: the message
//! key is first wrapped under the per-message agreement-derived key, and
//! the result is sealed under the recipient's transport key. Compromise of
//! the long-term transport private key alone is not enough to recover a
//! message key, and vice versa.

use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use x25519_dalek::{EphemeralSecret, PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::aead::{decrypt_with_aad, encrypt_with_aad, EncryptedData, SymmetricKey};
use crate::{codec, CryptoError, Result};

/// Size of a transport key in bytes.
pub const TRANSPORT_KEY_SIZE: usize = 32;

/// Domain separator for the sealed-box key derivation.
const SEAL_CONTEXT: &str = "cachet transport seal v1";

/// Long-term X25519 public key in the key-transport role.
///
/// Serializes as a Base64 string on the wire.
#[derive(Clone, PartialEq, Eq)]
pub struct TransportPublicKey {
    bytes: [u8; TRANSPORT_KEY_SIZE],
}

impl TransportPublicKey {
    /// Create from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not exactly 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != TRANSPORT_KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength {
                expected: TRANSPORT_KEY_SIZE,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; TRANSPORT_KEY_SIZE];
        arr.copy_from_slice(bytes);
        Ok(Self { bytes: arr })
    }

    /// Get the key as bytes.
    pub fn as_bytes(&self) -> &[u8; TRANSPORT_KEY_SIZE] {
        &self.bytes
    }
}

impl std::fmt::Debug for TransportPublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "TransportPublicKey({:02x}{:02x}..)",
            self.bytes[0], self.bytes[1]
        )
    }
}

impl Serialize for TransportPublicKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        codec::serialize_b64(&self.bytes, serializer)
    }
}

impl<'de> Deserialize<'de> for TransportPublicKey {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        Ok(Self {
            bytes: codec::deserialize_b64_array(deserializer)?,
        })
    }
}

/// Long-term X25519 private key in the key-transport role.
///
/// Intentionally not `Clone`; zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct TransportPrivateKey {
    bytes: [u8; TRANSPORT_KEY_SIZE],
}

impl TransportPrivateKey {
    /// Generate a new random transport private key.
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
        if bytes.len() != TRANSPORT_KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength {
                expected: TRANSPORT_KEY_SIZE,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; TRANSPORT_KEY_SIZE];
        arr.copy_from_slice(bytes);
        Ok(Self { bytes: arr })
    }

    /// Get the corresponding public key.
    pub fn public_key(&self) -> TransportPublicKey {
        let secret = StaticSecret::from(self.bytes);
        TransportPublicKey {
            bytes: PublicKey::from(&secret).to_bytes(),
        }
    }

    /// Get raw bytes (for encrypted-at-rest serialization only).
    ///
    /// # Security
    ///
    /// Handle with care - this exposes the private key.
    pub fn as_bytes(&self) -> &[u8; TRANSPORT_KEY_SIZE] {
        &self.bytes
    }
}

impl std::fmt::Debug for TransportPrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TransportPrivateKey([REDACTED])")
    }
}

/// A payload sealed to a transport public key.
#[derive(Clone, Serialize, Deserialize)]
pub struct SealedBox {
    /// Single-use public key generated inside [`seal`].
    #[serde(with = "codec::b64_array")]
    ephemeral: [u8; 32],
    /// Encrypted payload (nonce plus ciphertext with tag).
    sealed: EncryptedData,
}

impl SealedBox {
    /// Get the sealed ciphertext bytes.
    pub fn ciphertext(&self) -> &[u8] {
        &self.sealed.ciphertext
    }

    /// Mutable access to the ciphertext (tamper-testing seam).
    #[doc(hidden)]
    pub fn ciphertext_mut(&mut self) -> &mut Vec<u8> {
        &mut self.sealed.ciphertext
    }
}

impl std::fmt::Debug for SealedBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SealedBox")
            .field("ephemeral", &format!("{:02x}{:02x}..", self.ephemeral[0], self.ephemeral[1]))
            .field("ciphertext_len", &self.sealed.ciphertext.len())
            .finish()
    }
}

/// Seal a payload to a recipient's transport public key.
///
/// A fresh internal key pair is generated per call; its private half never
/// leaves this function.
///
/// # Errors
///
/// Returns `CryptoError::Encryption` if the AEAD operation fails.
pub fn seal(recipient: &TransportPublicKey, plaintext: &[u8], aad: &[u8]) -> Result<SealedBox> {
    let ephemeral_secret = EphemeralSecret::random_from_rng(OsRng);
    let ephemeral_public = PublicKey::from(&ephemeral_secret).to_bytes();

    let shared = ephemeral_secret.diffie_hellman(&PublicKey::from(*recipient.as_bytes()));
    let mut key_bytes = blake3::derive_key(SEAL_CONTEXT, shared.as_bytes());
    let key = SymmetricKey::from_bytes(&key_bytes)?;
    key_bytes.zeroize();

    let sealed = encrypt_with_aad(&key, plaintext, aad)?;

    Ok(SealedBox {
        ephemeral: ephemeral_public,
        sealed,
    })
}

/// Open a sealed box with the transport private key.
///
/// # Errors
///
/// Returns `CryptoError::Decryption` on any authentication failure; wrong
/// key and tampering are indistinguishable.
pub fn open(private: &TransportPrivateKey, sealed: &SealedBox, aad: &[u8]) -> Result<Vec<u8>> {
    let secret = StaticSecret::from(*private.as_bytes());
    let shared = secret.diffie_hellman(&PublicKey::from(sealed.ephemeral));

    let mut key_bytes = blake3::derive_key(SEAL_CONTEXT, shared.as_bytes());
    let key = SymmetricKey::from_bytes(&key_bytes)?;
    key_bytes.zeroize();

    decrypt_with_aad(&key, &sealed.sealed, aad).map_err(|_| CryptoError::Decryption)
}
