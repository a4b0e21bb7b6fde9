//! Error types for envelope protocol operations.

use thiserror::Error;

use cachet_keys::BundleVersion;

/// Errors that can occur during envelope protocol operations.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Cryptographic operation failed.
    #[error("Crypto error: {0}")]
    Crypto(#[from] cachet_crypto::CryptoError),

    /// Key bundle error.
    #[error("Key error: {0}")]
    Key(#[from] cachet_keys::KeyError),

    /// Recipient bundle or envelope is below the minimum supported version.
    ///
    /// Surfaced to the caller as "refresh keys" guidance; never silently
    /// downgraded.
    #[error("Incompatible key version: {found} (minimum {minimum})")]
    IncompatibleKeyVersion {
        /// Version found on the bundle or envelope.
        found: BundleVersion,
        /// Minimum version this client accepts.
        minimum: BundleVersion,
    },

    /// The envelope carries no wrapped key for the expected recipient key.
    ///
    /// Integrity signal: the ciphertext was wrapped for a different
    /// (possibly rotated-out) key under the same account.
    #[error("Envelope is not addressed to this key")]
    NotAddressedToThisKey,

    /// Decryption failed.
    ///
    /// AEAD authentication failure, wrong key, and corruption are
    /// indistinguishable by design; no partial plaintext is exposed.
    #[error("Failed to decrypt message")]
    DecryptionFailed,

    /// Signature verification failed for returned content.
    #[error("Invalid signature")]
    SignatureInvalid,

    /// Broadcast encryption found no recipient at or above the minimum
    /// key version.
    #[error("No eligible recipients")]
    NoEligibleRecipients,

    /// Invalid envelope structure.
    #[error("Invalid envelope: {0}")]
    InvalidEnvelope(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for envelope protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;
