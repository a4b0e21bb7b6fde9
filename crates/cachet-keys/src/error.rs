//! Error types for key bundle operations.

use thiserror::Error;

/// Errors that can occur during key bundle operations.
#[derive(Error, Debug)]
pub enum KeyError {
    /// Cryptographic operation failed.
    #[error("Crypto error: {0}")]
    Crypto(#[from] cachet_crypto::CryptoError),

    /// Key pair generation failed; no partial bundle is returned.
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    /// Password unwrap failed.
    ///
    /// Wrong password and corrupted blob are indistinguishable by design.
    #[error("Incorrect password or corrupted key blob")]
    PasswordIncorrect,

    /// Blob format version is not supported by this client.
    #[error("Unsupported blob format version: {found}")]
    UnsupportedBlobFormat {
        /// Version found in the blob.
        found: u32,
    },

    /// Version string failed to parse.
    #[error("Invalid version string: {0}")]
    InvalidVersion(String),

    /// Key id failed to parse.
    #[error("Invalid key id: {0}")]
    InvalidKeyId(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for key bundle operations.
pub type Result<T> = std::result::Result<T, KeyError>;
