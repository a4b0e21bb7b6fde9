//! # cachet-crypto
//!
//! Cryptographic primitives for the cachet message encryption core.
//!
//! This crate provides the algorithm suite used by the envelope protocol:
//! - **XChaCha20-Poly1305** for authenticated symmetric encryption
//! - **X25519** for ephemeral key agreement (forward secrecy)
//! - **Sealed boxes** over X25519 for key transport to a long-term key
//! - **Ed25519** for detached signatures
//! - **BLAKE3** for hashing and key derivation
//! - **Argon2id** for password key derivation
//!
//! ## Security
//!
//! All secret data uses `zeroize` for secure memory cleanup.
//! All comparisons of secrets use constant-time operations via `subtle`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod aead;
pub mod agree;
pub mod codec;
pub mod error;
pub mod hash;
pub mod kdf;
pub mod seal;
pub mod sign;

pub use aead::{EncryptedData, Nonce, SymmetricKey, KEY_SIZE, NONCE_SIZE, TAG_SIZE};
pub use agree::{
    validate_agreement_key, AgreementPrivateKey, AgreementPublicKey, EphemeralAgreement,
    SharedSecret,
};
pub use error::{CryptoError, Result};
pub use hash::Hash256;
pub use kdf::{derive_password_key, KdfParams};
pub use seal::{SealedBox, TransportPrivateKey, TransportPublicKey};
pub use sign::{SignatureBytes, SigningPrivateKey, SigningPublicKey};
