//! # cachet-protocol
//!
//! The hybrid envelope protocol of the cachet message encryption core.
//!
//! Each message is protected by a single-use symmetric key which is itself
//! wrapped in two stages: first under a key derived from a per-message
//! ephemeral X25519 agreement with the recipient (forward secrecy), then
//! sealed under the recipient's long-term transport key. The plaintext is
//! AEAD-encrypted under the message key with associated data binding it to
//! the envelope's message id and timestamp, so ciphertext and metadata
//! cannot be mixed and matched. A detached Ed25519 signature optionally
//! binds the plaintext to the message identity.
//!
//! Envelopes are opaque to the transport: it forwards them verbatim and
//! learns nothing about the plaintext.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod encrypt;
pub mod envelope;
pub mod error;
pub mod guard;
pub mod signing;

pub use encrypt::{decrypt, decrypt_at, encrypt_for_many, encrypt_for_one, DecryptedMessage};
pub use envelope::{CipherSuite, Envelope, EnvelopeMetadata, MessageId, MAX_ENVELOPE_SIZE};
pub use error::{ProtocolError, Result};
pub use guard::{is_stale, DEFAULT_MAX_AGE_SECS};
pub use signing::SignatureRecord;
