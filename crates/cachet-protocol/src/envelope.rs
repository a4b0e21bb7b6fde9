//! The envelope wire structure.
//!
//! An envelope is the self-contained encrypted representation of one
//! message: the AEAD ciphertext, the per-recipient wrapped message keys,
//! the metadata needed to unwrap and decrypt, and an optional detached
//! signature. All binary fields are Base64-armored so the JSON form can
//! cross the transport boundary; the version tag travels end-to-end so
//! old and new clients detect incompatibility instead of mis-decrypting.

use std::collections::BTreeMap;

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use cachet_crypto::{codec, validate_agreement_key, AgreementPublicKey, Nonce, SealedBox};
use cachet_keys::{BundleVersion, KeyId};

use crate::signing::SignatureRecord;
use crate::{ProtocolError, Result};

/// Size of a message id in bytes.
pub const MESSAGE_ID_SIZE: usize = 16;

/// Maximum size of a serialized envelope in bytes.
///
/// Checked before deserialization so crafted input cannot force a large
/// allocation. Generous enough for a broadcast envelope with many
/// recipients.
pub const MAX_ENVELOPE_SIZE: usize = 256 * 1024;

/// Random, globally unique identifier for one envelope.
///
/// Doubles as AEAD associated data and as the replay-detection key;
/// displayed and serialized as lowercase hex.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageId([u8; MESSAGE_ID_SIZE]);

impl MessageId {
    /// Generate a fresh random message id.
    pub fn generate() -> Self {
        let mut bytes = [0u8; MESSAGE_ID_SIZE];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes.
    pub fn from_bytes(bytes: [u8; MESSAGE_ID_SIZE]) -> Self {
        Self(bytes)
    }

    /// Get the id as bytes.
    pub fn as_bytes(&self) -> &[u8; MESSAGE_ID_SIZE] {
        &self.0
    }

    /// Format as hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from a 32-character hex string.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::InvalidEnvelope` for malformed input.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s)
            .map_err(|_| ProtocolError::InvalidEnvelope(format!("invalid message id: {}", s)))?;
        let arr: [u8; MESSAGE_ID_SIZE] = bytes
            .try_into()
            .map_err(|_| ProtocolError::InvalidEnvelope(format!("invalid message id: {}", s)))?;
        Ok(Self(arr))
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl std::fmt::Debug for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MessageId({}...)", &self.to_hex()[..8])
    }
}

impl Serialize for MessageId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for MessageId {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// The algorithm suite an envelope was produced under.
///
/// Exactly one coherent suite per protocol version; a new suite gets a new
/// tag rather than parameter drift inside an old one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CipherSuite {
    /// X25519 sealed-box transport + X25519 ephemeral agreement +
    /// Ed25519 signatures + XChaCha20-Poly1305 AEAD + BLAKE3 KDF.
    #[default]
    #[serde(rename = "x25519-xchacha20-ed25519-v1")]
    X25519Ed25519V1,
}

impl CipherSuite {
    /// The suite identifier string carried on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            CipherSuite::X25519Ed25519V1 => "x25519-xchacha20-ed25519-v1",
        }
    }
}

impl std::fmt::Display for CipherSuite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Envelope metadata: everything the recipient needs besides the
/// ciphertext and wrapped keys.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EnvelopeMetadata {
    /// Bundle schema version the sender produced this envelope under.
    pub version: BundleVersion,
    /// Declared algorithm suite.
    pub suite: CipherSuite,
    /// Globally unique message identifier.
    pub message_id: MessageId,
    /// Unix timestamp (seconds) when the envelope was created.
    pub created_at: i64,
    /// Sender's per-message ephemeral agreement public key.
    pub ephemeral_public: AgreementPublicKey,
    /// Nonce N1 used for the stage-1 key wrap.
    pub key_wrap_nonce: Nonce,
    /// Nonce N2 used for the message ciphertext.
    pub message_nonce: Nonce,
    /// Key id of the signer, when a signature is attached.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signer_key_id: Option<KeyId>,
}

/// The self-contained encrypted representation of one message.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope {
    /// Unwrap/decrypt metadata.
    pub metadata: EnvelopeMetadata,
    /// Wrapped message key per recipient key id.
    ///
    /// A pairwise envelope carries exactly one entry; a broadcast envelope
    /// carries one per eligible recipient.
    pub wrapped_keys: BTreeMap<KeyId, SealedBox>,
    /// AEAD ciphertext of the plaintext under the message key.
    #[serde(with = "codec::b64")]
    pub ciphertext: Vec<u8>,
    /// Optional detached signature over (plaintext, message id, timestamp).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<SignatureRecord>,
}

impl Envelope {
    /// The recipient key ids this envelope is addressed to.
    pub fn recipient_key_ids(&self) -> impl Iterator<Item = &KeyId> {
        self.wrapped_keys.keys()
    }

    /// Whether the envelope carries a wrapped key for the given key id.
    pub fn is_addressed_to(&self, key_id: &KeyId) -> bool {
        self.wrapped_keys.contains_key(key_id)
    }

    /// Check structural invariants.
    ///
    /// Validates the ephemeral key before it can reach any DH computation,
    /// and rejects envelopes with no ciphertext or no wrapped keys. The
    /// contents themselves are only validated by decryption.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::InvalidEnvelope` if validation fails.
    pub fn validate(&self) -> Result<()> {
        validate_agreement_key(&self.metadata.ephemeral_public)
            .map_err(|_| ProtocolError::InvalidEnvelope("invalid ephemeral key".to_string()))?;

        if self.ciphertext.is_empty() {
            return Err(ProtocolError::InvalidEnvelope(
                "ciphertext is empty".to_string(),
            ));
        }

        if self.wrapped_keys.is_empty() {
            return Err(ProtocolError::InvalidEnvelope(
                "no wrapped keys".to_string(),
            ));
        }

        Ok(())
    }

    /// Serialize to the JSON transport form.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Serialization(e.to_string()))
    }

    /// Deserialize from the JSON transport form.
    ///
    /// Checks the input size before parsing and validates the envelope
    /// structure after.
    pub fn from_json(json: &str) -> Result<Self> {
        if json.len() > MAX_ENVELOPE_SIZE {
            return Err(ProtocolError::InvalidEnvelope(format!(
                "envelope too large: {} bytes (max: {})",
                json.len(),
                MAX_ENVELOPE_SIZE
            )));
        }

        let envelope: Self =
            serde_json::from_str(json).map_err(|e| ProtocolError::Serialization(e.to_string()))?;
        envelope.validate()?;
        Ok(envelope)
    }
}
