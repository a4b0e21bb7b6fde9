//! Detached message signatures.
//!
//! A signature record binds plaintext to a message identity: the signed
//! digest is a domain-separated hash over the message bytes, the message
//! id, and the timestamp, so a valid signature cannot be replayed against
//! different content or under a different envelope.
//!
//! Verification fails closed: wrong key id, malformed input, and
//! cryptographic mismatch all return `false`, never an error or panic.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use cachet_crypto::{Hash256, SignatureBytes};
use cachet_keys::{KeyId, PrivateKeyBundle, PublicKeyBundle};

use crate::envelope::MessageId;

/// Domain separator for message signatures.
///
/// Keeps signed message digests from colliding with any other hash use in
/// the protocol.
pub const SIGNING_DOMAIN: &[u8] = b"CACHET-MESSAGE-SIGNATURE-v1";

/// A detached signature over (message, message id, timestamp).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureRecord {
    /// The Ed25519 signature.
    pub signature: SignatureBytes,
    /// Key id of the bundle that produced the signature.
    pub key_id: KeyId,
    /// The message id the signature is bound to.
    pub message_id: MessageId,
    /// The timestamp the signature is bound to (unix seconds).
    pub created_at: i64,
}

impl SignatureRecord {
    /// Sign a standalone message under a fresh message id and timestamp.
    ///
    /// The envelope path uses [`SignatureRecord::sign_with_context`]
    /// instead, binding the envelope's own id and timestamp.
    pub fn sign(message: &[u8], signer: &PrivateKeyBundle) -> Self {
        Self::sign_with_context(message, MessageId::generate(), Utc::now().timestamp(), signer)
    }

    /// Sign a message bound to an existing message id and timestamp.
    pub fn sign_with_context(
        message: &[u8],
        message_id: MessageId,
        created_at: i64,
        signer: &PrivateKeyBundle,
    ) -> Self {
        let digest = signing_digest(message, &message_id, created_at);
        let signature = signer.signing_key().sign(digest.as_bytes());

        Self {
            signature,
            key_id: *signer.key_id(),
            message_id,
            created_at,
        }
    }

    /// Verify this record against a message and the signer's public bundle.
    ///
    /// Fails closed: returns `false` on a key id mismatch as well as on
    /// cryptographic verification failure.
    pub fn verify(&self, message: &[u8], signer: &PublicKeyBundle) -> bool {
        if self.key_id != signer.key_id {
            return false;
        }

        let digest = signing_digest(message, &self.message_id, self.created_at);
        signer.signing.verify(digest.as_bytes(), &self.signature).is_ok()
    }
}

/// Compute the signed digest for a message in its envelope context.
fn signing_digest(message: &[u8], message_id: &MessageId, created_at: i64) -> Hash256 {
    Hash256::hash_many(&[
        SIGNING_DOMAIN,
        message,
        message_id.as_bytes(),
        &created_at.to_be_bytes(),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE_TIME: i64 = 1710000000;

    fn test_signer() -> PrivateKeyBundle {
        PrivateKeyBundle::generate_at(BASE_TIME).unwrap()
    }

    #[test]
    fn test_sign_verify_roundtrip() {
        let signer = test_signer();
        let record = SignatureRecord::sign(b"hello", &signer);

        assert!(record.verify(b"hello", signer.public()));
        assert_eq!(record.key_id, *signer.key_id());
    }

    #[test]
    fn test_sign_with_context_binds_envelope_identity() {
        let signer = test_signer();
        let message_id = MessageId::generate();
        let record =
            SignatureRecord::sign_with_context(b"hello", message_id, BASE_TIME, &signer);

        assert_eq!(record.message_id, message_id);
        assert_eq!(record.created_at, BASE_TIME);
        assert!(record.verify(b"hello", signer.public()));
    }

    #[test]
    fn test_verify_fails_for_different_message() {
        let signer = test_signer();
        let record = SignatureRecord::sign(b"original", &signer);

        assert!(!record.verify(b"different", signer.public()));
    }

    #[test]
    fn test_verify_fails_for_different_message_id() {
        let signer = test_signer();
        let mut record = SignatureRecord::sign(b"message", &signer);
        record.message_id = MessageId::generate();

        assert!(!record.verify(b"message", signer.public()));
    }

    #[test]
    fn test_verify_fails_for_different_timestamp() {
        let signer = test_signer();
        let mut record =
            SignatureRecord::sign_with_context(b"message", MessageId::generate(), BASE_TIME, &signer);
        record.created_at += 1;

        assert!(!record.verify(b"message", signer.public()));
    }

    #[test]
    fn test_verify_fails_for_wrong_signer() {
        let signer = test_signer();
        let imposter = test_signer();
        let record = SignatureRecord::sign(b"message", &signer);

        assert!(!record.verify(b"message", imposter.public()));
    }

    #[test]
    fn test_verify_fails_for_mismatched_key_id() {
        let signer = test_signer();
        let mut record = SignatureRecord::sign(b"message", &signer);
        record.key_id = cachet_keys::KeyId::generate();

        // Structural mismatch fails closed, no panic
        assert!(!record.verify(b"message", signer.public()));
    }

    #[test]
    fn test_verify_fails_for_tampered_signature() {
        let signer = test_signer();
        let mut record = SignatureRecord::sign(b"message", &signer);

        let mut bytes = *record.signature.as_bytes();
        bytes[0] ^= 0xFF;
        record.signature = SignatureBytes::from_bytes(&bytes).unwrap();

        assert!(!record.verify(b"message", signer.public()));
    }

    #[test]
    fn test_record_serde_roundtrip() {
        let signer = test_signer();
        let record = SignatureRecord::sign(b"wire", &signer);

        let json = serde_json::to_string(&record).unwrap();
        let restored: SignatureRecord = serde_json::from_str(&json).unwrap();

        assert_eq!(record, restored);
        assert!(restored.verify(b"wire", signer.public()));
    }
}
