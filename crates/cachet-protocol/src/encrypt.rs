//! Hybrid envelope encryption and decryption.
//!
//! The pipeline per message:
//!
//! 1. A fresh single-use message key encrypts the plaintext (AEAD, nonce
//!    N2, associated data binding message id and timestamp).
//! 2. A fresh ephemeral X25519 agreement against each recipient's
//!    agreement key derives a key-wrapping key; the message key is
//!    AEAD-wrapped under it (nonce N1, associated data binding the
//!    message id).
//! 3. The stage-1 wrap is sealed under the recipient's long-term
//!    transport key.
//!
//! The two-stage wrap means compromise of the long-term transport private
//! key alone is insufficient without the per-message ephemeral secret,
//! and vice versa. Nothing is retained after return: not the plaintext,
//! not the message key, not the ephemeral private key.

use chrono::Utc;
use zeroize::Zeroizing;

use cachet_crypto::aead::{decrypt_with_nonce, encrypt_with_nonce};
use cachet_crypto::{
    codec, seal, validate_agreement_key, AgreementPrivateKey, EphemeralAgreement, Nonce,
    SharedSecret, SymmetricKey,
};
use cachet_keys::{KeyId, PrivateKeyBundle, PublicKeyBundle};

use crate::envelope::{CipherSuite, Envelope, EnvelopeMetadata, MessageId};
use crate::guard::{ensure_supported_version, is_stale, DEFAULT_MAX_AGE_SECS};
use crate::signing::SignatureRecord;
use crate::{ProtocolError, Result};

/// Domain separator for deriving the key-wrapping key from the ephemeral
/// shared secret.
const KEY_WRAP_CONTEXT: &str = "cachet message key wrap v1";

/// Associated-data domain for the key wrap stages.
const KEY_WRAP_AAD_DOMAIN: &[u8] = b"CACHET-KEY-WRAP-v1";

/// Associated-data domain for the message ciphertext.
const MESSAGE_AAD_DOMAIN: &[u8] = b"CACHET-MESSAGE-v1";

/// Plaintext plus the result descriptor from decryption.
#[derive(Clone, Debug)]
pub struct DecryptedMessage {
    /// The recovered plaintext.
    pub plaintext: String,
    /// True only when a signature was present and verified against the
    /// supplied sender bundle.
    pub verified: bool,
    /// Advisory freshness flag; stale messages are surfaced, not blocked.
    pub stale: bool,
    /// True when a signature was present but failed verification. The
    /// plaintext is still returned - callers decide whether to display
    /// distrusted content.
    pub signature_rejected: bool,
}

impl DecryptedMessage {
    /// Hard-fail variant of the signature flags for callers that refuse
    /// unauthenticated content.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::SignatureInvalid` unless the message
    /// carried a signature that verified.
    pub fn ensure_verified(&self) -> Result<()> {
        if self.verified {
            Ok(())
        } else {
            Err(ProtocolError::SignatureInvalid)
        }
    }
}

/// Encrypt a message for a single recipient.
///
/// When `signer` is supplied, a detached signature over the plaintext,
/// message id, and timestamp is attached and the signer's key id is
/// recorded in the metadata.
///
/// # Errors
///
/// Returns `ProtocolError::IncompatibleKeyVersion` if the recipient
/// bundle is below the minimum supported version, and
/// `ProtocolError::Crypto` if a primitive operation fails.
pub fn encrypt_for_one(
    plaintext: &str,
    recipient: &PublicKeyBundle,
    signer: Option<&PrivateKeyBundle>,
) -> Result<Envelope> {
    // Step 1: Gate the recipient's bundle version
    ensure_supported_version(recipient.version)?;
    validate_agreement_key(&recipient.agreement)?;

    // Step 2: Fresh single-use message key and ephemeral agreement pair
    let message_key = SymmetricKey::generate();
    let ephemeral = EphemeralAgreement::generate();
    let ephemeral_public = ephemeral.public_key().clone();

    let message_id = MessageId::generate();
    let created_at = Utc::now().timestamp();
    let key_wrap_nonce = Nonce::generate();
    let message_nonce = Nonce::generate();

    // Steps 3-5: Two-stage wrap of the message key for the recipient
    let shared = ephemeral.diffie_hellman(&recipient.agreement);
    let wrapped = wrap_message_key(&message_key, shared, &key_wrap_nonce, &message_id, recipient)?;

    // Step 6: Encrypt the plaintext, bound to (message id, timestamp)
    let ciphertext = encrypt_with_nonce(
        &message_key,
        &message_nonce,
        &codec::utf8_encode(plaintext),
        &message_aad(&message_id, created_at),
    )?;

    // Step 7: Optional detached signature
    let signature = signer.map(|s| {
        SignatureRecord::sign_with_context(plaintext.as_bytes(), message_id, created_at, s)
    });

    // Step 8: Assemble the envelope
    Ok(Envelope {
        metadata: EnvelopeMetadata {
            version: cachet_keys::PROTOCOL_VERSION,
            suite: CipherSuite::default(),
            message_id,
            created_at,
            ephemeral_public,
            key_wrap_nonce,
            message_nonce,
            signer_key_id: signer.map(|s| *s.key_id()),
        },
        wrapped_keys: [(recipient.key_id, wrapped)].into_iter().collect(),
        ciphertext,
        signature,
    })
}

/// Encrypt a message once for many recipients.
///
/// One message key and one ciphertext are shared; the key is wrapped
/// independently for every eligible recipient. Recipients below the
/// minimum supported version (or with invalid agreement keys) are
/// skipped - the caller is responsible for telling users about excluded
/// recipients.
///
/// # Errors
///
/// Returns `ProtocolError::NoEligibleRecipients` if the recipient list is
/// empty or every entry was skipped.
pub fn encrypt_for_many(
    plaintext: &str,
    recipients: &[PublicKeyBundle],
    signer: Option<&PrivateKeyBundle>,
) -> Result<Envelope> {
    let eligible: Vec<&PublicKeyBundle> = recipients
        .iter()
        .filter(|r| {
            let ok = r.version.is_supported() && validate_agreement_key(&r.agreement).is_ok();
            if !ok {
                tracing::debug!(key_id = %r.key_id, version = %r.version, "skipping ineligible recipient");
            }
            ok
        })
        .collect();

    if eligible.is_empty() {
        return Err(ProtocolError::NoEligibleRecipients);
    }

    // One message key, one ciphertext
    let message_key = SymmetricKey::generate();
    // The ephemeral secret agrees with every recipient before dropping
    let ephemeral = AgreementPrivateKey::generate();
    let ephemeral_public = ephemeral.public_key();

    let message_id = MessageId::generate();
    let created_at = Utc::now().timestamp();
    let key_wrap_nonce = Nonce::generate();
    let message_nonce = Nonce::generate();

    // The same N1 under per-recipient wrapping keys: distinct keys make
    // the shared nonce safe.
    let mut wrapped_keys = std::collections::BTreeMap::new();
    for recipient in eligible {
        let shared = ephemeral.diffie_hellman(&recipient.agreement);
        let wrapped =
            wrap_message_key(&message_key, shared, &key_wrap_nonce, &message_id, recipient)?;
        wrapped_keys.insert(recipient.key_id, wrapped);
    }

    let ciphertext = encrypt_with_nonce(
        &message_key,
        &message_nonce,
        &codec::utf8_encode(plaintext),
        &message_aad(&message_id, created_at),
    )?;

    let signature = signer.map(|s| {
        SignatureRecord::sign_with_context(plaintext.as_bytes(), message_id, created_at, s)
    });

    Ok(Envelope {
        metadata: EnvelopeMetadata {
            version: cachet_keys::PROTOCOL_VERSION,
            suite: CipherSuite::default(),
            message_id,
            created_at,
            ephemeral_public,
            key_wrap_nonce,
            message_nonce,
            signer_key_id: signer.map(|s| *s.key_id()),
        },
        wrapped_keys,
        ciphertext,
        signature,
    })
}

/// Decrypt an envelope at the current wall-clock time.
///
/// See [`decrypt_at`] for the full contract.
pub fn decrypt(
    envelope: &Envelope,
    own: &PrivateKeyBundle,
    expected_recipient_key_id: &KeyId,
    sender: Option<&PublicKeyBundle>,
) -> Result<DecryptedMessage> {
    decrypt_at(
        envelope,
        own,
        expected_recipient_key_id,
        sender,
        Utc::now().timestamp(),
    )
}

/// Decrypt an envelope against an explicit clock.
///
/// The envelope must carry a wrapped key for `expected_recipient_key_id`;
/// accepting a ciphertext wrapped for a different (e.g. rotated-out) key
/// under the same account is refused with
/// [`ProtocolError::NotAddressedToThisKey`].
///
/// Signature handling surfaces rather than discards: if a signature is
/// present and `sender` is supplied but verification fails, the plaintext
/// is still returned with `verified = false` and
/// `signature_rejected = true`.
///
/// # Errors
///
/// - `ProtocolError::IncompatibleKeyVersion` for an envelope below the
///   minimum supported version
/// - `ProtocolError::NotAddressedToThisKey` when the expected key id has
///   no wrapped key entry
/// - `ProtocolError::DecryptionFailed` for any authentication failure at
///   either wrap stage or on the ciphertext; wrong key and tampering are
///   indistinguishable and no partial plaintext is exposed
pub fn decrypt_at(
    envelope: &Envelope,
    own: &PrivateKeyBundle,
    expected_recipient_key_id: &KeyId,
    sender: Option<&PublicKeyBundle>,
    now: i64,
) -> Result<DecryptedMessage> {
    envelope.validate()?;
    let metadata = &envelope.metadata;

    // Step 1: Version gate
    ensure_supported_version(metadata.version)?;

    // Step 2: Recipient-match gate
    let Some(wrapped) = envelope.wrapped_keys.get(expected_recipient_key_id) else {
        tracing::warn!(
            message_id = %metadata.message_id,
            expected = %expected_recipient_key_id,
            "envelope not addressed to this key"
        );
        return Err(ProtocolError::NotAddressedToThisKey);
    };

    // Step 3: Unwrap the message key - sealed box first, then the
    // agreement-derived stage. Every failure collapses to DecryptionFailed.
    let wrap_aad = key_wrap_aad(&metadata.message_id);
    let stage1 = Zeroizing::new(
        seal::open(own.transport_key(), wrapped, &wrap_aad)
            .map_err(|_| ProtocolError::DecryptionFailed)?,
    );

    let shared = own.agreement_key().diffie_hellman(&metadata.ephemeral_public);
    let wrapping_key = derive_wrapping_key(&shared)?;

    let message_key_bytes = Zeroizing::new(
        decrypt_with_nonce(&wrapping_key, &metadata.key_wrap_nonce, &stage1, &wrap_aad)
            .map_err(|_| ProtocolError::DecryptionFailed)?,
    );
    let message_key =
        SymmetricKey::from_bytes(&message_key_bytes).map_err(|_| ProtocolError::DecryptionFailed)?;

    // Step 4: Decrypt the ciphertext, verifying the metadata binding
    let plaintext_bytes = Zeroizing::new(
        decrypt_with_nonce(
            &message_key,
            &metadata.message_nonce,
            &envelope.ciphertext,
            &message_aad(&metadata.message_id, metadata.created_at),
        )
        .map_err(|_| ProtocolError::DecryptionFailed)?,
    );

    let plaintext =
        codec::utf8_decode(&plaintext_bytes).map_err(|_| ProtocolError::DecryptionFailed)?;

    // Step 5: Signature verification - surfaced, never silently discarded
    let (verified, signature_rejected) = match (&envelope.signature, sender) {
        (Some(record), Some(sender_bundle)) => {
            let bound_to_envelope = record.message_id == metadata.message_id
                && record.created_at == metadata.created_at;
            let ok = bound_to_envelope && record.verify(plaintext.as_bytes(), sender_bundle);
            if !ok {
                tracing::warn!(
                    message_id = %metadata.message_id,
                    signer = %record.key_id,
                    "signature rejected; returning unauthenticated plaintext"
                );
            }
            (ok, !ok)
        }
        _ => (false, false),
    };

    // Step 6: Advisory freshness flag
    let stale = is_stale(metadata.created_at, now, DEFAULT_MAX_AGE_SECS);
    if stale {
        tracing::debug!(message_id = %metadata.message_id, "message flagged stale");
    }

    Ok(DecryptedMessage {
        plaintext,
        verified,
        stale,
        signature_rejected,
    })
}

/// Derive the key-wrapping key from an ephemeral shared secret.
fn derive_wrapping_key(shared: &SharedSecret) -> Result<SymmetricKey> {
    let mut key_bytes = shared.derive_key(KEY_WRAP_CONTEXT);
    let key = SymmetricKey::from_bytes(&key_bytes)?;
    zeroize::Zeroize::zeroize(&mut key_bytes);
    Ok(key)
}

/// Two-stage wrap of the message key for one recipient.
fn wrap_message_key(
    message_key: &SymmetricKey,
    shared: SharedSecret,
    key_wrap_nonce: &Nonce,
    message_id: &MessageId,
    recipient: &PublicKeyBundle,
) -> Result<cachet_crypto::SealedBox> {
    let aad = key_wrap_aad(message_id);
    let wrapping_key = derive_wrapping_key(&shared)?;

    // Stage 1: AEAD under the agreement-derived key
    let stage1 = encrypt_with_nonce(&wrapping_key, key_wrap_nonce, message_key.as_bytes(), &aad)?;

    // Stage 2: seal under the recipient's long-term transport key
    seal::seal(&recipient.transport, &stage1, &aad).map_err(Into::into)
}

/// Associated data binding the key wrap to one message id.
fn key_wrap_aad(message_id: &MessageId) -> Vec<u8> {
    let mut aad = Vec::with_capacity(KEY_WRAP_AAD_DOMAIN.len() + MESSAGE_ID_LEN);
    aad.extend_from_slice(KEY_WRAP_AAD_DOMAIN);
    aad.extend_from_slice(message_id.as_bytes());
    aad
}

/// Associated data binding the ciphertext to (message id, timestamp).
fn message_aad(message_id: &MessageId, created_at: i64) -> Vec<u8> {
    let mut aad = Vec::with_capacity(MESSAGE_AAD_DOMAIN.len() + MESSAGE_ID_LEN + 8);
    aad.extend_from_slice(MESSAGE_AAD_DOMAIN);
    aad.extend_from_slice(message_id.as_bytes());
    aad.extend_from_slice(&created_at.to_be_bytes());
    aad
}

const MESSAGE_ID_LEN: usize = crate::envelope::MESSAGE_ID_SIZE;
