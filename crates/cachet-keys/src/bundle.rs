//! Key bundles: one user's cryptographic identity at one point in time.
//!
//! A bundle holds three independent key pairs under a single stable key
//! id: a transport pair (sealed-box key transport), an agreement pair
//! (per-message ECDH), and a signing pair (detached signatures). The
//! public bundle is the publication form handed to the directory service;
//! the private bundle never leaves the owning device unencrypted.
//!
//! Bundles are superseded, never mutated: rotation generates a fresh
//! bundle with a new key id. Discarding an old private bundle makes the
//! history it protected undecryptable - that loss is the forward-secrecy
//! trade the design accepts.

use chrono::Utc;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use cachet_crypto::{
    AgreementPrivateKey, AgreementPublicKey, Hash256, SigningPrivateKey, SigningPublicKey,
    TransportPrivateKey, TransportPublicKey,
};

use crate::rotation::rotation_due_from;
use crate::version::{BundleVersion, PROTOCOL_VERSION};
use crate::{KeyError, Result};

/// Size of a key id in bytes.
pub const KEY_ID_SIZE: usize = 16;

/// Domain separator for bundle fingerprints.
const FINGERPRINT_DOMAIN: &[u8] = b"CACHET-BUNDLE-FINGERPRINT-v1";

/// Maximum size of a serialized `PublicKeyBundle` in bytes.
///
/// Checked before deserialization so crafted input cannot force a large
/// allocation.
pub const MAX_PUBLIC_BUNDLE_SIZE: usize = 4096;

/// Opaque identifier for a key bundle, stable for the bundle's lifetime.
///
/// Sixteen random bytes, independent of the key material; displayed and
/// serialized as lowercase hex.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KeyId([u8; KEY_ID_SIZE]);

impl KeyId {
    /// Generate a fresh random key id.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_ID_SIZE];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes.
    pub fn from_bytes(bytes: [u8; KEY_ID_SIZE]) -> Self {
        Self(bytes)
    }

    /// Get the id as bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_ID_SIZE] {
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
    /// Returns `KeyError::InvalidKeyId` for malformed input.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|_| KeyError::InvalidKeyId(s.to_string()))?;
        let arr: [u8; KEY_ID_SIZE] = bytes
            .try_into()
            .map_err(|_| KeyError::InvalidKeyId(s.to_string()))?;
        Ok(Self(arr))
    }
}

impl std::fmt::Display for KeyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl std::fmt::Debug for KeyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyId({}...)", &self.to_hex()[..8])
    }
}

impl Serialize for KeyId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for KeyId {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// The shareable half of a key bundle.
///
/// Contains only public key material; this is what gets published to the
/// contact directory and what peers hold for each other.
#[derive(Clone, Serialize, Deserialize)]
pub struct PublicKeyBundle {
    /// Stable identifier for this bundle.
    pub key_id: KeyId,
    /// Schema version, gatekeeping protocol compatibility.
    pub version: BundleVersion,
    /// Unix timestamp (seconds) when the bundle was generated.
    pub created_at: i64,
    /// Unix timestamp (seconds) after which the bundle should be rotated.
    pub rotation_due: i64,
    /// Public key for sealed-box key transport.
    pub transport: TransportPublicKey,
    /// Public key for per-message key agreement.
    pub agreement: AgreementPublicKey,
    /// Public key for signature verification.
    pub signing: SigningPublicKey,
}

impl PublicKeyBundle {
    /// Compute the bundle fingerprint.
    ///
    /// A domain-separated BLAKE3 hash over the canonical length-prefixed
    /// concatenation of the key id, the three public keys, the creation
    /// timestamp, and the version. Stable across serializations of the
    /// same logical bundle; used for out-of-band key verification.
    pub fn fingerprint(&self) -> Hash256 {
        Hash256::hash_many(&[
            FINGERPRINT_DOMAIN,
            self.key_id.as_bytes(),
            self.transport.as_bytes(),
            self.agreement.as_bytes(),
            self.signing.as_bytes(),
            &self.created_at.to_be_bytes(),
            self.version.to_string().as_bytes(),
        ])
    }

    /// Short grouped fingerprint rendering for manual comparison.
    ///
    /// First sixteen bytes of the fingerprint as eight hex groups.
    pub fn fingerprint_words(&self) -> String {
        let fingerprint = self.fingerprint();
        fingerprint.as_bytes()[..16]
            .chunks(2)
            .map(hex::encode)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Check structural invariants.
    ///
    /// # Errors
    ///
    /// Returns `KeyError::Serialization` if `rotation_due <= created_at`.
    pub fn validate(&self) -> Result<()> {
        if self.rotation_due <= self.created_at {
            return Err(KeyError::Serialization(
                "rotation_due must be after created_at".to_string(),
            ));
        }
        Ok(())
    }

    /// Serialize to the JSON publication form.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| KeyError::Serialization(e.to_string()))
    }

    /// Deserialize from the JSON publication form.
    ///
    /// Validates input size before parsing and structural invariants
    /// after.
    pub fn from_json(json: &str) -> Result<Self> {
        if json.len() > MAX_PUBLIC_BUNDLE_SIZE {
            return Err(KeyError::Serialization(format!(
                "public bundle too large: {} bytes (max: {})",
                json.len(),
                MAX_PUBLIC_BUNDLE_SIZE
            )));
        }
        let bundle: Self =
            serde_json::from_str(json).map_err(|e| KeyError::Serialization(e.to_string()))?;
        bundle.validate()?;
        Ok(bundle)
    }
}

impl std::fmt::Debug for PublicKeyBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublicKeyBundle")
            .field("key_id", &self.key_id)
            .field("version", &self.version)
            .field("created_at", &self.created_at)
            .field("rotation_due", &self.rotation_due)
            .finish()
    }
}

impl PartialEq for PublicKeyBundle {
    fn eq(&self, other: &Self) -> bool {
        // Fingerprints cover every identifying field; constant-time under
        // Hash256's comparison.
        self.fingerprint() == other.fingerprint()
    }
}

impl Eq for PublicKeyBundle {}

/// A full key bundle including private key material.
///
/// Produced only by [`PrivateKeyBundle::generate`] and by password unwrap.
/// Never serialized in the clear: at-rest storage goes through
/// [`crate::vault::PasswordProtectedBundle`].
pub struct PrivateKeyBundle {
    public: PublicKeyBundle,
    transport: TransportPrivateKey,
    agreement: AgreementPrivateKey,
    signing: SigningPrivateKey,
}

impl PrivateKeyBundle {
    /// Generate a fresh key bundle stamped with the current time.
    ///
    /// # Errors
    ///
    /// Returns `KeyError::KeyGeneration` if any key pair generation step
    /// fails; partial results are discarded, never returned.
    pub fn generate() -> Result<Self> {
        Self::generate_at(Utc::now().timestamp())
    }

    /// Generate a fresh key bundle stamped with an explicit time.
    ///
    /// Rotation-timing tests drive this with a simulated clock.
    pub fn generate_at(now: i64) -> Result<Self> {
        // All three pairs are generated before any part of the bundle is
        // assembled, so a failure cannot leak a partial bundle.
        let transport = TransportPrivateKey::generate();
        let agreement = AgreementPrivateKey::generate();
        let signing = SigningPrivateKey::generate();

        let public = PublicKeyBundle {
            key_id: KeyId::generate(),
            version: PROTOCOL_VERSION,
            created_at: now,
            rotation_due: rotation_due_from(now),
            transport: transport.public_key(),
            agreement: agreement.public_key(),
            signing: signing.public_key(),
        };

        tracing::info!(key_id = %public.key_id, "generated key bundle");

        Ok(Self {
            public,
            transport,
            agreement,
            signing,
        })
    }

    /// Reassemble a bundle from its parts (password unwrap path).
    ///
    /// # Errors
    ///
    /// Returns `KeyError::PasswordIncorrect` if the private keys do not
    /// reproduce the stored public keys - corrupted and wrong-password
    /// blobs are indistinguishable by design.
    pub(crate) fn from_parts(
        public: PublicKeyBundle,
        transport: TransportPrivateKey,
        agreement: AgreementPrivateKey,
        signing: SigningPrivateKey,
    ) -> Result<Self> {
        let transport_matches: bool = transport
            .public_key()
            .as_bytes()
            .ct_eq(public.transport.as_bytes())
            .into();
        let agreement_matches: bool = agreement
            .public_key()
            .as_bytes()
            .ct_eq(public.agreement.as_bytes())
            .into();
        let signing_matches: bool = signing
            .public_key()
            .as_bytes()
            .ct_eq(public.signing.as_bytes())
            .into();

        if !(transport_matches && agreement_matches && signing_matches) {
            return Err(KeyError::PasswordIncorrect);
        }

        Ok(Self {
            public,
            transport,
            agreement,
            signing,
        })
    }

    /// The shareable public half.
    pub fn public(&self) -> &PublicKeyBundle {
        &self.public
    }

    /// The bundle's stable key id.
    pub fn key_id(&self) -> &KeyId {
        &self.public.key_id
    }

    /// The transport private key (sealed-box open).
    pub fn transport_key(&self) -> &TransportPrivateKey {
        &self.transport
    }

    /// The agreement private key (per-message ECDH).
    pub fn agreement_key(&self) -> &AgreementPrivateKey {
        &self.agreement
    }

    /// The signing private key (detached signatures).
    pub fn signing_key(&self) -> &SigningPrivateKey {
        &self.signing
    }
}

impl std::fmt::Debug for PrivateKeyBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivateKeyBundle")
            .field("key_id", &self.public.key_id)
            .field("version", &self.public.version)
            .field("private_keys", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rotation::ROTATION_PERIOD_SECS;

    const BASE_TIME: i64 = 1710000000; // March 2024

    #[test]
    fn test_generate_bundle() {
        let bundle = PrivateKeyBundle::generate_at(BASE_TIME).unwrap();
        let public = bundle.public();

        assert_eq!(public.created_at, BASE_TIME);
        assert_eq!(public.rotation_due, BASE_TIME + ROTATION_PERIOD_SECS);
        assert_eq!(public.version, PROTOCOL_VERSION);
        assert!(public.validate().is_ok());
    }

    #[test]
    fn test_bundles_are_independent() {
        let b1 = PrivateKeyBundle::generate_at(BASE_TIME).unwrap();
        let b2 = PrivateKeyBundle::generate_at(BASE_TIME).unwrap();

        assert_ne!(b1.key_id(), b2.key_id());
        assert_ne!(
            b1.public().transport.as_bytes(),
            b2.public().transport.as_bytes()
        );
        assert_ne!(
            b1.public().agreement.as_bytes(),
            b2.public().agreement.as_bytes()
        );
        assert_ne!(
            b1.public().signing.as_bytes(),
            b2.public().signing.as_bytes()
        );
    }

    #[test]
    fn test_key_pairs_within_bundle_are_independent() {
        let bundle = PrivateKeyBundle::generate_at(BASE_TIME).unwrap();
        // Transport and agreement are both X25519; the pairs must differ.
        assert_ne!(
            bundle.public().transport.as_bytes(),
            bundle.public().agreement.as_bytes()
        );
    }

    #[test]
    fn test_fingerprint_deterministic() {
        let bundle = PrivateKeyBundle::generate_at(BASE_TIME).unwrap();
        let f1 = bundle.public().fingerprint();
        let f2 = bundle.public().fingerprint();
        assert_eq!(f1, f2);
    }

    #[test]
    fn test_fingerprint_stable_across_serialization() {
        let bundle = PrivateKeyBundle::generate_at(BASE_TIME).unwrap();
        let json = bundle.public().to_json().unwrap();
        let restored = PublicKeyBundle::from_json(&json).unwrap();

        assert_eq!(bundle.public().fingerprint(), restored.fingerprint());
    }

    #[test]
    fn test_fingerprints_differ_between_bundles() {
        let b1 = PrivateKeyBundle::generate_at(BASE_TIME).unwrap();
        let b2 = PrivateKeyBundle::generate_at(BASE_TIME).unwrap();
        assert_ne!(b1.public().fingerprint(), b2.public().fingerprint());
    }

    #[test]
    fn test_fingerprint_words_format() {
        let bundle = PrivateKeyBundle::generate_at(BASE_TIME).unwrap();
        let words = bundle.public().fingerprint_words();

        let groups: Vec<_> = words.split(' ').collect();
        assert_eq!(groups.len(), 8);
        assert!(groups.iter().all(|g| g.len() == 4));
    }

    #[test]
    fn test_public_bundle_json_roundtrip() {
        let bundle = PrivateKeyBundle::generate_at(BASE_TIME).unwrap();
        let json = bundle.public().to_json().unwrap();

        // Binary material is Base64-armored, not byte arrays
        assert!(!json.contains('['));

        let restored = PublicKeyBundle::from_json(&json).unwrap();
        assert_eq!(bundle.public(), &restored);
    }

    #[test]
    fn test_from_json_rejects_oversized() {
        let padded = format!("{{\"pad\":\"{}\"}}", "x".repeat(MAX_PUBLIC_BUNDLE_SIZE));
        let result = PublicKeyBundle::from_json(&padded);
        assert!(matches!(result, Err(KeyError::Serialization(msg)) if msg.contains("too large")));
    }

    #[test]
    fn test_from_json_rejects_inverted_timestamps() {
        let bundle = PrivateKeyBundle::generate_at(BASE_TIME).unwrap();
        let mut public = bundle.public().clone();
        public.rotation_due = public.created_at;

        let json = public.to_json().unwrap();
        assert!(PublicKeyBundle::from_json(&json).is_err());
    }

    #[test]
    fn test_key_id_hex_roundtrip() {
        let id = KeyId::generate();
        let restored = KeyId::from_hex(&id.to_hex()).unwrap();
        assert_eq!(id, restored);
    }

    #[test]
    fn test_key_id_from_hex_invalid() {
        assert!(KeyId::from_hex("zz").is_err());
        assert!(KeyId::from_hex("abcd").is_err());
    }

    #[test]
    fn test_private_bundle_debug_redacted() {
        let bundle = PrivateKeyBundle::generate_at(BASE_TIME).unwrap();
        let debug = format!("{:?}", bundle);
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn test_from_parts_rejects_mismatched_keys() {
        let bundle = PrivateKeyBundle::generate_at(BASE_TIME).unwrap();
        let other = PrivateKeyBundle::generate_at(BASE_TIME).unwrap();

        let result = PrivateKeyBundle::from_parts(
            bundle.public.clone(),
            TransportPrivateKey::from_bytes(other.transport.as_bytes()).unwrap(),
            AgreementPrivateKey::from_bytes(bundle.agreement.as_bytes()).unwrap(),
            SigningPrivateKey::from_bytes(&bundle.signing.as_bytes()).unwrap(),
        );

        assert!(matches!(result, Err(KeyError::PasswordIncorrect)));
    }
}
