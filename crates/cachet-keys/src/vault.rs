//! Password wrapping of private key bundles.
//!
//! The private bundle at rest is a single AEAD blob under an
//! Argon2id-derived key: `{ciphertext, salt, nonce, kdf_params, version}`.
//! Unwrapping with the wrong password and unwrapping a corrupted blob are
//! indistinguishable - both surface as [`KeyError::PasswordIncorrect`].
//!
//! The derivation is deliberately slow; treat wrap/unwrap as long-running
//! work and keep it off latency-sensitive paths.

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use cachet_crypto::aead::{decrypt_with_nonce, encrypt_with_nonce, Nonce};
use cachet_crypto::kdf::{derive_password_key, KdfParams, SALT_SIZE};
use cachet_crypto::{codec, AgreementPrivateKey, SigningPrivateKey, TransportPrivateKey};

use crate::bundle::{PrivateKeyBundle, PublicKeyBundle};
use crate::{KeyError, Result};

/// Blob format version. Bumped when the wrap layout changes.
pub const BLOB_FORMAT_VERSION: u32 = 1;

/// Maximum size of a serialized blob in bytes.
///
/// Checked before deserialization so crafted input cannot force a large
/// allocation.
pub const MAX_BLOB_SIZE: usize = 16384;

/// Domain prefix for the blob's associated data.
const BLOB_AAD_DOMAIN: &[u8] = b"CACHET-VAULT-v1";

/// Serializable interior of the blob: the public half plus the three
/// private keys. Zeroized on drop.
#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
struct BundleSecrets {
    #[zeroize(skip)]
    public: PublicKeyBundle,
    transport: Vec<u8>,
    agreement: Vec<u8>,
    signing: Vec<u8>,
}

/// A password-protected private key bundle, ready for at-rest storage.
///
/// The storage collaborator persists this value verbatim; it learns
/// nothing about the keys inside.
#[derive(Clone, Serialize, Deserialize)]
pub struct PasswordProtectedBundle {
    /// Blob format version.
    pub version: u32,
    /// Argon2id parameters used for this blob.
    pub kdf_params: KdfParams,
    /// Derivation salt.
    #[serde(with = "codec::b64_array")]
    pub salt: [u8; SALT_SIZE],
    /// AEAD nonce.
    pub nonce: Nonce,
    /// Encrypted serialized bundle.
    #[serde(with = "codec::b64")]
    pub ciphertext: Vec<u8>,
}

impl PasswordProtectedBundle {
    /// Wrap a private bundle under a password.
    ///
    /// Draws a fresh salt and nonce from the secure RNG on every call.
    ///
    /// # Errors
    ///
    /// Returns `KeyError::Crypto` if derivation or encryption fails.
    pub fn wrap(bundle: &PrivateKeyBundle, password: &[u8]) -> Result<Self> {
        let mut salt = [0u8; SALT_SIZE];
        OsRng.fill_bytes(&mut salt);
        Self::wrap_with_parts(bundle, password, salt, Nonce::generate(), KdfParams::default())
    }

    /// Wrap with caller-supplied salt, nonce, and KDF parameters.
    ///
    /// Deterministic given identical inputs; tests fix the salt and nonce
    /// through this seam. Production callers use [`Self::wrap`].
    pub fn wrap_with_parts(
        bundle: &PrivateKeyBundle,
        password: &[u8],
        salt: [u8; SALT_SIZE],
        nonce: Nonce,
        kdf_params: KdfParams,
    ) -> Result<Self> {
        let key = derive_password_key(password, &salt, &kdf_params)?;

        let secrets = BundleSecrets {
            public: bundle.public().clone(),
            transport: bundle.transport_key().as_bytes().to_vec(),
            agreement: bundle.agreement_key().as_bytes().to_vec(),
            signing: bundle.signing_key().as_bytes().to_vec(),
        };

        let plaintext = zeroize::Zeroizing::new(
            bincode::serialize(&secrets).map_err(|e| KeyError::Serialization(e.to_string()))?,
        );

        let ciphertext = encrypt_with_nonce(&key, &nonce, &plaintext, &blob_aad(BLOB_FORMAT_VERSION))?;

        Ok(Self {
            version: BLOB_FORMAT_VERSION,
            kdf_params,
            salt,
            nonce,
            ciphertext,
        })
    }

    /// Unwrap the private bundle with a password.
    ///
    /// # Errors
    ///
    /// Returns `KeyError::UnsupportedBlobFormat` for a blob written by an
    /// incompatible layout, and `KeyError::PasswordIncorrect` for every
    /// authentication or integrity failure - wrong password and corrupted
    /// blob are indistinguishable, and no partial key material is
    /// returned.
    pub fn unwrap(&self, password: &[u8]) -> Result<PrivateKeyBundle> {
        if self.version != BLOB_FORMAT_VERSION {
            return Err(KeyError::UnsupportedBlobFormat {
                found: self.version,
            });
        }

        // Never honor a blob that demands unbounded derivation costs
        if !self.kdf_params.is_within_limits() {
            return Err(KeyError::Serialization(
                "KDF parameters out of bounds".to_string(),
            ));
        }

        let key = derive_password_key(password, &self.salt, &self.kdf_params)?;

        let plaintext = zeroize::Zeroizing::new(
            decrypt_with_nonce(&key, &self.nonce, &self.ciphertext, &blob_aad(self.version))
                .map_err(|_| KeyError::PasswordIncorrect)?,
        );

        let secrets: BundleSecrets =
            bincode::deserialize(&plaintext).map_err(|_| KeyError::PasswordIncorrect)?;

        let transport = TransportPrivateKey::from_bytes(&secrets.transport)
            .map_err(|_| KeyError::PasswordIncorrect)?;
        let agreement = AgreementPrivateKey::from_bytes(&secrets.agreement)
            .map_err(|_| KeyError::PasswordIncorrect)?;
        let signing = SigningPrivateKey::from_bytes(&secrets.signing)
            .map_err(|_| KeyError::PasswordIncorrect)?;

        PrivateKeyBundle::from_parts(secrets.public.clone(), transport, agreement, signing)
    }

    /// Serialize to the JSON at-rest form.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| KeyError::Serialization(e.to_string()))
    }

    /// Deserialize from the JSON at-rest form.
    ///
    /// Validates input size before parsing.
    pub fn from_json(json: &str) -> Result<Self> {
        if json.len() > MAX_BLOB_SIZE {
            return Err(KeyError::Serialization(format!(
                "blob too large: {} bytes (max: {})",
                json.len(),
                MAX_BLOB_SIZE
            )));
        }
        serde_json::from_str(json).map_err(|e| KeyError::Serialization(e.to_string()))
    }
}

impl std::fmt::Debug for PasswordProtectedBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordProtectedBundle")
            .field("version", &self.version)
            .field("kdf_params", &self.kdf_params)
            .field("ciphertext_len", &self.ciphertext.len())
            .finish()
    }
}

/// Associated data binding the blob to its format version.
fn blob_aad(version: u32) -> Vec<u8> {
    let mut aad = Vec::with_capacity(BLOB_AAD_DOMAIN.len() + 4);
    aad.extend_from_slice(BLOB_AAD_DOMAIN);
    aad.extend_from_slice(&version.to_be_bytes());
    aad
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE_TIME: i64 = 1710000000;

    // Cheap parameters keep the Argon2 calls fast under test; production
    // wraps use KdfParams::default().
    fn test_kdf() -> KdfParams {
        KdfParams {
            m_cost: 8,
            t_cost: 1,
            p_cost: 1,
        }
    }

    fn wrap_for_test(bundle: &PrivateKeyBundle, password: &[u8]) -> PasswordProtectedBundle {
        let mut salt = [0u8; SALT_SIZE];
        OsRng.fill_bytes(&mut salt);
        PasswordProtectedBundle::wrap_with_parts(bundle, password, salt, Nonce::generate(), test_kdf())
            .unwrap()
    }

    #[test]
    fn test_wrap_unwrap_roundtrip() {
        let bundle = PrivateKeyBundle::generate_at(BASE_TIME).unwrap();
        let blob = wrap_for_test(&bundle, b"correct horse battery staple");

        let restored = blob.unwrap(b"correct horse battery staple").unwrap();

        assert_eq!(bundle.key_id(), restored.key_id());
        assert_eq!(bundle.public(), restored.public());
        // The restored agreement key still agrees with peers
        let peer = PrivateKeyBundle::generate_at(BASE_TIME).unwrap();
        let s1 = bundle.agreement_key().diffie_hellman(&peer.public().agreement);
        let s2 = restored.agreement_key().diffie_hellman(&peer.public().agreement);
        assert_eq!(s1.as_bytes(), s2.as_bytes());
    }

    #[test]
    fn test_wrong_password_fails() {
        let bundle = PrivateKeyBundle::generate_at(BASE_TIME).unwrap();
        let blob = wrap_for_test(&bundle, b"right");

        let result = blob.unwrap(b"wrong");
        assert!(matches!(result, Err(KeyError::PasswordIncorrect)));
    }

    #[test]
    fn test_corrupted_blob_indistinguishable_from_wrong_password() {
        let bundle = PrivateKeyBundle::generate_at(BASE_TIME).unwrap();
        let mut blob = wrap_for_test(&bundle, b"password");
        blob.ciphertext[0] ^= 0xFF;

        let result = blob.unwrap(b"password");
        assert!(matches!(result, Err(KeyError::PasswordIncorrect)));
    }

    #[test]
    fn test_tampered_salt_fails() {
        let bundle = PrivateKeyBundle::generate_at(BASE_TIME).unwrap();
        let mut blob = wrap_for_test(&bundle, b"password");
        blob.salt[0] ^= 0xFF;

        assert!(matches!(blob.unwrap(b"password"), Err(KeyError::PasswordIncorrect)));
    }

    #[test]
    fn test_wrap_deterministic_with_fixed_parts() {
        let bundle = PrivateKeyBundle::generate_at(BASE_TIME).unwrap();
        let salt = [3u8; SALT_SIZE];
        let nonce = Nonce::from_bytes(&[5u8; 24]).unwrap();

        let b1 = PasswordProtectedBundle::wrap_with_parts(
            &bundle, b"pw", salt, nonce.clone(), test_kdf(),
        )
        .unwrap();
        let b2 =
            PasswordProtectedBundle::wrap_with_parts(&bundle, b"pw", salt, nonce, test_kdf())
                .unwrap();

        assert_eq!(b1.ciphertext, b2.ciphertext);
    }

    #[test]
    fn test_random_wrap_salts_differ() {
        let bundle = PrivateKeyBundle::generate_at(BASE_TIME).unwrap();
        let b1 = wrap_for_test(&bundle, b"pw");
        let b2 = wrap_for_test(&bundle, b"pw");

        assert_ne!(b1.salt, b2.salt);
        assert_ne!(b1.nonce.as_bytes(), b2.nonce.as_bytes());
        assert_ne!(b1.ciphertext, b2.ciphertext);
    }

    #[test]
    fn test_out_of_bounds_kdf_params_rejected() {
        let bundle = PrivateKeyBundle::generate_at(BASE_TIME).unwrap();
        let mut blob = wrap_for_test(&bundle, b"password");
        blob.kdf_params.m_cost = u32::MAX;

        let result = blob.unwrap(b"password");
        assert!(matches!(result, Err(KeyError::Serialization(_))));
    }

    #[test]
    fn test_unsupported_format_version() {
        let bundle = PrivateKeyBundle::generate_at(BASE_TIME).unwrap();
        let mut blob = wrap_for_test(&bundle, b"password");
        blob.version = 99;

        let result = blob.unwrap(b"password");
        assert!(matches!(
            result,
            Err(KeyError::UnsupportedBlobFormat { found: 99 })
        ));
    }

    #[test]
    fn test_blob_json_roundtrip() {
        let bundle = PrivateKeyBundle::generate_at(BASE_TIME).unwrap();
        let blob = wrap_for_test(&bundle, b"password");

        let json = blob.to_json().unwrap();
        let restored_blob = PasswordProtectedBundle::from_json(&json).unwrap();
        let restored = restored_blob.unwrap(b"password").unwrap();

        assert_eq!(bundle.key_id(), restored.key_id());
    }

    #[test]
    fn test_from_json_rejects_oversized() {
        let padded = format!("{{\"pad\":\"{}\"}}", "x".repeat(MAX_BLOB_SIZE));
        let result = PasswordProtectedBundle::from_json(&padded);
        assert!(matches!(result, Err(KeyError::Serialization(msg)) if msg.contains("too large")));
    }

    #[test]
    fn test_blob_debug_hides_material() {
        let bundle = PrivateKeyBundle::generate_at(BASE_TIME).unwrap();
        let blob = wrap_for_test(&bundle, b"password");

        let debug = format!("{:?}", blob);
        assert!(debug.contains("ciphertext_len"));
        assert!(!debug.contains("salt"));
    }
}
