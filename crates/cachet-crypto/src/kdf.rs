//! Password key derivation.
//!
//! Argon2id with hardened parameters, followed by a BLAKE3 domain
//! separation step. The derivation is intentionally CPU- and memory-heavy;
//! callers on latency-sensitive paths should run it on a blocking-work
//! thread.

use argon2::{Algorithm, Argon2, Params, Version};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::{CryptoError, Result, SymmetricKey};

/// Size of the derivation salt in bytes.
pub const SALT_SIZE: usize = 32;

/// Domain separator applied after Argon2id.
const PASSWORD_KEY_CONTEXT: &str = "cachet password key v1";

// Argon2id parameters (hardened for key derivation)
// Memory: 64 MiB, Iterations: 3, Parallelism: 4
const ARGON2_M_COST: u32 = 64 * 1024; // KiB
const ARGON2_T_COST: u32 = 3;
const ARGON2_P_COST: u32 = 4;
const ARGON2_OUTPUT_LEN: usize = 32;

/// Upper bound on blob-declared memory cost in KiB (256 MiB).
pub const MAX_M_COST: u32 = 256 * 1024;

/// Upper bound on blob-declared iteration count.
pub const MAX_T_COST: u32 = 16;

/// Upper bound on blob-declared parallelism.
pub const MAX_P_COST: u32 = 16;

/// Argon2id cost parameters, carried inside password-protected blobs so
/// old blobs remain unwrappable after a cost bump.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub m_cost: u32,
    /// Iteration count.
    pub t_cost: u32,
    /// Degree of parallelism.
    pub p_cost: u32,
}

impl KdfParams {
    /// Whether the declared costs are within the bounds this client will
    /// run. A blob demanding more is treated as malformed, not honored.
    pub fn is_within_limits(&self) -> bool {
        (1..=MAX_M_COST).contains(&self.m_cost)
            && (1..=MAX_T_COST).contains(&self.t_cost)
            && (1..=MAX_P_COST).contains(&self.p_cost)
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            m_cost: ARGON2_M_COST,
            t_cost: ARGON2_T_COST,
            p_cost: ARGON2_P_COST,
        }
    }
}

/// Derive a symmetric key from a password and salt.
///
/// # Errors
///
/// Returns `CryptoError::KeyGeneration` if the Argon2 parameters are
/// rejected or derivation fails.
pub fn derive_password_key(
    password: &[u8],
    salt: &[u8; SALT_SIZE],
    params: &KdfParams,
) -> Result<SymmetricKey> {
    let argon_params = Params::new(
        params.m_cost,
        params.t_cost,
        params.p_cost,
        Some(ARGON2_OUTPUT_LEN),
    )
    .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params);

    let mut output = [0u8; 32];
    argon2
        .hash_password_into(password, salt, &mut output)
        .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;

    // Apply context for domain separation
    let mut contextualized = blake3::derive_key(PASSWORD_KEY_CONTEXT, &output);
    output.zeroize();

    let key = SymmetricKey::from_bytes(&contextualized)?;
    contextualized.zeroize();
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Cheap parameters so the test suite stays fast; production uses
    // KdfParams::default().
    fn test_params() -> KdfParams {
        KdfParams {
            m_cost: 8,
            t_cost: 1,
            p_cost: 1,
        }
    }

    #[test]
    fn test_derivation_deterministic() {
        let salt = [7u8; SALT_SIZE];
        let k1 = derive_password_key(b"password", &salt, &test_params()).unwrap();
        let k2 = derive_password_key(b"password", &salt, &test_params()).unwrap();
        assert_eq!(k1.as_bytes(), k2.as_bytes());
    }

    #[test]
    fn test_different_passwords_differ() {
        let salt = [7u8; SALT_SIZE];
        let k1 = derive_password_key(b"password-a", &salt, &test_params()).unwrap();
        let k2 = derive_password_key(b"password-b", &salt, &test_params()).unwrap();
        assert_ne!(k1.as_bytes(), k2.as_bytes());
    }

    #[test]
    fn test_different_salts_differ() {
        let k1 = derive_password_key(b"password", &[1u8; SALT_SIZE], &test_params()).unwrap();
        let k2 = derive_password_key(b"password", &[2u8; SALT_SIZE], &test_params()).unwrap();
        assert_ne!(k1.as_bytes(), k2.as_bytes());
    }

    #[test]
    fn test_invalid_params_rejected() {
        let bad = KdfParams {
            m_cost: 0,
            t_cost: 0,
            p_cost: 0,
        };
        let result = derive_password_key(b"password", &[0u8; SALT_SIZE], &bad);
        assert!(matches!(result, Err(CryptoError::KeyGeneration(_))));
    }

    #[test]
    fn test_default_params() {
        let params = KdfParams::default();
        assert_eq!(params.m_cost, 64 * 1024);
        assert_eq!(params.t_cost, 3);
        assert_eq!(params.p_cost, 4);
    }

    #[test]
    fn test_limits() {
        assert!(KdfParams::default().is_within_limits());
        assert!(test_params().is_within_limits());

        let zero = KdfParams {
            m_cost: 0,
            t_cost: 0,
            p_cost: 0,
        };
        assert!(!zero.is_within_limits());

        let huge = KdfParams {
            m_cost: u32::MAX,
            t_cost: 1,
            p_cost: 1,
        };
        assert!(!huge.is_within_limits());
    }

    #[test]
    fn test_params_serde_roundtrip() {
        let params = KdfParams::default();
        let json = serde_json::to_string(&params).unwrap();
        let restored: KdfParams = serde_json::from_str(&json).unwrap();
        assert_eq!(params, restored);
    }
}
