//! Base64 and UTF-8 conversions.
//!
//! Pure, stateless helpers for moving binary material across the JSON
//! boundary. All key and ciphertext bytes are Base64-armored on the wire;
//! message plaintext crosses as UTF-8.

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::{CryptoError, Result};

/// Encode bytes as standard Base64 with padding.
pub fn base64_encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode a standard Base64 string.
///
/// # Errors
///
/// Returns `CryptoError::InvalidEncoding` if the input is not valid Base64.
pub fn base64_decode(input: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(input)
        .map_err(|e| CryptoError::InvalidEncoding(format!("invalid base64: {}", e)))
}

/// Encode a string as UTF-8 bytes.
pub fn utf8_encode(input: &str) -> Vec<u8> {
    input.as_bytes().to_vec()
}

/// Decode UTF-8 bytes into a string.
///
/// # Errors
///
/// Returns `CryptoError::InvalidEncoding` if the input is not valid UTF-8.
pub fn utf8_decode(bytes: &[u8]) -> Result<String> {
    String::from_utf8(bytes.to_vec())
        .map_err(|_| CryptoError::InvalidEncoding("invalid UTF-8".to_string()))
}

/// Serde adapter: `Vec<u8>` as a Base64 string.
///
/// Use with `#[serde(with = "cachet_crypto::codec::b64")]`.
pub mod b64 {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::STANDARD;
    use base64::Engine as _;

    /// Serialize bytes as a Base64 string.
    pub fn serialize<S>(bytes: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    /// Deserialize a Base64 string into bytes.
    pub fn deserialize<'de, D>(deserializer: D) -> std::result::Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}

/// Serde adapter: fixed-size byte array as a Base64 string.
///
/// Use with `#[serde(with = "cachet_crypto::codec::b64_array")]`.
pub mod b64_array {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::STANDARD;
    use base64::Engine as _;

    /// Serialize a byte array as a Base64 string.
    pub fn serialize<S, const N: usize>(
        bytes: &[u8; N],
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    /// Deserialize a Base64 string into a byte array of exactly `N` bytes.
    pub fn deserialize<'de, D, const N: usize>(
        deserializer: D,
    ) -> std::result::Result<[u8; N], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let decoded = STANDARD.decode(&s).map_err(serde::de::Error::custom)?;
        decoded
            .try_into()
            .map_err(|v: Vec<u8>| serde::de::Error::custom(format!("expected {} bytes, got {}", N, v.len())))
    }
}

/// Serialize bytes as a Base64 string (manual `Serialize` impls).
pub(crate) fn serialize_b64<S>(bytes: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&STANDARD.encode(bytes))
}

/// Deserialize a Base64 string into a fixed-size array (manual `Deserialize` impls).
pub(crate) fn deserialize_b64_array<'de, D, const N: usize>(
    deserializer: D,
) -> std::result::Result<[u8; N], D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize;
    let s = String::deserialize(deserializer)?;
    let decoded = STANDARD.decode(&s).map_err(serde::de::Error::custom)?;
    decoded
        .try_into()
        .map_err(|v: Vec<u8>| serde::de::Error::custom(format!("expected {} bytes, got {}", N, v.len())))
}
