//! Bundle schema versioning.
//!
//! Every key bundle and envelope carries a semantic version string that
//! gatekeeps protocol compatibility. Versions below
//! [`MIN_SUPPORTED_VERSION`] are rejected by both the encrypt and decrypt
//! paths rather than silently downgraded.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{KeyError, Result};

/// The version written into newly generated bundles and envelopes.
pub const PROTOCOL_VERSION: BundleVersion = BundleVersion::new(1, 0, 0);

/// The oldest bundle/envelope version this client accepts.
pub const MIN_SUPPORTED_VERSION: BundleVersion = BundleVersion::new(1, 0, 0);

/// A semantic version for the key bundle schema.
///
/// Serializes as a "MAJOR.MINOR.PATCH" string; ordering is lexicographic
/// over the three components.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BundleVersion {
    major: u16,
    minor: u16,
    patch: u16,
}

impl BundleVersion {
    /// Create a version from its components.
    pub const fn new(major: u16, minor: u16, patch: u16) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Whether this version meets the minimum this client accepts.
    pub fn is_supported(&self) -> bool {
        *self >= MIN_SUPPORTED_VERSION
    }
}

impl std::fmt::Display for BundleVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl std::fmt::Debug for BundleVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BundleVersion({})", self)
    }
}

impl FromStr for BundleVersion {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split('.');
        let mut next = || -> Result<u16> {
            parts
                .next()
                .ok_or_else(|| KeyError::InvalidVersion(s.to_string()))?
                .parse()
                .map_err(|_| KeyError::InvalidVersion(s.to_string()))
        };
        let version = Self::new(next()?, next()?, next()?);
        if parts.next().is_some() {
            return Err(KeyError::InvalidVersion(s.to_string()));
        }
        Ok(version)
    }
}

impl Serialize for BundleVersion {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for BundleVersion {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
