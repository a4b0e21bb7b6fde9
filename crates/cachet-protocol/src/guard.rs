//! Freshness and version guards.
//!
//! The staleness check is advisory by design: message history must remain
//! decryptable indefinitely, so a stale timestamp becomes a flag on the
//! decrypt result, never a rejection. A stricter deployment can lower the
//! age limit or turn the flag into a hard failure outside this core.
//!
//! The version gate is not advisory: bundles and envelopes below the
//! minimum supported version are rejected on both the encrypt and decrypt
//! paths.

use cachet_keys::{BundleVersion, MIN_SUPPORTED_VERSION};

use crate::{ProtocolError, Result};

/// Default maximum message age in seconds (1 year).
pub const DEFAULT_MAX_AGE_SECS: i64 = 365 * 24 * 60 * 60;

/// Minimum plausible timestamp (2024-01-01 00:00:00 UTC).
const MIN_VALID_TIMESTAMP: i64 = 1704067200;

/// Maximum plausible timestamp (2100-01-01 00:00:00 UTC).
const MAX_VALID_TIMESTAMP: i64 = 4102444800;

/// Whether a message timestamp should be flagged as stale.
///
/// Stateless and advisory: `true` marks the message for the UI, it does
/// not block decryption. Timestamps outside the plausible window count as
/// stale, as do timestamps in the future of `now`.
pub fn is_stale(created_at: i64, now: i64, max_age: i64) -> bool {
    if !(MIN_VALID_TIMESTAMP..=MAX_VALID_TIMESTAMP).contains(&created_at) {
        return true;
    }

    if created_at > now {
        return true;
    }

    now.saturating_sub(created_at) > max_age
}

/// Gate a bundle or envelope version against the supported minimum.
///
/// # Errors
///
/// Returns `ProtocolError::IncompatibleKeyVersion` for a version below
/// [`MIN_SUPPORTED_VERSION`]; never silently downgrades.
pub fn ensure_supported_version(version: BundleVersion) -> Result<()> {
    if version.is_supported() {
        Ok(())
    } else {
        Err(ProtocolError::IncompatibleKeyVersion {
            found: version,
            minimum: MIN_SUPPORTED_VERSION,
        })
    }
}
