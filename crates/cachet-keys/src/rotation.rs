//! Rotation policy.
//!
//! Bundles carry a `rotation_due` timestamp stamped at generation;
//! [`should_rotate`] is the pure policy check the caller consults to
//! decide whether to generate a successor. The check fires a grace window
//! ahead of the due time so rotation can be scheduled before the bundle
//! ages out, and it also fires for bundles whose schema version has
//! fallen below the accepted minimum.
//!
//! Timestamps outside the plausible window are treated as a reason to
//! rotate: a bundle whose clock data cannot be trusted should not stay in
//! service.

use crate::bundle::PublicKeyBundle;

/// Rotation period in seconds (30 days).
pub const ROTATION_PERIOD_SECS: i64 = 30 * 24 * 60 * 60;

/// Grace window before the due time in seconds (7 days).
pub const ROTATION_GRACE_SECS: i64 = 7 * 24 * 60 * 60;

/// Maximum allowed clock skew in seconds (5 minutes).
pub const MAX_CLOCK_SKEW_SECS: i64 = 300;

/// Minimum valid timestamp (2024-01-01 00:00:00 UTC).
pub const MIN_VALID_TIMESTAMP: i64 = 1704067200;

/// Maximum valid timestamp (2100-01-01 00:00:00 UTC).
pub const MAX_VALID_TIMESTAMP: i64 = 4102444800;

/// Compute the rotation-due timestamp for a bundle generated at `now`.
pub fn rotation_due_from(now: i64) -> i64 {
    now.saturating_add(ROTATION_PERIOD_SECS)
}

/// Validate that a timestamp is within acceptable bounds.
pub fn is_valid_timestamp(timestamp: i64) -> bool {
    (MIN_VALID_TIMESTAMP..=MAX_VALID_TIMESTAMP).contains(&timestamp)
}

/// Decide whether a bundle is due for rotation.
///
/// Pure function, no side effects; the caller decides whether and when to
/// act. Returns `true` when:
/// - `now >= rotation_due - ROTATION_GRACE_SECS`, or
/// - the bundle version is below the accepted minimum, or
/// - the bundle timestamps are implausible (out of bounds, or created in
///   the future beyond clock skew)
pub fn should_rotate(bundle: &PublicKeyBundle, now: i64) -> bool {
    if !bundle.version.is_supported() {
        return true;
    }

    if !is_valid_timestamp(bundle.created_at) || !is_valid_timestamp(now) {
        return true;
    }

    if bundle.created_at > now.saturating_add(MAX_CLOCK_SKEW_SECS) {
        return true;
    }

    now >= bundle.rotation_due.saturating_sub(ROTATION_GRACE_SECS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::PrivateKeyBundle;

    const BASE_TIME: i64 = 1710000000; // March 2024
    const DAY: i64 = 24 * 60 * 60;

    fn test_bundle() -> PublicKeyBundle {
        PrivateKeyBundle::generate_at(BASE_TIME).unwrap().public().clone()
    }

    #[test]
    fn test_fresh_bundle_does_not_rotate() {
        let bundle = test_bundle();
        assert!(!should_rotate(&bundle, BASE_TIME));
        assert!(!should_rotate(&bundle, BASE_TIME + DAY));
    }

    #[test]
    fn test_rotates_inside_grace_window() {
        let bundle = test_bundle();
        // Due at day 30, grace 7 days: rotation fires from day 23
        assert!(!should_rotate(&bundle, BASE_TIME + 22 * DAY));
        assert!(should_rotate(&bundle, BASE_TIME + 23 * DAY));
        assert!(should_rotate(&bundle, BASE_TIME + 29 * DAY));
    }

    #[test]
    fn test_rotates_past_due() {
        let bundle = test_bundle();
        assert!(should_rotate(&bundle, BASE_TIME + 30 * DAY));
        assert!(should_rotate(&bundle, BASE_TIME + 365 * DAY));
    }

    #[test]
    fn test_grace_boundary_exact() {
        let bundle = test_bundle();
        let boundary = bundle.rotation_due - ROTATION_GRACE_SECS;
        assert!(!should_rotate(&bundle, boundary - 1));
        assert!(should_rotate(&bundle, boundary));
    }

    #[test]
    fn test_unsupported_version_forces_rotation() {
        let mut bundle = test_bundle();
        bundle.version = "0.9.0".parse().unwrap();
        // Fresh by time, stale by version
        assert!(should_rotate(&bundle, BASE_TIME));
    }

    #[test]
    fn test_invalid_created_at_forces_rotation() {
        let mut bundle = test_bundle();
        bundle.created_at = 1000000000; // 2001, before the valid window
        assert!(should_rotate(&bundle, BASE_TIME));
    }

    #[test]
    fn test_invalid_now_forces_rotation() {
        let bundle = test_bundle();
        assert!(should_rotate(&bundle, 0));
        assert!(should_rotate(&bundle, MAX_VALID_TIMESTAMP + 1));
    }

    #[test]
    fn test_future_created_at_forces_rotation() {
        let mut bundle = test_bundle();
        bundle.created_at = BASE_TIME + MAX_CLOCK_SKEW_SECS + 1000;
        bundle.rotation_due = rotation_due_from(bundle.created_at);
        assert!(should_rotate(&bundle, BASE_TIME));
    }

    #[test]
    fn test_small_clock_skew_tolerated() {
        let mut bundle = test_bundle();
        bundle.created_at = BASE_TIME + MAX_CLOCK_SKEW_SECS - 10;
        bundle.rotation_due = rotation_due_from(bundle.created_at);
        assert!(!should_rotate(&bundle, BASE_TIME));
    }

    #[test]
    fn test_rotation_due_from() {
        assert_eq!(rotation_due_from(BASE_TIME), BASE_TIME + 30 * DAY);
    }

    #[test]
    fn test_constants_consistent() {
        assert!(ROTATION_GRACE_SECS < ROTATION_PERIOD_SECS);
        assert!(MIN_VALID_TIMESTAMP < MAX_VALID_TIMESTAMP);
    }
}
