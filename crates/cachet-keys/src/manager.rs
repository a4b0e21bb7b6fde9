//! The active-bundle key manager.
//!
//! Process-wide holder of the current private bundle. Rotation replaces
//! the bundle atomically; readers take a copy-on-read snapshot
//! (`Arc<PrivateKeyBundle>`), so an in-flight encrypt or decrypt keeps
//! using the bundle it captured while a concurrent rotation swaps in the
//! successor. A half-rotated bundle is never observable.

use std::sync::{Arc, RwLock};

use chrono::Utc;

use crate::bundle::{PrivateKeyBundle, PublicKeyBundle};
use crate::rotation;
use crate::Result;

/// Single-writer holder of the active private key bundle.
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
pub struct KeyManager {
    active: RwLock<Arc<PrivateKeyBundle>>,
}

impl KeyManager {
    /// Create a manager around an existing bundle (e.g. after unwrap).
    pub fn new(bundle: PrivateKeyBundle) -> Self {
        Self {
            active: RwLock::new(Arc::new(bundle)),
        }
    }

    /// Create a manager with a freshly generated bundle.
    ///
    /// # Errors
    ///
    /// Returns `KeyError::KeyGeneration` if generation fails.
    pub fn generate() -> Result<Self> {
        Ok(Self::new(PrivateKeyBundle::generate()?))
    }

    /// Take a copy-on-read snapshot of the active bundle.
    ///
    /// The snapshot stays valid across concurrent rotations; operations
    /// that began against it complete against it.
    pub fn snapshot(&self) -> Arc<PrivateKeyBundle> {
        self.active
            .read()
            .expect("key manager lock poisoned")
            .clone()
    }

    /// The active bundle's public half, cloned for publication.
    pub fn public_bundle(&self) -> PublicKeyBundle {
        self.snapshot().public().clone()
    }

    /// Whether the active bundle is due for rotation at the current time.
    pub fn should_rotate(&self) -> bool {
        self.should_rotate_at(Utc::now().timestamp())
    }

    /// Whether the active bundle is due for rotation at an explicit time.
    pub fn should_rotate_at(&self, now: i64) -> bool {
        rotation::should_rotate(self.snapshot().public(), now)
    }

    /// Generate a successor bundle and swap it in atomically.
    ///
    /// Returns the superseded bundle; the caller decides whether to retain
    /// it for decrypting history or let it drop (accepted data loss).
    ///
    /// # Errors
    ///
    /// Returns `KeyError::KeyGeneration` if generation fails; the active
    /// bundle is left unchanged in that case.
    pub fn rotate(&self) -> Result<Arc<PrivateKeyBundle>> {
        let successor = Arc::new(PrivateKeyBundle::generate()?);

        let superseded = {
            let mut active = self.active.write().expect("key manager lock poisoned");
            std::mem::replace(&mut *active, successor.clone())
        };

        tracing::info!(
            old_key_id = %superseded.key_id(),
            new_key_id = %successor.key_id(),
            "rotated key bundle"
        );

        Ok(superseded)
    }
}

impl std::fmt::Debug for KeyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyManager")
            .field("active_key_id", &self.snapshot().key_id())
            .finish()
    }
}
