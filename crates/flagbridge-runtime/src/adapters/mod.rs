//! Host-implemented backends the native engine calls back into
//!
//! Each adapter kind has a trait, a registry of live adapters keyed by id,
//! and a set of fixed `extern "C"` shims. Registering an adapter stores it in
//! its registry and hands the id plus the shims to the native create call;
//! the returned [`AdapterRegistration`] owns both ends.

pub mod data_store;
pub mod observability;
pub mod persistent_storage;

pub use data_store::DataStoreAdapter;
pub use observability::MetricsAdapter;
pub use persistent_storage::{StickyValueStore, StickyValues, UserPersistedValues};

use crate::error::BridgeResult;
use crate::ffi::handle::{HandleKind, NativeHandle, ReleaseFn};
use std::fmt;

/// A host adapter registered with the native engine.
///
/// Releasing it releases the native adapter handle first, then removes the
/// host object from its registry; callbacks arriving afterwards get the
/// adapter kind's default. Dropping the registration does the same.
pub struct AdapterRegistration {
    handle: NativeHandle,
    registry_id: u64,
    unregister: fn(u64),
}

impl AdapterRegistration {
    /// Wrap the native create result for an adapter stored under `registry_id`.
    ///
    /// On a zero handle the adapter is unregistered again before the error
    /// is returned.
    pub(crate) fn new(
        registry_id: u64,
        raw: u64,
        kind: HandleKind,
        release_fn: ReleaseFn,
        unregister: fn(u64),
    ) -> BridgeResult<Self> {
        match NativeHandle::new(raw, kind, release_fn) {
            Ok(handle) => Ok(Self {
                handle,
                registry_id,
                unregister,
            }),
            Err(err) => {
                unregister(registry_id);
                Err(err)
            }
        }
    }

    /// Native adapter handle, `0` once released
    pub fn raw(&self) -> u64 {
        self.handle.raw()
    }

    pub fn registry_id(&self) -> u64 {
        self.registry_id
    }

    pub fn kind(&self) -> HandleKind {
        self.handle.kind()
    }

    pub fn is_released(&self) -> bool {
        self.handle.is_released()
    }

    /// Release the native adapter and unregister the host object.
    ///
    /// Returns `true` only for the call that performed the release.
    pub fn release(&self) -> bool {
        let released = self.handle.release();
        if released {
            (self.unregister)(self.registry_id);
        }
        released
    }
}

impl Drop for AdapterRegistration {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for AdapterRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterRegistration")
            .field("kind", &self.kind())
            .field("raw", &self.raw())
            .field("registry_id", &self.registry_id)
            .finish()
    }
}
