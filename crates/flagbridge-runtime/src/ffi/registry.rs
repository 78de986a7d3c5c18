//! Id-indexed registry for host objects reachable from native callbacks
//!
//! Native code never holds a host pointer. It holds a `u64` registry id and
//! calls a fixed `extern "C"` shim, which looks the id up here and invokes the
//! host object. Lookups take the read lock only long enough to clone the
//! `Arc`, so a slow adapter never blocks dispatch to other ids, and an
//! adapter that is unregistered mid-call finishes that call normally.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// Shared across all registries so an id never names two objects.
static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Concurrent map from registry id to host object
pub struct CallbackRegistry<T: ?Sized> {
    name: &'static str,
    entries: RwLock<HashMap<u64, Arc<T>>>,
}

impl<T: ?Sized> CallbackRegistry<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Store `value` under a fresh, process-unique, non-zero id.
    pub fn register(&self, value: Arc<T>) -> u64 {
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, value);
        tracing::debug!(registry = self.name, registry_id = id, "registered");
        id
    }

    pub fn get(&self, id: u64) -> Option<Arc<T>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    /// Remove `id`. Calls that already looked it up keep their reference.
    pub fn unregister(&self, id: u64) -> Option<Arc<T>> {
        let removed = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        if removed.is_some() {
            tracing::debug!(registry = self.name, registry_id = id, "unregistered");
        }
        removed
    }

    pub fn contains(&self, id: u64) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke `call` on the object registered under `id`.
    ///
    /// Returns `default` when the id is unknown (never registered or already
    /// unregistered) or when the host object panics. Panics are caught here
    /// and never unwind into native frames.
    pub fn dispatch<R>(
        &self,
        id: u64,
        method: &'static str,
        default: R,
        call: impl FnOnce(&T) -> R,
    ) -> R {
        let Some(target) = self.get(id) else {
            tracing::warn!(
                registry = self.name,
                registry_id = id,
                method,
                "callback for unknown registry id"
            );
            return default;
        };

        tracing::trace!(registry = self.name, registry_id = id, method, "dispatch");
        match panic::catch_unwind(AssertUnwindSafe(|| call(&target))) {
            Ok(result) => result,
            Err(payload) => {
                tracing::error!(
                    registry = self.name,
                    registry_id = id,
                    method,
                    panic = panic_message(payload.as_ref()),
                    "host callback panicked"
                );
                default
            }
        }
    }
}

/// Run a shim body that has no registry lookup, with the same panic guard.
pub(crate) fn guard<R>(what: &'static str, default: R, body: impl FnOnce() -> R) -> R {
    match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(result) => result,
        Err(payload) => {
            tracing::error!(
                callback = what,
                panic = panic_message(payload.as_ref()),
                "host callback panicked"
            );
            default
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}
