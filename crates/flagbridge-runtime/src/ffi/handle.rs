//! Native handle lifecycle
//!
//! Every resource created on the native side is identified by a `u64`
//! handle. A [`NativeHandle`] owns exactly one of them and guarantees that the
//! matching native release function runs at most once, whether release is
//! requested explicitly, concurrently from several threads, or by `Drop`.

use crate::error::{BridgeError, BridgeResult};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Native release entry point: `void xxx_release(uint64_t handle)`
pub type ReleaseFn = unsafe extern "C" fn(handle: u64);

/// Kind of native resource behind a handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    Engine,
    User,
    Options,
    DataStore,
    ObservabilityClient,
    PersistentStorage,
}

impl fmt::Display for HandleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HandleKind::Engine => "engine",
            HandleKind::User => "user",
            HandleKind::Options => "options",
            HandleKind::DataStore => "data store",
            HandleKind::ObservabilityClient => "observability client",
            HandleKind::PersistentStorage => "persistent storage",
        };
        f.write_str(name)
    }
}

/// Exclusive owner of one native handle.
///
/// Using the handle from one thread while another thread is releasing it is
/// a caller error; the wrapper only guarantees that release is issued once.
pub struct NativeHandle {
    raw: AtomicU64,
    kind: HandleKind,
    release_fn: ReleaseFn,
}

impl NativeHandle {
    /// Wrap the result of a native create call.
    ///
    /// A zero handle means the create call failed; no wrapper is built and
    /// nothing will be released.
    pub fn new(raw: u64, kind: HandleKind, release_fn: ReleaseFn) -> BridgeResult<Self> {
        if raw == 0 {
            tracing::warn!(%kind, "native create returned a zero handle");
            return Err(BridgeError::CreateFailed { kind });
        }

        tracing::debug!(%kind, handle = raw, "native handle created");
        Ok(Self {
            raw: AtomicU64::new(raw),
            kind,
            release_fn,
        })
    }

    /// Current handle value, `0` once released.
    ///
    /// Read queries pass this straight through; the native side treats an
    /// unknown or zero handle as "not found" and returns its default.
    pub fn raw(&self) -> u64 {
        self.raw.load(Ordering::Acquire)
    }

    /// Current handle value, or an error if it was released.
    pub fn require(&self) -> BridgeResult<u64> {
        match self.raw() {
            0 => Err(BridgeError::Released { kind: self.kind }),
            raw => Ok(raw),
        }
    }

    /// Resource kind
    pub fn kind(&self) -> HandleKind {
        self.kind
    }

    /// Whether release has already happened
    pub fn is_released(&self) -> bool {
        self.raw() == 0
    }

    /// Release the native resource.
    ///
    /// Returns `true` if this call issued the native release, `false` if the
    /// handle had already been released. Safe to call any number of times
    /// from any thread.
    pub fn release(&self) -> bool {
        let previous = self.raw.swap(0, Ordering::AcqRel);
        if previous == 0 {
            return false;
        }

        // SAFETY: `previous` came from the matching create call and the swap
        // above guarantees no other path will pass it to release again.
        unsafe { (self.release_fn)(previous) };
        tracing::debug!(kind = %self.kind, handle = previous, "native handle released");
        true
    }
}

impl Drop for NativeHandle {
    fn drop(&mut self) {
        if self.release() {
            tracing::trace!(kind = %self.kind, "handle released on drop");
        }
    }
}

impl fmt::Debug for NativeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeHandle")
            .field("kind", &self.kind)
            .field("raw", &self.raw())
            .finish()
    }
}
