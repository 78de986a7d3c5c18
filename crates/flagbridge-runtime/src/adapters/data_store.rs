//! Key/value store adapter
//!
//! Lets a host cache (Redis, a file, an in-memory map) serve as the engine's
//! config store. Keys and values cross the boundary as `(ptr, len)` byte
//! ranges so embedded NUL bytes survive.

use super::AdapterRegistration;
use crate::error::BridgeResult;
use crate::ffi::handle::HandleKind;
use crate::ffi::marshal::{borrow_str, host_free_buffer, into_host_buffer};
use crate::ffi::registry::CallbackRegistry;
use crate::ffi::Bridge;
use std::ptr;
use std::sync::{Arc, OnceLock};

/// Host-side key/value store used by the engine
///
/// Methods are called synchronously from native threads and must return
/// promptly.
pub trait DataStoreAdapter: Send + Sync {
    fn initialize(&self) {}

    fn shutdown(&self) {}

    /// Value stored under `key`, `None` when absent.
    fn get(&self, key: &str) -> Option<String>;

    /// Store `value` under `key`; `time` is the engine's update timestamp, if any.
    fn set(&self, key: &str, value: &str, time: Option<u64>);

    /// Whether the engine should poll this store for updates to `key`.
    fn should_poll_key(&self, _key: &str) -> bool {
        false
    }
}

fn registry() -> &'static CallbackRegistry<dyn DataStoreAdapter> {
    static STORES: OnceLock<CallbackRegistry<dyn DataStoreAdapter>> = OnceLock::new();
    STORES.get_or_init(|| CallbackRegistry::new("data store"))
}

fn unregister(id: u64) {
    registry().unregister(id);
}

/// Register `adapter` with the native engine.
pub fn register(bridge: &Bridge, adapter: Arc<dyn DataStoreAdapter>) -> BridgeResult<AdapterRegistration> {
    let api = bridge.api();
    let id = registry().register(adapter);

    let raw = unsafe {
        (api.data_store_create)(
            id,
            store_initialize,
            store_shutdown,
            store_get,
            store_set,
            store_should_poll,
            host_free_buffer,
        )
    };
    AdapterRegistration::new(id, raw, HandleKind::DataStore, api.data_store_release, unregister)
}

// The pointer-taking shims are unsafe to call: native code passes buffers
// valid for the duration of the call and a writable `out_len`.

extern "C" fn store_initialize(id: u64) {
    registry().dispatch(id, "initialize", (), |store| store.initialize());
}

extern "C" fn store_shutdown(id: u64) {
    registry().dispatch(id, "shutdown", (), |store| store.shutdown());
}

unsafe extern "C" fn store_get(id: u64, key: *const u8, key_len: u64, out_len: *mut u64) -> *mut u8 {
    registry().dispatch(id, "get", ptr::null_mut(), |store| {
        // SAFETY: the engine passes a key buffer valid for the call.
        let key = match unsafe { borrow_str(key, key_len, "data store key") } {
            Ok(key) => key,
            Err(err) => {
                tracing::warn!(registry_id = id, error = %err, "data store get: bad key");
                return ptr::null_mut();
            }
        };

        match store.get(key) {
            // SAFETY: `out_len` is the engine's out-parameter for this call.
            Some(value) => unsafe { into_host_buffer(value.into_bytes(), out_len) },
            None => ptr::null_mut(),
        }
    })
}

unsafe extern "C" fn store_set(
    id: u64,
    key: *const u8,
    key_len: u64,
    value: *const u8,
    value_len: u64,
    time: *const u64,
) {
    registry().dispatch(id, "set", (), |store| {
        // SAFETY: buffers and the optional timestamp are valid for the call.
        let args = unsafe {
            borrow_str(key, key_len, "data store key").and_then(|key| {
                borrow_str(value, value_len, "data store value").map(|value| (key, value))
            })
        };
        let time = if time.is_null() {
            None
        } else {
            Some(unsafe { *time })
        };

        match args {
            Ok((key, value)) => store.set(key, value, time),
            Err(err) => tracing::warn!(registry_id = id, error = %err, "data store set: bad arguments"),
        }
    });
}

unsafe extern "C" fn store_should_poll(id: u64, key: *const u8, key_len: u64) -> bool {
    registry().dispatch(id, "should_poll_key", false, |store| {
        match unsafe { borrow_str(key, key_len, "data store key") } {
            Ok(key) => store.should_poll_key(key),
            Err(err) => {
                tracing::warn!(registry_id = id, error = %err, "data store poll check: bad key");
                false
            }
        }
    })
}
