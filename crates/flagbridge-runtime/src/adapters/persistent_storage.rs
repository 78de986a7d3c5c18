//! Sticky-value storage adapter
//!
//! Persists per-user experiment assignments so a user keeps their group even
//! after the experiment's allocation changes. The engine exchanges values as
//! JSON; `load` returns every sticky value stored under a user key, keyed by
//! config name.

use super::AdapterRegistration;
use crate::error::BridgeResult;
use crate::ffi::handle::HandleKind;
use crate::ffi::marshal::{
    borrow_bytes, borrow_str, decode_json, host_free_buffer, into_host_buffer, MarshalError,
};
use crate::ffi::registry::CallbackRegistry;
use crate::ffi::Bridge;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::ptr;
use std::sync::{Arc, OnceLock};

/// Gate evaluation that contributed to a sticky assignment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecondaryExposure {
    pub gate: String,
    #[serde(rename = "gateValue")]
    pub gate_value: String,
    #[serde(rename = "ruleID")]
    pub rule_id: String,
}

/// One stored assignment
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StickyValues {
    pub value: bool,
    #[serde(default)]
    pub json_value: Option<HashMap<String, Value>>,
    pub rule_id: String,
    #[serde(default)]
    pub group_name: Option<String>,
    #[serde(default)]
    pub secondary_exposures: Vec<SecondaryExposure>,
    #[serde(default)]
    pub undelegated_secondary_exposures: Option<Vec<SecondaryExposure>>,
    #[serde(default)]
    pub config_delegate: Option<String>,
    #[serde(default)]
    pub explicit_parameters: Option<Vec<String>>,
    pub time: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_version: Option<i64>,
}

/// Sticky values for one storage key, by config name
pub type UserPersistedValues = HashMap<String, StickyValues>;

/// Host-side sticky value store
pub trait StickyValueStore: Send + Sync {
    fn load(&self, key: &str) -> Option<UserPersistedValues>;

    fn save(&self, key: &str, config_name: &str, data: StickyValues);

    fn delete(&self, key: &str, config_name: &str);
}

#[derive(Debug, Deserialize)]
struct StorageArgs {
    key: String,
    config_name: String,
    #[serde(default)]
    data: Option<StickyValues>,
}

fn registry() -> &'static CallbackRegistry<dyn StickyValueStore> {
    static STORES: OnceLock<CallbackRegistry<dyn StickyValueStore>> = OnceLock::new();
    STORES.get_or_init(|| CallbackRegistry::new("persistent storage"))
}

fn unregister(id: u64) {
    registry().unregister(id);
}

/// Register `store` with the native engine.
pub fn register(bridge: &Bridge, store: Arc<dyn StickyValueStore>) -> BridgeResult<AdapterRegistration> {
    let api = bridge.api();
    let id = registry().register(store);

    let raw = unsafe {
        (api.persistent_storage_create)(id, storage_load, storage_save, storage_delete, host_free_buffer)
    };
    AdapterRegistration::new(
        id,
        raw,
        HandleKind::PersistentStorage,
        api.persistent_storage_release,
        unregister,
    )
}

/// # Safety
///
/// `payload` must be valid for reads of `payload_len` bytes for the call.
unsafe fn decode_args(payload: *const u8, payload_len: u64) -> Result<StorageArgs, MarshalError> {
    let bytes = unsafe { borrow_bytes(payload, payload_len) }?;
    decode_json(bytes, "persistent storage arguments")
}

unsafe extern "C" fn storage_load(id: u64, key: *const u8, key_len: u64, out_len: *mut u64) -> *mut u8 {
    registry().dispatch(id, "load", ptr::null_mut(), |store| {
        let key = match unsafe { borrow_str(key, key_len, "storage key") } {
            Ok(key) => key,
            Err(err) => {
                tracing::warn!(registry_id = id, error = %err, "sticky load: bad key");
                return ptr::null_mut();
            }
        };

        let Some(values) = store.load(key) else {
            return ptr::null_mut();
        };
        match serde_json::to_vec(&values) {
            // SAFETY: `out_len` is the engine's out-parameter for this call.
            Ok(json) => unsafe { into_host_buffer(json, out_len) },
            Err(err) => {
                tracing::warn!(registry_id = id, error = %err, "sticky load: encoding failed");
                ptr::null_mut()
            }
        }
    })
}

unsafe extern "C" fn storage_save(id: u64, payload: *const u8, payload_len: u64) {
    registry().dispatch(id, "save", (), |store| match unsafe { decode_args(payload, payload_len) } {
        Ok(StorageArgs {
            key,
            config_name,
            data: Some(data),
        }) => store.save(&key, &config_name, data),
        Ok(_) => tracing::warn!(registry_id = id, "sticky save without data"),
        Err(err) => tracing::warn!(registry_id = id, error = %err, "sticky save: bad arguments"),
    });
}

unsafe extern "C" fn storage_delete(id: u64, payload: *const u8, payload_len: u64) {
    registry().dispatch(id, "delete", (), |store| match unsafe { decode_args(payload, payload_len) } {
        Ok(args) => store.delete(&args.key, &args.config_name),
        Err(err) => tracing::warn!(registry_id = id, error = %err, "sticky delete: bad arguments"),
    });
}
