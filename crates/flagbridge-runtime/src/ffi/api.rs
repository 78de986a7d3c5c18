//! Native call table
//!
//! Every entry point the bridge uses, resolved once by exact exported name.
//! Binding is all-or-nothing: a single missing symbol fails the whole table.
//!
//! Conventions shared by all entries:
//! - handles are `u64`, `0` meaning "none"
//! - `*const c_char` parameters are borrowed, null-terminated, null = absent
//! - `*mut c_char` results are paired with a `*mut u64` length out-parameter
//!   and must be returned through `free_buffer`
//! - host callbacks that receive pointers are `unsafe extern "C" fn`; the
//!   engine guarantees the buffers for the duration of each call

use super::marshal::{FreeBufferFn, HostFreeFn};
use crate::error::{BridgeError, BridgeResult};
use libloading::Library;
use std::ffi::c_char;
use std::fmt;

/// Native completion for non-blocking calls: `(completion_id, result, result_len)`
pub type CompletionFn = unsafe extern "C" fn(id: u64, result: *const u8, result_len: u64);

/// Adapter lifecycle callback: `(registry_id)`
pub type LifecycleFn = extern "C" fn(id: u64);

/// Adapter lookup returning a host-allocated buffer, null when absent
pub type FetchFn =
    unsafe extern "C" fn(id: u64, key: *const u8, key_len: u64, out_len: *mut u64) -> *mut u8;

/// Key/value store `set`; `time` is null when no timestamp is supplied
pub type StoreSetFn = unsafe extern "C" fn(
    id: u64,
    key: *const u8,
    key_len: u64,
    value: *const u8,
    value_len: u64,
    time: *const u64,
);

/// Adapter predicate over a key or tag
pub type KeyPredicateFn = unsafe extern "C" fn(id: u64, key: *const u8, key_len: u64) -> bool;

/// Adapter call taking a JSON argument payload
pub type PayloadFn = unsafe extern "C" fn(id: u64, payload: *const u8, payload_len: u64);

macro_rules! native_api {
    (
        $(
            $(#[$meta:meta])*
            fn $name:ident($($arg:ident: $ty:ty),* $(,)?) $(-> $ret:ty)?;
        )*
    ) => {
        /// Typed function pointers for every native entry point
        #[derive(Clone, Copy)]
        pub struct NativeApi {
            $(
                $(#[$meta])*
                pub $name: unsafe extern "C" fn($($arg: $ty),*) $(-> $ret)?,
            )*
        }

        impl NativeApi {
            /// Exported names, in binding order
            pub const SYMBOLS: &'static [&'static str] = &[$(stringify!($name)),*];

            /// Resolve every entry point in `library`.
            ///
            /// # Safety
            ///
            /// The library must export each symbol with exactly the declared
            /// signature, and must stay loaded for as long as the table is used.
            pub unsafe fn bind(library: &Library) -> BridgeResult<Self> {
                let api = Self {
                    $( $name: bind_symbol(library, stringify!($name))?, )*
                };
                tracing::info!(symbols = Self::SYMBOLS.len(), "native symbols bound");
                Ok(api)
            }
        }
    };
}

unsafe fn bind_symbol<T: Copy>(library: &Library, name: &str) -> BridgeResult<T> {
    let mut symbol = Vec::with_capacity(name.len() + 1);
    symbol.extend_from_slice(name.as_bytes());
    symbol.push(0);

    match library.get::<T>(&symbol) {
        Ok(sym) => Ok(*sym),
        Err(err) => {
            tracing::error!(symbol = name, error = %err, "native symbol missing");
            Err(BridgeError::symbol_not_found(name))
        }
    }
}

native_api! {
    // Options and users
    fn options_create_from_data(json: *const c_char) -> u64;
    fn options_release(handle: u64);
    fn user_create_from_data(json: *const c_char) -> u64;
    fn user_release(handle: u64);

    // Engine lifecycle
    fn engine_create(sdk_key: *const c_char, options: u64) -> u64;
    fn engine_release(handle: u64);
    fn engine_initialize(handle: u64, completion_id: u64, completion: CompletionFn);
    fn engine_initialize_blocking(handle: u64);
    fn engine_initialize_with_details_blocking(handle: u64, out_len: *mut u64) -> *mut c_char;
    fn engine_shutdown(handle: u64, completion_id: u64, completion: CompletionFn);
    fn engine_shutdown_blocking(handle: u64);
    fn engine_flush_events(handle: u64, completion_id: u64, completion: CompletionFn);
    fn engine_flush_events_blocking(handle: u64);

    // Engine misc
    fn engine_get_current_values(handle: u64, out_len: *mut u64) -> *mut c_char;
    fn engine_log_event(handle: u64, user: u64, event: *const c_char);
    fn engine_identify(handle: u64, user: u64);
    fn engine_get_client_init_response(
        handle: u64,
        user: u64,
        options: *const c_char,
        out_len: *mut u64,
    ) -> *mut c_char;

    // Gates
    fn engine_check_gate(handle: u64, user: u64, name: *const c_char, options: *const c_char) -> bool;
    fn engine_get_feature_gate(
        handle: u64,
        user: u64,
        name: *const c_char,
        options: *const c_char,
        out_len: *mut u64,
    ) -> *mut c_char;
    fn engine_manually_log_gate_exposure(handle: u64, user: u64, name: *const c_char);

    // Dynamic configs
    fn engine_get_dynamic_config(
        handle: u64,
        user: u64,
        name: *const c_char,
        options: *const c_char,
        out_len: *mut u64,
    ) -> *mut c_char;
    fn engine_manually_log_dynamic_config_exposure(handle: u64, user: u64, name: *const c_char);

    // Experiments
    fn engine_get_experiment(
        handle: u64,
        user: u64,
        name: *const c_char,
        options: *const c_char,
        out_len: *mut u64,
    ) -> *mut c_char;
    fn engine_manually_log_experiment_exposure(handle: u64, user: u64, name: *const c_char);

    // Layers
    fn engine_get_layer(
        handle: u64,
        user: u64,
        name: *const c_char,
        options: *const c_char,
        out_len: *mut u64,
    ) -> *mut c_char;
    fn engine_log_layer_param_exposure(handle: u64, layer: *const c_char, param: *const c_char);
    fn engine_manually_log_layer_parameter_exposure(
        handle: u64,
        user: u64,
        layer: *const c_char,
        param: *const c_char,
    );

    // Parameter stores
    fn engine_get_parameter_store(
        handle: u64,
        name: *const c_char,
        options: *const c_char,
        out_len: *mut u64,
    ) -> *mut c_char;
    fn engine_get_string_parameter(
        handle: u64,
        user: u64,
        store: *const c_char,
        param: *const c_char,
        default: *const c_char,
        options: *const c_char,
        out_len: *mut u64,
    ) -> *mut c_char;
    fn engine_get_bool_parameter(
        handle: u64,
        user: u64,
        store: *const c_char,
        param: *const c_char,
        default: bool,
        options: *const c_char,
    ) -> bool;
    fn engine_get_float64_parameter(
        handle: u64,
        user: u64,
        store: *const c_char,
        param: *const c_char,
        default: f64,
        options: *const c_char,
    ) -> f64;
    fn engine_get_int_parameter(
        handle: u64,
        user: u64,
        store: *const c_char,
        param: *const c_char,
        default: i64,
        options: *const c_char,
    ) -> i64;
    fn engine_get_object_parameter(
        handle: u64,
        user: u64,
        store: *const c_char,
        param: *const c_char,
        default: *const c_char,
        options: *const c_char,
        out_len: *mut u64,
    ) -> *mut c_char;
    fn engine_get_array_parameter(
        handle: u64,
        user: u64,
        store: *const c_char,
        param: *const c_char,
        default: *const c_char,
        options: *const c_char,
        out_len: *mut u64,
    ) -> *mut c_char;

    // Local overrides
    fn engine_override_gate(handle: u64, name: *const c_char, value: bool, id: *const c_char);
    fn engine_override_dynamic_config(
        handle: u64,
        name: *const c_char,
        value: *const c_char,
        id: *const c_char,
    );
    fn engine_override_experiment(
        handle: u64,
        name: *const c_char,
        value: *const c_char,
        id: *const c_char,
    );
    fn engine_override_experiment_by_group_name(
        handle: u64,
        name: *const c_char,
        group: *const c_char,
        id: *const c_char,
    );
    fn engine_override_layer(
        handle: u64,
        name: *const c_char,
        value: *const c_char,
        id: *const c_char,
    );
    fn engine_remove_gate_override(handle: u64, name: *const c_char, id: *const c_char);
    fn engine_remove_dynamic_config_override(handle: u64, name: *const c_char, id: *const c_char);
    fn engine_remove_experiment_override(handle: u64, name: *const c_char, id: *const c_char);
    fn engine_remove_layer_override(handle: u64, name: *const c_char, id: *const c_char);
    fn engine_remove_all_overrides(handle: u64);

    // Adapters
    fn data_store_create(
        id: u64,
        initialize: LifecycleFn,
        shutdown: LifecycleFn,
        get: FetchFn,
        set: StoreSetFn,
        should_poll: KeyPredicateFn,
        free: HostFreeFn,
    ) -> u64;
    fn data_store_release(handle: u64);
    fn observability_client_create(
        id: u64,
        init: LifecycleFn,
        increment: PayloadFn,
        gauge: PayloadFn,
        distribution: PayloadFn,
        error: PayloadFn,
        high_cardinality: KeyPredicateFn,
    ) -> u64;
    fn observability_client_release(handle: u64);
    fn persistent_storage_create(
        id: u64,
        load: FetchFn,
        save: PayloadFn,
        delete: PayloadFn,
        free: HostFreeFn,
    ) -> u64;
    fn persistent_storage_release(handle: u64);

    // Utility
    fn metadata_update_values(
        sdk_type: *const c_char,
        os: *const c_char,
        arch: *const c_char,
        language_version: *const c_char,
    );
    fn free_buffer(ptr: *mut c_char);
}

impl NativeApi {
    /// Free function for buffers returned by this table
    pub fn free_fn(&self) -> FreeBufferFn {
        self.free_buffer
    }
}

impl fmt::Debug for NativeApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeApi")
            .field("symbols", &Self::SYMBOLS.len())
            .finish_non_exhaustive()
    }
}
