//! Engine facade
//!
//! Forwards every operation to the bound call table. Construction and the
//! lifecycle calls (initialize, shutdown, flush) report failures as
//! [`BridgeError`](crate::error::BridgeError). Read queries never fail: when
//! the bridge cannot produce a value they log and return a default (see each
//! method). Exposure, event and override calls are fire-and-forget and only
//! log.

use crate::error::BridgeResult;
use crate::ffi::completion::{completion_callback, Completion};
use crate::ffi::handle::{HandleKind, NativeHandle};
use crate::ffi::marshal::{self, decode_json, encode_json, opt_ptr, to_cstring, MarshalError};
use crate::ffi::Bridge;
use crate::options::Options;
use crate::types::{
    ClientInitResponseOptions, DynamicConfig, EvaluationOptions, Event, Experiment, FeatureGate,
    InitializeDetails, JsonObject, Layer, ParameterStore,
};
use crate::user::User;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::ffi::{c_char, CString};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

type EvaluateFn = unsafe extern "C" fn(u64, u64, *const c_char, *const c_char, *mut u64) -> *mut c_char;
type ExposureFn = unsafe extern "C" fn(u64, u64, *const c_char);
type OverrideJsonFn = unsafe extern "C" fn(u64, *const c_char, *const c_char, *const c_char);
type RemoveOverrideFn = unsafe extern "C" fn(u64, *const c_char, *const c_char);

/// Log a marshaling failure for `op` and drop the value.
fn marshaled<T>(op: &'static str, result: Result<T, MarshalError>) -> Option<T> {
    result
        .map_err(|err| tracing::warn!(op, error = %err, "argument marshaling failed"))
        .ok()
}

/// A native evaluation engine instance
pub struct Engine {
    bridge: &'static Bridge,
    handle: NativeHandle,
    shut_down: AtomicBool,
    // Dropped after `handle`; the engine may reference its options until released.
    options: Option<Arc<Options>>,
}

impl Engine {
    /// Create an engine through the process-wide bridge.
    pub fn new(sdk_key: &str, options: Option<Arc<Options>>) -> BridgeResult<Engine> {
        Self::new_in(Bridge::global()?, sdk_key, options)
    }

    /// Create an engine through `bridge`. Released `options` are rejected.
    pub fn new_in(
        bridge: &'static Bridge,
        sdk_key: &str,
        options: Option<Arc<Options>>,
    ) -> BridgeResult<Engine> {
        let key = to_cstring(sdk_key, "sdk key")?;
        let options_raw = match &options {
            Some(options) => options.require()?,
            None => 0,
        };

        let api = bridge.api();
        let raw = unsafe { (api.engine_create)(key.as_ptr(), options_raw) };
        let handle = NativeHandle::new(raw, HandleKind::Engine, api.engine_release)?;

        Ok(Engine {
            bridge,
            handle,
            shut_down: AtomicBool::new(false),
            options,
        })
    }

    /// Native handle, `0` once released
    pub fn raw(&self) -> u64 {
        self.handle.raw()
    }

    pub fn options(&self) -> Option<&Arc<Options>> {
        self.options.as_ref()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    // ----------------------------------------------------------------- lifecycle

    /// Start initialization; the completion resolves when it finishes.
    pub fn initialize(&self) -> BridgeResult<Completion> {
        let raw = self.handle.require()?;
        let completion = Completion::pending();
        unsafe { (self.bridge.api().engine_initialize)(raw, completion.id(), completion_callback) };
        Ok(completion)
    }

    /// Initialize, blocking the calling thread until done.
    pub fn initialize_blocking(&self) -> BridgeResult<()> {
        let raw = self.handle.require()?;
        unsafe { (self.bridge.api().engine_initialize_blocking)(raw) };
        tracing::debug!(handle = raw, "engine initialized");
        Ok(())
    }

    /// Initialize, blocking, and report how it went.
    pub fn initialize_with_details(&self) -> BridgeResult<InitializeDetails> {
        let raw = self.handle.require()?;
        let api = self.bridge.api();
        // SAFETY: the result buffer comes from this bridge's engine.
        let json = unsafe {
            self.bridge
                .use_native_string(|len| (api.engine_initialize_with_details_blocking)(raw, len))
        }?;
        Ok(decode_json(json.as_bytes(), "initialize details")?)
    }

    /// Start a shutdown. Shutting down twice resolves immediately.
    pub fn shutdown(&self) -> BridgeResult<Completion> {
        let Some(raw) = self.begin_shutdown() else {
            return Ok(Completion::resolved());
        };
        let completion = Completion::pending();
        unsafe { (self.bridge.api().engine_shutdown)(raw, completion.id(), completion_callback) };
        Ok(completion)
    }

    /// Flush buffered events and stop background work, blocking.
    ///
    /// Idempotent: only the first call reaches the engine. Shutting down an
    /// engine whose handle was already released is a no-op.
    pub fn shutdown_blocking(&self) -> BridgeResult<()> {
        if let Some(raw) = self.begin_shutdown() {
            unsafe { (self.bridge.api().engine_shutdown_blocking)(raw) };
            tracing::debug!(handle = raw, "engine shut down");
        }
        Ok(())
    }

    fn begin_shutdown(&self) -> Option<u64> {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            tracing::debug!("engine already shut down");
            return None;
        }
        match self.handle.raw() {
            0 => {
                tracing::debug!("shutdown after release; nothing to do");
                None
            }
            raw => Some(raw),
        }
    }

    pub fn flush_events(&self) -> BridgeResult<Completion> {
        let raw = self.handle.require()?;
        let completion = Completion::pending();
        unsafe { (self.bridge.api().engine_flush_events)(raw, completion.id(), completion_callback) };
        Ok(completion)
    }

    pub fn flush_events_blocking(&self) -> BridgeResult<()> {
        let raw = self.handle.require()?;
        unsafe { (self.bridge.api().engine_flush_events_blocking)(raw) };
        Ok(())
    }

    /// Release the native engine.
    ///
    /// Call [`shutdown_blocking`](Self::shutdown_blocking) first; releasing a
    /// running engine discards its buffered events. Returns `true` only for
    /// the call that performed the release.
    pub fn release(&self) -> bool {
        let released = self.handle.release();
        if released && !self.is_shut_down() {
            tracing::warn!("engine released without shutdown; buffered events are discarded");
        }
        released
    }

    // ----------------------------------------------------------------- helpers

    fn live(&self, op: &'static str) -> Option<u64> {
        match self.handle.raw() {
            0 => {
                tracing::warn!(op, "engine handle already released");
                None
            }
            raw => Some(raw),
        }
    }

    fn live_with_user(&self, op: &'static str, user: &User) -> Option<(u64, u64)> {
        let engine = self.live(op)?;
        match user.raw() {
            0 => {
                tracing::warn!(op, "user handle already released");
                None
            }
            raw => Some((engine, raw)),
        }
    }

    fn decode<T: DeserializeOwned>(op: &'static str, bytes: Option<Vec<u8>>) -> Option<T> {
        let Some(bytes) = bytes else {
            tracing::debug!(op, "engine returned no value");
            return None;
        };
        match decode_json(&bytes, op) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(op, error = %err, "result decoding failed");
                None
            }
        }
    }

    fn evaluate_bytes(
        &self,
        op: &'static str,
        call: EvaluateFn,
        user: &User,
        name: &str,
        options: Option<EvaluationOptions>,
    ) -> Option<Vec<u8>> {
        let (engine, user) = self.live_with_user(op, user)?;
        let name = marshaled(op, to_cstring(name, "name"))?;
        let options = marshaled(op, marshal::encode_opt_json(options.as_ref(), "evaluation options"))?;

        // SAFETY: `call` is an entry of this bridge's table.
        unsafe {
            self.bridge
                .use_native_bytes(|len| call(engine, user, name.as_ptr(), opt_ptr(&options), len))
        }
    }

    fn evaluate<T: DeserializeOwned>(
        &self,
        op: &'static str,
        call: EvaluateFn,
        user: &User,
        name: &str,
        options: Option<EvaluationOptions>,
    ) -> Option<T> {
        Self::decode(op, self.evaluate_bytes(op, call, user, name, options))
    }

    fn log_exposure(&self, op: &'static str, call: ExposureFn, user: &User, name: &str) {
        let Some((engine, user)) = self.live_with_user(op, user) else {
            return;
        };
        let Some(name) = marshaled(op, to_cstring(name, "name")) else {
            return;
        };
        unsafe { call(engine, user, name.as_ptr()) };
    }

    // ----------------------------------------------------------------- gates

    /// Gate value; `false` when it cannot be evaluated.
    pub fn check_gate(&self, user: &User, name: &str) -> bool {
        self.check_gate_with_options(user, name, None)
    }

    pub fn check_gate_with_options(
        &self,
        user: &User,
        name: &str,
        options: Option<EvaluationOptions>,
    ) -> bool {
        const OP: &str = "check_gate";
        let Some((engine, user)) = self.live_with_user(OP, user) else {
            return false;
        };
        let Some(name) = marshaled(OP, to_cstring(name, "gate name")) else {
            return false;
        };
        let Some(options) = marshaled(OP, marshal::encode_opt_json(options.as_ref(), "evaluation options"))
        else {
            return false;
        };

        unsafe {
            (self.bridge.api().engine_check_gate)(engine, user, name.as_ptr(), opt_ptr(&options))
        }
    }

    /// Full gate result; a default result named `name` on failure.
    pub fn get_feature_gate(&self, user: &User, name: &str) -> FeatureGate {
        self.get_feature_gate_with_options(user, name, None)
    }

    pub fn get_feature_gate_with_options(
        &self,
        user: &User,
        name: &str,
        options: Option<EvaluationOptions>,
    ) -> FeatureGate {
        let call = self.bridge.api().engine_get_feature_gate;
        self.evaluate("get_feature_gate", call, user, name, options)
            .unwrap_or_else(|| FeatureGate::fallback(name))
    }

    pub fn manually_log_gate_exposure(&self, user: &User, name: &str) {
        let call = self.bridge.api().engine_manually_log_gate_exposure;
        self.log_exposure("manually_log_gate_exposure", call, user, name);
    }

    // ----------------------------------------------------------------- configs

    pub fn get_dynamic_config(&self, user: &User, name: &str) -> DynamicConfig {
        self.get_dynamic_config_with_options(user, name, None)
    }

    pub fn get_dynamic_config_with_options(
        &self,
        user: &User,
        name: &str,
        options: Option<EvaluationOptions>,
    ) -> DynamicConfig {
        let call = self.bridge.api().engine_get_dynamic_config;
        self.evaluate("get_dynamic_config", call, user, name, options)
            .unwrap_or_else(|| DynamicConfig {
                name: name.to_string(),
                ..DynamicConfig::default()
            })
    }

    pub fn manually_log_dynamic_config_exposure(&self, user: &User, name: &str) {
        let call = self.bridge.api().engine_manually_log_dynamic_config_exposure;
        self.log_exposure("manually_log_dynamic_config_exposure", call, user, name);
    }

    // ----------------------------------------------------------------- experiments

    pub fn get_experiment(&self, user: &User, name: &str) -> Experiment {
        self.get_experiment_with_options(user, name, None)
    }

    pub fn get_experiment_with_options(
        &self,
        user: &User,
        name: &str,
        options: Option<EvaluationOptions>,
    ) -> Experiment {
        let call = self.bridge.api().engine_get_experiment;
        self.evaluate("get_experiment", call, user, name, options)
            .unwrap_or_else(|| Experiment {
                name: name.to_string(),
                ..Experiment::default()
            })
    }

    pub fn manually_log_experiment_exposure(&self, user: &User, name: &str) {
        let call = self.bridge.api().engine_manually_log_experiment_exposure;
        self.log_exposure("manually_log_experiment_exposure", call, user, name);
    }

    // ----------------------------------------------------------------- layers

    pub fn get_layer(&self, user: &User, name: &str) -> Layer {
        self.get_layer_with_options(user, name, None)
    }

    pub fn get_layer_with_options(
        &self,
        user: &User,
        name: &str,
        options: Option<EvaluationOptions>,
    ) -> Layer {
        const OP: &str = "get_layer";
        let call = self.bridge.api().engine_get_layer;
        let Some(bytes) = self.evaluate_bytes(OP, call, user, name, options) else {
            return Layer::fallback(name);
        };

        let mut layer: Layer = match decode_json(&bytes, OP) {
            Ok(layer) => layer,
            Err(err) => {
                tracing::warn!(op = OP, error = %err, "result decoding failed");
                return Layer::fallback(name);
            }
        };
        layer.raw = String::from_utf8(bytes).ok();
        layer.exposure_logging_disabled = options.map_or(false, |o| o.disable_exposure_logging);
        layer
    }

    /// Log an exposure for `param` of a layer returned by [`get_layer`](Self::get_layer).
    ///
    /// Skipped for fallback layers and for layers fetched with exposure
    /// logging disabled.
    pub fn log_layer_param_exposure(&self, layer: &Layer, param: &str) {
        const OP: &str = "log_layer_param_exposure";
        if layer.exposure_logging_disabled {
            return;
        }
        let Some(raw_layer) = layer.raw.as_deref() else {
            tracing::debug!(op = OP, layer = %layer.name, "layer has no engine result");
            return;
        };
        let Some(engine) = self.live(OP) else {
            return;
        };
        let Some(raw_layer) = marshaled(OP, to_cstring(raw_layer, "layer")) else {
            return;
        };
        let Some(param) = marshaled(OP, to_cstring(param, "parameter name")) else {
            return;
        };

        unsafe {
            (self.bridge.api().engine_log_layer_param_exposure)(engine, raw_layer.as_ptr(), param.as_ptr())
        };
    }

    pub fn manually_log_layer_parameter_exposure(&self, user: &User, layer: &str, param: &str) {
        const OP: &str = "manually_log_layer_parameter_exposure";
        let Some((engine, user)) = self.live_with_user(OP, user) else {
            return;
        };
        let Some(layer) = marshaled(OP, to_cstring(layer, "layer name")) else {
            return;
        };
        let Some(param) = marshaled(OP, to_cstring(param, "parameter name")) else {
            return;
        };

        unsafe {
            (self.bridge.api().engine_manually_log_layer_parameter_exposure)(
                engine,
                user,
                layer.as_ptr(),
                param.as_ptr(),
            )
        };
    }

    // ----------------------------------------------------------------- parameter stores

    pub fn get_parameter_store(&self, name: &str, options: Option<EvaluationOptions>) -> ParameterStore {
        const OP: &str = "get_parameter_store";
        let fallback = || ParameterStore {
            name: name.to_string(),
            ..ParameterStore::default()
        };
        let Some(engine) = self.live(OP) else {
            return fallback();
        };
        let Some(name_c) = marshaled(OP, to_cstring(name, "parameter store name")) else {
            return fallback();
        };
        let Some(options) = marshaled(OP, marshal::encode_opt_json(options.as_ref(), "evaluation options"))
        else {
            return fallback();
        };

        let api = self.bridge.api();
        let bytes = unsafe {
            self.bridge.use_native_bytes(|len| {
                (api.engine_get_parameter_store)(engine, name_c.as_ptr(), opt_ptr(&options), len)
            })
        };
        Self::decode(OP, bytes).unwrap_or_else(fallback)
    }

    /// Marshal the arguments shared by every parameter getter.
    fn parameter_args(
        &self,
        op: &'static str,
        user: &User,
        store: &str,
        param: &str,
        options: Option<EvaluationOptions>,
    ) -> Option<ParameterArgs> {
        let (engine, user) = self.live_with_user(op, user)?;
        Some(ParameterArgs {
            engine,
            user,
            store: marshaled(op, to_cstring(store, "parameter store name"))?,
            param: marshaled(op, to_cstring(param, "parameter name"))?,
            options: marshaled(op, marshal::encode_opt_json(options.as_ref(), "evaluation options"))?,
        })
    }

    /// String parameter, or `default` when unavailable.
    pub fn get_string_parameter(
        &self,
        user: &User,
        store: &str,
        param: &str,
        default: &str,
        options: Option<EvaluationOptions>,
    ) -> String {
        const OP: &str = "get_string_parameter";
        let Some(args) = self.parameter_args(OP, user, store, param, options) else {
            return default.to_string();
        };
        let Some(default_c) = marshaled(OP, to_cstring(default, "default value")) else {
            return default.to_string();
        };

        let api = self.bridge.api();
        let result = unsafe {
            self.bridge.use_native_string(|len| {
                (api.engine_get_string_parameter)(
                    args.engine,
                    args.user,
                    args.store.as_ptr(),
                    args.param.as_ptr(),
                    default_c.as_ptr(),
                    opt_ptr(&args.options),
                    len,
                )
            })
        };
        match result {
            Ok(value) => value,
            Err(MarshalError::NullResult) => default.to_string(),
            Err(err) => {
                tracing::warn!(op = OP, error = %err, "result decoding failed");
                default.to_string()
            }
        }
    }

    pub fn get_bool_parameter(
        &self,
        user: &User,
        store: &str,
        param: &str,
        default: bool,
        options: Option<EvaluationOptions>,
    ) -> bool {
        let Some(args) = self.parameter_args("get_bool_parameter", user, store, param, options) else {
            return default;
        };
        unsafe {
            (self.bridge.api().engine_get_bool_parameter)(
                args.engine,
                args.user,
                args.store.as_ptr(),
                args.param.as_ptr(),
                default,
                opt_ptr(&args.options),
            )
        }
    }

    pub fn get_f64_parameter(
        &self,
        user: &User,
        store: &str,
        param: &str,
        default: f64,
        options: Option<EvaluationOptions>,
    ) -> f64 {
        let Some(args) = self.parameter_args("get_f64_parameter", user, store, param, options) else {
            return default;
        };
        unsafe {
            (self.bridge.api().engine_get_float64_parameter)(
                args.engine,
                args.user,
                args.store.as_ptr(),
                args.param.as_ptr(),
                default,
                opt_ptr(&args.options),
            )
        }
    }

    pub fn get_i64_parameter(
        &self,
        user: &User,
        store: &str,
        param: &str,
        default: i64,
        options: Option<EvaluationOptions>,
    ) -> i64 {
        let Some(args) = self.parameter_args("get_i64_parameter", user, store, param, options) else {
            return default;
        };
        unsafe {
            (self.bridge.api().engine_get_int_parameter)(
                args.engine,
                args.user,
                args.store.as_ptr(),
                args.param.as_ptr(),
                default,
                opt_ptr(&args.options),
            )
        }
    }

    pub fn get_object_parameter(
        &self,
        user: &User,
        store: &str,
        param: &str,
        default: JsonObject,
        options: Option<EvaluationOptions>,
    ) -> JsonObject {
        let call = self.bridge.api().engine_get_object_parameter;
        self.json_parameter("get_object_parameter", call, user, store, param, default, options)
    }

    pub fn get_array_parameter(
        &self,
        user: &User,
        store: &str,
        param: &str,
        default: Vec<Value>,
        options: Option<EvaluationOptions>,
    ) -> Vec<Value> {
        let call = self.bridge.api().engine_get_array_parameter;
        self.json_parameter("get_array_parameter", call, user, store, param, default, options)
    }

    #[allow(clippy::too_many_arguments)]
    fn json_parameter<T>(
        &self,
        op: &'static str,
        call: JsonParameterFn,
        user: &User,
        store: &str,
        param: &str,
        default: T,
        options: Option<EvaluationOptions>,
    ) -> T
    where
        T: serde::Serialize + DeserializeOwned,
    {
        let Some(args) = self.parameter_args(op, user, store, param, options) else {
            return default;
        };
        let Some(default_c) = marshaled(op, encode_json(&default, "default value")) else {
            return default;
        };

        let bytes = unsafe {
            self.bridge.use_native_bytes(|len| {
                call(
                    args.engine,
                    args.user,
                    args.store.as_ptr(),
                    args.param.as_ptr(),
                    default_c.as_ptr(),
                    opt_ptr(&args.options),
                    len,
                )
            })
        };
        Self::decode(op, bytes).unwrap_or(default)
    }

    // ----------------------------------------------------------------- events

    pub fn log_event(&self, user: &User, event: &Event) {
        const OP: &str = "log_event";
        let Some((engine, user)) = self.live_with_user(OP, user) else {
            return;
        };
        let Some(event) = marshaled(OP, encode_json(event, "event")) else {
            return;
        };
        unsafe { (self.bridge.api().engine_log_event)(engine, user, event.as_ptr()) };
    }

    pub fn identify(&self, user: &User) {
        if let Some((engine, user)) = self.live_with_user("identify", user) {
            unsafe { (self.bridge.api().engine_identify)(engine, user) };
        }
    }

    /// Current config values as the engine's raw JSON, `None` when unavailable.
    pub fn get_current_values(&self) -> Option<String> {
        const OP: &str = "get_current_values";
        let engine = self.live(OP)?;
        let api = self.bridge.api();
        unsafe { self.native_string(OP, |len| (api.engine_get_current_values)(engine, len)) }
    }

    /// Client bootstrap payload for `user`, `None` when unavailable.
    pub fn get_client_init_response(
        &self,
        user: &User,
        options: Option<&ClientInitResponseOptions>,
    ) -> Option<String> {
        const OP: &str = "get_client_init_response";
        let (engine, user) = self.live_with_user(OP, user)?;
        let options = marshaled(OP, marshal::encode_opt_json(options, "client init response options"))?;
        let api = self.bridge.api();
        unsafe {
            self.native_string(OP, |len| {
                (api.engine_get_client_init_response)(engine, user, opt_ptr(&options), len)
            })
        }
    }

    /// # Safety
    ///
    /// Same contract as [`Bridge::use_native_string`].
    unsafe fn native_string<F>(&self, op: &'static str, producer: F) -> Option<String>
    where
        F: FnOnce(*mut u64) -> *mut c_char,
    {
        match unsafe { self.bridge.use_native_string(producer) } {
            Ok(value) => Some(value),
            Err(MarshalError::NullResult) => None,
            Err(err) => {
                tracing::warn!(op, error = %err, "result decoding failed");
                None
            }
        }
    }

    // ----------------------------------------------------------------- overrides

    pub fn override_gate(&self, name: &str, value: bool, id: Option<&str>) {
        const OP: &str = "override_gate";
        let Some(engine) = self.live(OP) else {
            return;
        };
        let Some((name, id)) = override_target(OP, name, id) else {
            return;
        };
        unsafe { (self.bridge.api().engine_override_gate)(engine, name.as_ptr(), value, opt_ptr(&id)) };
    }

    pub fn override_dynamic_config(&self, name: &str, value: &JsonObject, id: Option<&str>) {
        let call = self.bridge.api().engine_override_dynamic_config;
        self.override_json("override_dynamic_config", call, name, value, id);
    }

    pub fn override_experiment(&self, name: &str, value: &JsonObject, id: Option<&str>) {
        let call = self.bridge.api().engine_override_experiment;
        self.override_json("override_experiment", call, name, value, id);
    }

    pub fn override_layer(&self, name: &str, value: &JsonObject, id: Option<&str>) {
        let call = self.bridge.api().engine_override_layer;
        self.override_json("override_layer", call, name, value, id);
    }

    /// Force `name` to the values of one of its groups.
    pub fn override_experiment_by_group_name(&self, name: &str, group: &str, id: Option<&str>) {
        const OP: &str = "override_experiment_by_group_name";
        let Some(engine) = self.live(OP) else {
            return;
        };
        let Some((name, id)) = override_target(OP, name, id) else {
            return;
        };
        let Some(group) = marshaled(OP, to_cstring(group, "group name")) else {
            return;
        };
        unsafe {
            (self.bridge.api().engine_override_experiment_by_group_name)(
                engine,
                name.as_ptr(),
                group.as_ptr(),
                opt_ptr(&id),
            )
        };
    }

    fn override_json(
        &self,
        op: &'static str,
        call: OverrideJsonFn,
        name: &str,
        value: &JsonObject,
        id: Option<&str>,
    ) {
        let Some(engine) = self.live(op) else {
            return;
        };
        let Some((name, id)) = override_target(op, name, id) else {
            return;
        };
        let Some(value) = marshaled(op, encode_json(value, "override value")) else {
            return;
        };
        unsafe { call(engine, name.as_ptr(), value.as_ptr(), opt_ptr(&id)) };
    }

    pub fn remove_gate_override(&self, name: &str, id: Option<&str>) {
        let call = self.bridge.api().engine_remove_gate_override;
        self.remove_override("remove_gate_override", call, name, id);
    }

    pub fn remove_dynamic_config_override(&self, name: &str, id: Option<&str>) {
        let call = self.bridge.api().engine_remove_dynamic_config_override;
        self.remove_override("remove_dynamic_config_override", call, name, id);
    }

    pub fn remove_experiment_override(&self, name: &str, id: Option<&str>) {
        let call = self.bridge.api().engine_remove_experiment_override;
        self.remove_override("remove_experiment_override", call, name, id);
    }

    pub fn remove_layer_override(&self, name: &str, id: Option<&str>) {
        let call = self.bridge.api().engine_remove_layer_override;
        self.remove_override("remove_layer_override", call, name, id);
    }

    fn remove_override(&self, op: &'static str, call: RemoveOverrideFn, name: &str, id: Option<&str>) {
        let Some(engine) = self.live(op) else {
            return;
        };
        let Some((name, id)) = override_target(op, name, id) else {
            return;
        };
        unsafe { call(engine, name.as_ptr(), opt_ptr(&id)) };
    }

    pub fn remove_all_overrides(&self) {
        if let Some(engine) = self.live("remove_all_overrides") {
            unsafe { (self.bridge.api().engine_remove_all_overrides)(engine) };
        }
    }
}

type JsonParameterFn = unsafe extern "C" fn(
    u64,
    u64,
    *const c_char,
    *const c_char,
    *const c_char,
    *const c_char,
    *mut u64,
) -> *mut c_char;

struct ParameterArgs {
    engine: u64,
    user: u64,
    store: CString,
    param: CString,
    options: Option<CString>,
}

/// Name plus optional override id (user id or custom id the override applies to).
fn override_target(op: &'static str, name: &str, id: Option<&str>) -> Option<(CString, Option<CString>)> {
    let name = marshaled(op, to_cstring(name, "override name"))?;
    let id = marshaled(op, marshal::to_opt_cstring(id, "override id"))?;
    Some((name, id))
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("handle", &self.handle)
            .field("shut_down", &self.is_shut_down())
            .field("options", &self.options.as_ref().map(|o| o.raw()))
            .finish()
    }
}
