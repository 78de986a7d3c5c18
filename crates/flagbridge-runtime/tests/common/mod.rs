//! In-process fake of the native engine
//!
//! Every entry point of the call table is implemented here as a Rust
//! `extern "C"` function operating on a shared [`FakeState`]. The fake
//! records creates, releases and buffer frees per handle, so tests running in
//! parallel can assert lifecycle properties on their own handles.
//!
//! Helpers such as [`store_get`] drive host adapters through their shims
//! exactly the way the real engine would: plain function pointers, a
//! registry id, `(ptr, len)` arguments and a host free call for results.

#![allow(dead_code)]

use flagbridge_runtime::ffi::api::{
    CompletionFn, FetchFn, KeyPredicateFn, LifecycleFn, PayloadFn, StoreSetFn,
};
use flagbridge_runtime::ffi::marshal::HostFreeFn;
use flagbridge_runtime::{Bridge, NativeApi};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::ffi::{c_char, CStr};
use std::ptr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};
use std::thread::{self, ThreadId};

/// SDK key rejected by `engine_create`
pub const REJECTED_SDK_KEY: &str = "secret-rejected";

/// User id rejected by `user_create_from_data`
pub const REJECTED_USER: &str = "rejected-user";

/// Evaluation name the fake has no result for
pub const MISSING: &str = "missing";

#[derive(Clone, Copy)]
pub struct StoreFns {
    pub id: u64,
    pub initialize: LifecycleFn,
    pub shutdown: LifecycleFn,
    pub get: FetchFn,
    pub set: StoreSetFn,
    pub should_poll: KeyPredicateFn,
    pub free: HostFreeFn,
}

#[derive(Clone, Copy)]
pub struct MetricsFns {
    pub id: u64,
    pub init: LifecycleFn,
    pub increment: PayloadFn,
    pub gauge: PayloadFn,
    pub distribution: PayloadFn,
    pub error: PayloadFn,
    pub high_cardinality: KeyPredicateFn,
}

#[derive(Clone, Copy)]
pub struct StickyFns {
    pub id: u64,
    pub load: FetchFn,
    pub save: PayloadFn,
    pub delete: PayloadFn,
    pub free: HostFreeFn,
}

#[derive(Debug, Clone, Default)]
pub struct EngineRecord {
    pub sdk_key: String,
    pub options: u64,
    pub initialized: usize,
    pub shutdowns: usize,
    pub flushes: usize,
    pub events: Vec<Value>,
    pub exposures: Vec<String>,
    pub gate_overrides: HashMap<String, bool>,
    pub json_overrides: HashMap<String, Value>,
    pub override_ids: Vec<Option<String>>,
}

#[derive(Default)]
pub struct FakeState {
    pub live: HashMap<u64, &'static str>,
    pub releases: HashMap<u64, usize>,
    pub users: HashMap<u64, Value>,
    pub options: HashMap<u64, Value>,
    pub engines: HashMap<u64, EngineRecord>,
    pub stores: HashMap<u64, StoreFns>,
    pub metrics: HashMap<u64, MetricsFns>,
    pub sticky: HashMap<u64, StickyFns>,
    pub buffers: HashMap<usize, (usize, ThreadId)>,
    pub allocations: HashMap<ThreadId, usize>,
    pub bad_frees: usize,
    pub metadata: Vec<Vec<String>>,
}

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(100);

pub fn state() -> MutexGuard<'static, FakeState> {
    static STATE: OnceLock<Mutex<FakeState>> = OnceLock::new();
    STATE
        .get_or_init(|| Mutex::new(FakeState::default()))
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

/// Bridge bound to the fake call table, shared by a test binary
pub fn bridge() -> &'static Bridge {
    static BRIDGE: OnceLock<Bridge> = OnceLock::new();
    BRIDGE.get_or_init(|| Bridge::from_api(fake_api()))
}

// ===== Inspection helpers =====

pub fn release_count(handle: u64) -> usize {
    state().releases.get(&handle).copied().unwrap_or(0)
}

pub fn is_live(handle: u64) -> bool {
    state().live.contains_key(&handle)
}

pub fn engine_record(handle: u64) -> EngineRecord {
    state().engines.get(&handle).cloned().unwrap_or_default()
}

pub fn options_json(handle: u64) -> Option<Value> {
    state().options.get(&handle).cloned()
}

pub fn user_json(handle: u64) -> Option<Value> {
    state().users.get(&handle).cloned()
}

/// Result buffers allocated on the calling thread and not yet freed
pub fn outstanding_buffers() -> usize {
    let me = thread::current().id();
    state().buffers.values().filter(|(_, owner)| *owner == me).count()
}

/// Result buffers ever allocated on the calling thread
pub fn allocations() -> usize {
    let me = thread::current().id();
    state().allocations.get(&me).copied().unwrap_or(0)
}

pub fn bad_frees() -> usize {
    state().bad_frees
}

pub fn metadata_reports() -> Vec<Vec<String>> {
    state().metadata.clone()
}

// ===== Driving host adapters the way the engine does =====

fn store_fns(handle: u64) -> StoreFns {
    *state().stores.get(&handle).expect("unknown data store handle")
}

fn metrics_fns(handle: u64) -> MetricsFns {
    *state().metrics.get(&handle).expect("unknown observability handle")
}

fn sticky_fns(handle: u64) -> StickyFns {
    *state().sticky.get(&handle).expect("unknown persistent storage handle")
}

fn take_host_buffer(ptr: *mut u8, len: u64, free: HostFreeFn) -> Option<Vec<u8>> {
    if ptr.is_null() {
        return None;
    }
    unsafe {
        let bytes = std::slice::from_raw_parts(ptr, len as usize).to_vec();
        free(ptr, len);
        Some(bytes)
    }
}

/// Call the store's `get` shim even if the store was released.
pub fn store_get(handle: u64, key: &[u8]) -> Option<Vec<u8>> {
    let fns = store_fns(handle);
    let mut len = 0u64;
    let ptr = unsafe { (fns.get)(fns.id, key.as_ptr(), key.len() as u64, &mut len) };
    take_host_buffer(ptr, len, fns.free)
}

pub fn store_set(handle: u64, key: &[u8], value: &[u8], time: Option<u64>) {
    let fns = store_fns(handle);
    let time_ptr = time.as_ref().map_or(ptr::null(), |t| t as *const u64);
    unsafe {
        (fns.set)(
            fns.id,
            key.as_ptr(),
            key.len() as u64,
            value.as_ptr(),
            value.len() as u64,
            time_ptr,
        )
    };
}

pub fn store_should_poll(handle: u64, key: &[u8]) -> bool {
    let fns = store_fns(handle);
    unsafe { (fns.should_poll)(fns.id, key.as_ptr(), key.len() as u64) }
}

pub fn emit_metric(handle: u64, kind: &str, payload: &Value) {
    let fns = metrics_fns(handle);
    let shim = match kind {
        "increment" => fns.increment,
        "gauge" => fns.gauge,
        "distribution" => fns.distribution,
        other => panic!("unknown metric kind {other}"),
    };
    let bytes = payload.to_string().into_bytes();
    unsafe { shim(fns.id, bytes.as_ptr(), bytes.len() as u64) };
}

pub fn emit_error(handle: u64, tag: &str, message: &str) {
    let fns = metrics_fns(handle);
    let bytes = json!({"tag": tag, "error": message}).to_string().into_bytes();
    unsafe { (fns.error)(fns.id, bytes.as_ptr(), bytes.len() as u64) };
}

pub fn high_cardinality(handle: u64, tag: &str) -> bool {
    let fns = metrics_fns(handle);
    unsafe { (fns.high_cardinality)(fns.id, tag.as_ptr(), tag.len() as u64) }
}

pub fn sticky_load(handle: u64, key: &str) -> Option<Value> {
    let fns = sticky_fns(handle);
    let mut len = 0u64;
    let ptr = unsafe { (fns.load)(fns.id, key.as_ptr(), key.len() as u64, &mut len) };
    take_host_buffer(ptr, len, fns.free).map(|bytes| serde_json::from_slice(&bytes).unwrap())
}

pub fn sticky_save(handle: u64, payload: &Value) {
    let fns = sticky_fns(handle);
    let bytes = payload.to_string().into_bytes();
    unsafe { (fns.save)(fns.id, bytes.as_ptr(), bytes.len() as u64) };
}

pub fn sticky_delete(handle: u64, payload: &Value) {
    let fns = sticky_fns(handle);
    let bytes = payload.to_string().into_bytes();
    unsafe { (fns.delete)(fns.id, bytes.as_ptr(), bytes.len() as u64) };
}

// ===== Fake native internals =====

unsafe fn text(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        None
    } else {
        Some(CStr::from_ptr(ptr).to_string_lossy().into_owned())
    }
}

unsafe fn json_arg(ptr: *const c_char) -> Option<Value> {
    text(ptr).and_then(|s| serde_json::from_str(&s).ok())
}

fn create(kind: &'static str) -> u64 {
    let handle = NEXT_HANDLE.fetch_add(1, Ordering::Relaxed);
    state().live.insert(handle, kind);
    handle
}

fn release(handle: u64) {
    let mut state = state();
    state.live.remove(&handle);
    *state.releases.entry(handle).or_insert(0) += 1;
}

fn live(handle: u64) -> bool {
    handle != 0 && state().live.contains_key(&handle)
}

fn respond(bytes: &[u8], out_len: *mut u64) -> *mut c_char {
    let boxed: Box<[u8]> = bytes.to_vec().into_boxed_slice();
    let len = boxed.len();
    let ptr = Box::into_raw(boxed).cast::<u8>();
    {
        let owner = thread::current().id();
        let mut state = state();
        state.buffers.insert(ptr as usize, (len, owner));
        *state.allocations.entry(owner).or_insert(0) += 1;
    }
    if !out_len.is_null() {
        unsafe { *out_len = len as u64 };
    }
    ptr.cast::<c_char>()
}

fn respond_json(value: &Value, out_len: *mut u64) -> *mut c_char {
    respond(value.to_string().as_bytes(), out_len)
}

unsafe extern "C" fn free_buffer(ptr: *mut c_char) {
    let entry = state().buffers.remove(&(ptr as usize));
    match entry {
        Some((len, _)) => drop(Box::from_raw(ptr::slice_from_raw_parts_mut(
            ptr.cast::<u8>(),
            len,
        ))),
        None => state().bad_frees += 1,
    }
}

unsafe extern "C" fn metadata_update_values(
    sdk_type: *const c_char,
    os: *const c_char,
    arch: *const c_char,
    language_version: *const c_char,
) {
    let report = [sdk_type, os, arch, language_version]
        .into_iter()
        .map(|p| text(p).unwrap_or_default())
        .collect();
    state().metadata.push(report);
}

// ----- options / users

unsafe extern "C" fn options_create_from_data(json: *const c_char) -> u64 {
    let Some(value) = json_arg(json) else {
        return 0;
    };
    if value.get("environment") == Some(&json!("reject")) {
        return 0;
    }
    let handle = create("options");
    state().options.insert(handle, value);
    handle
}

unsafe extern "C" fn options_release(handle: u64) {
    release(handle);
}

unsafe extern "C" fn user_create_from_data(json: *const c_char) -> u64 {
    let Some(value) = json_arg(json) else {
        return 0;
    };
    if value.get("userID") == Some(&json!(REJECTED_USER)) {
        return 0;
    }
    let handle = create("user");
    state().users.insert(handle, value);
    handle
}

unsafe extern "C" fn user_release(handle: u64) {
    release(handle);
}

// ----- engine lifecycle

unsafe extern "C" fn engine_create(sdk_key: *const c_char, options: u64) -> u64 {
    let sdk_key = text(sdk_key).unwrap_or_default();
    if sdk_key == REJECTED_SDK_KEY {
        return 0;
    }
    let handle = create("engine");
    state().engines.insert(
        handle,
        EngineRecord {
            sdk_key,
            options,
            ..EngineRecord::default()
        },
    );
    handle
}

unsafe extern "C" fn engine_release(handle: u64) {
    release(handle);
}

fn attached_adapter(engine: u64, field: &str) -> Option<u64> {
    let state = state();
    let options = state.engines.get(&engine)?.options;
    state.options.get(&options)?.get(field)?.as_u64()
}

/// Initialization work: start attached adapters, report a metric.
fn run_initialize(engine: u64) {
    if let Some(record) = state().engines.get_mut(&engine) {
        record.initialized += 1;
    }

    if let Some(store) = attached_adapter(engine, "data_store_ref") {
        let fns = store_fns(store);
        (fns.initialize)(fns.id);
    }
    if let Some(client) = attached_adapter(engine, "observability_client_ref") {
        let fns = metrics_fns(client);
        (fns.init)(fns.id);
        emit_metric(
            client,
            "distribution",
            &json!({"metric": "initialization", "value": 1.5, "tags": {"success": "true"}}),
        );
    }
}

fn run_shutdown(engine: u64) {
    if let Some(record) = state().engines.get_mut(&engine) {
        record.shutdowns += 1;
    }
    if let Some(store) = attached_adapter(engine, "data_store_ref") {
        let fns = store_fns(store);
        (fns.shutdown)(fns.id);
    }
}

fn details_json() -> Value {
    json!({
        "duration": 1.5,
        "init_success": true,
        "is_config_spec_ready": true,
        "is_id_list_ready": null,
        "source": "Network",
        "failure_details": null
    })
}

fn complete_later(id: u64, callback: CompletionFn, payload: Option<Value>, work: impl FnOnce() + Send + 'static) {
    thread::spawn(move || {
        work();
        match payload {
            Some(payload) => {
                let bytes = payload.to_string().into_bytes();
                unsafe { callback(id, bytes.as_ptr(), bytes.len() as u64) };
            }
            None => unsafe { callback(id, ptr::null(), 0) },
        }
    });
}

unsafe extern "C" fn engine_initialize(handle: u64, id: u64, callback: CompletionFn) {
    complete_later(id, callback, Some(details_json()), move || run_initialize(handle));
}

unsafe extern "C" fn engine_initialize_blocking(handle: u64) {
    run_initialize(handle);
}

unsafe extern "C" fn engine_initialize_with_details_blocking(handle: u64, out_len: *mut u64) -> *mut c_char {
    if !live(handle) {
        return ptr::null_mut();
    }
    run_initialize(handle);
    respond_json(&details_json(), out_len)
}

unsafe extern "C" fn engine_shutdown(handle: u64, id: u64, callback: CompletionFn) {
    complete_later(id, callback, None, move || run_shutdown(handle));
}

unsafe extern "C" fn engine_shutdown_blocking(handle: u64) {
    run_shutdown(handle);
}

unsafe extern "C" fn engine_flush_events(handle: u64, id: u64, callback: CompletionFn) {
    complete_later(id, callback, None, move || {
        if let Some(record) = state().engines.get_mut(&handle) {
            record.flushes += 1;
        }
    });
}

unsafe extern "C" fn engine_flush_events_blocking(handle: u64) {
    if let Some(record) = state().engines.get_mut(&handle) {
        record.flushes += 1;
    }
}

// ----- engine misc

fn with_engine(handle: u64, f: impl FnOnce(&mut EngineRecord)) {
    if let Some(record) = state().engines.get_mut(&handle) {
        f(record);
    }
}

unsafe extern "C" fn engine_get_current_values(handle: u64, out_len: *mut u64) -> *mut c_char {
    if !live(handle) {
        return ptr::null_mut();
    }
    respond_json(&json!({"has_updates": true, "time": 1700000000000u64}), out_len)
}

unsafe extern "C" fn engine_log_event(handle: u64, user: u64, event: *const c_char) {
    if !live(handle) || !live(user) {
        return;
    }
    if let Some(event) = json_arg(event) {
        with_engine(handle, |r| r.events.push(event));
    }
}

unsafe extern "C" fn engine_identify(handle: u64, user: u64) {
    with_engine(handle, |r| r.exposures.push(format!("identify:{user}")));
}

unsafe extern "C" fn engine_get_client_init_response(
    handle: u64,
    user: u64,
    options: *const c_char,
    out_len: *mut u64,
) -> *mut c_char {
    if !live(handle) || !live(user) {
        return ptr::null_mut();
    }
    let user = user_json(user).unwrap_or(Value::Null);
    let options = json_arg(options).unwrap_or(Value::Null);
    respond_json(&json!({"user": user, "options": options}), out_len)
}

// ----- evaluations

fn exposure_disabled(options: Option<&Value>) -> bool {
    options
        .and_then(|o| o.get("disable_exposure_logging"))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

fn gate_value(engine: u64, name: &str) -> bool {
    let overridden = state()
        .engines
        .get(&engine)
        .and_then(|r| r.gate_overrides.get(name).copied());
    overridden.unwrap_or_else(|| name.starts_with("on_"))
}

fn json_override(engine: u64, name: &str) -> Option<Value> {
    state()
        .engines
        .get(&engine)
        .and_then(|r| r.json_overrides.get(name).cloned())
}

fn user_id(user: u64) -> Value {
    user_json(user)
        .and_then(|u| u.get("userID").cloned())
        .unwrap_or(Value::Null)
}

unsafe extern "C" fn engine_check_gate(
    handle: u64,
    user: u64,
    name: *const c_char,
    options: *const c_char,
) -> bool {
    let Some(name) = text(name) else {
        return false;
    };
    if !live(handle) || !live(user) {
        return false;
    }
    if !exposure_disabled(json_arg(options).as_ref()) {
        with_engine(handle, |r| r.exposures.push(format!("gate:{name}")));
    }
    gate_value(handle, &name)
}

unsafe extern "C" fn engine_get_feature_gate(
    handle: u64,
    user: u64,
    name: *const c_char,
    _options: *const c_char,
    out_len: *mut u64,
) -> *mut c_char {
    let Some(name) = text(name) else {
        return ptr::null_mut();
    };
    if name == MISSING || !live(handle) || !live(user) {
        return ptr::null_mut();
    }
    let value = gate_value(handle, &name);
    respond_json(
        &json!({"name": name, "value": value, "rule_id": "fake_rule", "id_type": "userID"}),
        out_len,
    )
}

unsafe fn config_like(
    handle: u64,
    user: u64,
    name: *const c_char,
    out_len: *mut u64,
    extra: impl FnOnce(&str, Value) -> Value,
) -> *mut c_char {
    let Some(name) = text(name) else {
        return ptr::null_mut();
    };
    if name == MISSING || !live(handle) || !live(user) {
        return ptr::null_mut();
    }
    let value = json_override(handle, &name)
        .unwrap_or_else(|| json!({"user_id": user_id(user), "name": name, "size": 3}));
    respond_json(&extra(&name, value), out_len)
}

unsafe extern "C" fn engine_get_dynamic_config(
    handle: u64,
    user: u64,
    name: *const c_char,
    _options: *const c_char,
    out_len: *mut u64,
) -> *mut c_char {
    config_like(handle, user, name, out_len, |name, value| {
        json!({"name": name, "value": value, "rule_id": "config_rule", "id_type": "userID"})
    })
}

unsafe extern "C" fn engine_get_experiment(
    handle: u64,
    user: u64,
    name: *const c_char,
    _options: *const c_char,
    out_len: *mut u64,
) -> *mut c_char {
    config_like(handle, user, name, out_len, |name, value| {
        json!({
            "name": name,
            "value": value,
            "rule_id": "experiment_rule",
            "id_type": "userID",
            "group_name": "Control"
        })
    })
}

unsafe extern "C" fn engine_get_layer(
    handle: u64,
    user: u64,
    name: *const c_char,
    _options: *const c_char,
    out_len: *mut u64,
) -> *mut c_char {
    config_like(handle, user, name, out_len, |name, value| {
        json!({
            "name": name,
            "rule_id": "layer_rule",
            "id_type": "userID",
            "allocated_experiment_name": "layer_experiment",
            "__value": value
        })
    })
}

unsafe fn manual_exposure(handle: u64, user: u64, name: *const c_char, kind: &str) {
    if !live(handle) || !live(user) {
        return;
    }
    let name = text(name).unwrap_or_default();
    with_engine(handle, |r| r.exposures.push(format!("{kind}:{name}")));
}

unsafe extern "C" fn engine_manually_log_gate_exposure(handle: u64, user: u64, name: *const c_char) {
    manual_exposure(handle, user, name, "manual_gate");
}

unsafe extern "C" fn engine_manually_log_dynamic_config_exposure(handle: u64, user: u64, name: *const c_char) {
    manual_exposure(handle, user, name, "manual_config");
}

unsafe extern "C" fn engine_manually_log_experiment_exposure(handle: u64, user: u64, name: *const c_char) {
    manual_exposure(handle, user, name, "manual_experiment");
}

unsafe extern "C" fn engine_log_layer_param_exposure(handle: u64, layer: *const c_char, param: *const c_char) {
    let Some(layer) = json_arg(layer) else {
        return;
    };
    let name = layer["name"].as_str().unwrap_or_default().to_string();
    let param = text(param).unwrap_or_default();
    with_engine(handle, |r| r.exposures.push(format!("layer:{name}:{param}")));
}

unsafe extern "C" fn engine_manually_log_layer_parameter_exposure(
    handle: u64,
    user: u64,
    layer: *const c_char,
    param: *const c_char,
) {
    if !live(handle) || !live(user) {
        return;
    }
    let layer = text(layer).unwrap_or_default();
    let param = text(param).unwrap_or_default();
    with_engine(handle, |r| r.exposures.push(format!("manual_layer:{layer}:{param}")));
}

// ----- parameter stores

unsafe extern "C" fn engine_get_parameter_store(
    handle: u64,
    name: *const c_char,
    _options: *const c_char,
    out_len: *mut u64,
) -> *mut c_char {
    let Some(name) = text(name) else {
        return ptr::null_mut();
    };
    if name == MISSING || !live(handle) {
        return ptr::null_mut();
    }
    respond_json(&json!({"name": name, "details": {"reason": "Network"}}), out_len)
}

unsafe extern "C" fn engine_get_string_parameter(
    handle: u64,
    user: u64,
    store: *const c_char,
    param: *const c_char,
    default: *const c_char,
    _options: *const c_char,
    out_len: *mut u64,
) -> *mut c_char {
    if !live(handle) || !live(user) {
        return ptr::null_mut();
    }
    let store = text(store).unwrap_or_default();
    let param = text(param).unwrap_or_default();
    if param == MISSING {
        return match text(default) {
            Some(default) => respond(default.as_bytes(), out_len),
            None => ptr::null_mut(),
        };
    }
    respond(format!("{store}.{param}").as_bytes(), out_len)
}

unsafe extern "C" fn engine_get_bool_parameter(
    _handle: u64,
    _user: u64,
    _store: *const c_char,
    param: *const c_char,
    default: bool,
    _options: *const c_char,
) -> bool {
    text(param).as_deref() == Some("enabled") || default
}

unsafe extern "C" fn engine_get_float64_parameter(
    _handle: u64,
    _user: u64,
    _store: *const c_char,
    param: *const c_char,
    default: f64,
    _options: *const c_char,
) -> f64 {
    if text(param).as_deref() == Some("ratio") {
        0.25
    } else {
        default
    }
}

unsafe extern "C" fn engine_get_int_parameter(
    _handle: u64,
    _user: u64,
    _store: *const c_char,
    param: *const c_char,
    default: i64,
    _options: *const c_char,
) -> i64 {
    if text(param).as_deref() == Some("limit") {
        42
    } else {
        default
    }
}

unsafe fn json_parameter(
    handle: u64,
    user: u64,
    param: *const c_char,
    default: *const c_char,
    out_len: *mut u64,
    known: (&str, Value),
) -> *mut c_char {
    if !live(handle) || !live(user) {
        return ptr::null_mut();
    }
    if text(param).as_deref() == Some(known.0) {
        return respond_json(&known.1, out_len);
    }
    match text(default) {
        Some(default) => respond(default.as_bytes(), out_len),
        None => ptr::null_mut(),
    }
}

unsafe extern "C" fn engine_get_object_parameter(
    handle: u64,
    user: u64,
    _store: *const c_char,
    param: *const c_char,
    default: *const c_char,
    _options: *const c_char,
    out_len: *mut u64,
) -> *mut c_char {
    json_parameter(handle, user, param, default, out_len, ("theme", json!({"mode": "dark"})))
}

unsafe extern "C" fn engine_get_array_parameter(
    handle: u64,
    user: u64,
    _store: *const c_char,
    param: *const c_char,
    default: *const c_char,
    _options: *const c_char,
    out_len: *mut u64,
) -> *mut c_char {
    json_parameter(handle, user, param, default, out_len, ("tiers", json!(["gold", "silver"])))
}

// ----- overrides

unsafe extern "C" fn engine_override_gate(handle: u64, name: *const c_char, value: bool, id: *const c_char) {
    let name = text(name).unwrap_or_default();
    let id = text(id);
    with_engine(handle, |r| {
        r.gate_overrides.insert(name, value);
        r.override_ids.push(id);
    });
}

unsafe fn override_json(handle: u64, name: *const c_char, value: Value, id: *const c_char) {
    let name = text(name).unwrap_or_default();
    let id = text(id);
    with_engine(handle, |r| {
        r.json_overrides.insert(name, value);
        r.override_ids.push(id);
    });
}

unsafe extern "C" fn engine_override_dynamic_config(
    handle: u64,
    name: *const c_char,
    value: *const c_char,
    id: *const c_char,
) {
    override_json(handle, name, json_arg(value).unwrap_or(Value::Null), id);
}

unsafe extern "C" fn engine_override_experiment(
    handle: u64,
    name: *const c_char,
    value: *const c_char,
    id: *const c_char,
) {
    override_json(handle, name, json_arg(value).unwrap_or(Value::Null), id);
}

unsafe extern "C" fn engine_override_experiment_by_group_name(
    handle: u64,
    name: *const c_char,
    group: *const c_char,
    id: *const c_char,
) {
    let group = text(group).unwrap_or_default();
    override_json(handle, name, json!({"group": group}), id);
}

unsafe extern "C" fn engine_override_layer(
    handle: u64,
    name: *const c_char,
    value: *const c_char,
    id: *const c_char,
) {
    override_json(handle, name, json_arg(value).unwrap_or(Value::Null), id);
}

unsafe extern "C" fn engine_remove_gate_override(handle: u64, name: *const c_char, _id: *const c_char) {
    let name = text(name).unwrap_or_default();
    with_engine(handle, |r| {
        r.gate_overrides.remove(&name);
    });
}

unsafe extern "C" fn remove_json_override(handle: u64, name: *const c_char, _id: *const c_char) {
    let name = text(name).unwrap_or_default();
    with_engine(handle, |r| {
        r.json_overrides.remove(&name);
    });
}

unsafe extern "C" fn engine_remove_all_overrides(handle: u64) {
    with_engine(handle, |r| {
        r.gate_overrides.clear();
        r.json_overrides.clear();
    });
}

// ----- adapters

unsafe extern "C" fn data_store_create(
    id: u64,
    initialize: LifecycleFn,
    shutdown: LifecycleFn,
    get: FetchFn,
    set: StoreSetFn,
    should_poll: KeyPredicateFn,
    free: HostFreeFn,
) -> u64 {
    let handle = create("data store");
    state().stores.insert(
        handle,
        StoreFns {
            id,
            initialize,
            shutdown,
            get,
            set,
            should_poll,
            free,
        },
    );
    handle
}

unsafe extern "C" fn observability_client_create(
    id: u64,
    init: LifecycleFn,
    increment: PayloadFn,
    gauge: PayloadFn,
    distribution: PayloadFn,
    error: PayloadFn,
    high_cardinality: KeyPredicateFn,
) -> u64 {
    let handle = create("observability client");
    state().metrics.insert(
        handle,
        MetricsFns {
            id,
            init,
            increment,
            gauge,
            distribution,
            error,
            high_cardinality,
        },
    );
    handle
}

unsafe extern "C" fn persistent_storage_create(
    id: u64,
    load: FetchFn,
    save: PayloadFn,
    delete: PayloadFn,
    free: HostFreeFn,
) -> u64 {
    let handle = create("persistent storage");
    state().sticky.insert(
        handle,
        StickyFns {
            id,
            load,
            save,
            delete,
            free,
        },
    );
    handle
}

unsafe extern "C" fn adapter_release(handle: u64) {
    release(handle);
}

/// The complete fake call table
pub fn fake_api() -> NativeApi {
    NativeApi {
        options_create_from_data,
        options_release,
        user_create_from_data,
        user_release,
        engine_create,
        engine_release,
        engine_initialize,
        engine_initialize_blocking,
        engine_initialize_with_details_blocking,
        engine_shutdown,
        engine_shutdown_blocking,
        engine_flush_events,
        engine_flush_events_blocking,
        engine_get_current_values,
        engine_log_event,
        engine_identify,
        engine_get_client_init_response,
        engine_check_gate,
        engine_get_feature_gate,
        engine_manually_log_gate_exposure,
        engine_get_dynamic_config,
        engine_manually_log_dynamic_config_exposure,
        engine_get_experiment,
        engine_manually_log_experiment_exposure,
        engine_get_layer,
        engine_log_layer_param_exposure,
        engine_manually_log_layer_parameter_exposure,
        engine_get_parameter_store,
        engine_get_string_parameter,
        engine_get_bool_parameter,
        engine_get_float64_parameter,
        engine_get_int_parameter,
        engine_get_object_parameter,
        engine_get_array_parameter,
        engine_override_gate,
        engine_override_dynamic_config,
        engine_override_experiment,
        engine_override_experiment_by_group_name,
        engine_override_layer,
        engine_remove_gate_override,
        engine_remove_dynamic_config_override: remove_json_override,
        engine_remove_experiment_override: remove_json_override,
        engine_remove_layer_override: remove_json_override,
        engine_remove_all_overrides,
        data_store_create,
        data_store_release: adapter_release,
        observability_client_create,
        observability_client_release: adapter_release,
        persistent_storage_create,
        persistent_storage_release: adapter_release,
        metadata_update_values,
        free_buffer,
    }
}
