//! Engine options facade
//!
//! Options are created natively from JSON. Attached adapters are registered
//! when the options are built and stay registered for as long as the
//! [`Options`] value lives; an [`Engine`](crate::Engine) holds its options.

use crate::adapters::{self, AdapterRegistration, DataStoreAdapter, MetricsAdapter, StickyValueStore};
use crate::error::BridgeResult;
use crate::ffi::handle::{HandleKind, NativeHandle};
use crate::ffi::marshal::encode_json;
use crate::ffi::Bridge;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Option values as sent to the engine; unset fields are omitted.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct OptionsData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specs_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_event_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_logging_flush_interval_ms: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_logging_max_queue_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specs_sync_interval_ms: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_log_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disable_country_lookup: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disable_user_agent_parsing: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait_for_country_lookup_init: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait_for_user_agent_init: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_id_lists: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_lists_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_lists_sync_interval_ms: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disable_all_logging: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disable_network: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub init_timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_custom_fields: Option<HashMap<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_store_ref: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observability_client_ref: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persistent_storage_ref: Option<u64>,
}

/// Builder for [`Options`]
#[derive(Default)]
pub struct OptionsBuilder {
    data: OptionsData,
    data_store: Option<Arc<dyn DataStoreAdapter>>,
    metrics: Option<Arc<dyn MetricsAdapter>>,
    sticky_store: Option<Arc<dyn StickyValueStore>>,
}

impl OptionsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn specs_url(mut self, url: impl Into<String>) -> Self {
        self.data.specs_url = Some(url.into());
        self
    }

    pub fn log_event_url(mut self, url: impl Into<String>) -> Self {
        self.data.log_event_url = Some(url.into());
        self
    }

    pub fn environment(mut self, environment: impl Into<String>) -> Self {
        self.data.environment = Some(environment.into());
        self
    }

    pub fn event_logging_flush_interval_ms(mut self, interval: u32) -> Self {
        self.data.event_logging_flush_interval_ms = Some(interval);
        self
    }

    pub fn event_logging_max_queue_size(mut self, size: u32) -> Self {
        self.data.event_logging_max_queue_size = Some(size);
        self
    }

    pub fn specs_sync_interval_ms(mut self, interval: u32) -> Self {
        self.data.specs_sync_interval_ms = Some(interval);
        self
    }

    /// Engine log level: `"none"`, `"error"`, `"warn"`, `"info"` or `"debug"`
    pub fn output_log_level(mut self, level: impl Into<String>) -> Self {
        self.data.output_log_level = Some(level.into());
        self
    }

    pub fn disable_country_lookup(mut self, disable: bool) -> Self {
        self.data.disable_country_lookup = Some(disable);
        self
    }

    pub fn disable_user_agent_parsing(mut self, disable: bool) -> Self {
        self.data.disable_user_agent_parsing = Some(disable);
        self
    }

    pub fn wait_for_country_lookup_init(mut self, wait: bool) -> Self {
        self.data.wait_for_country_lookup_init = Some(wait);
        self
    }

    pub fn wait_for_user_agent_init(mut self, wait: bool) -> Self {
        self.data.wait_for_user_agent_init = Some(wait);
        self
    }

    pub fn enable_id_lists(mut self, enable: bool) -> Self {
        self.data.enable_id_lists = Some(enable);
        self
    }

    pub fn id_lists_url(mut self, url: impl Into<String>) -> Self {
        self.data.id_lists_url = Some(url.into());
        self
    }

    pub fn id_lists_sync_interval_ms(mut self, interval: u32) -> Self {
        self.data.id_lists_sync_interval_ms = Some(interval);
        self
    }

    pub fn disable_all_logging(mut self, disable: bool) -> Self {
        self.data.disable_all_logging = Some(disable);
        self
    }

    pub fn disable_network(mut self, disable: bool) -> Self {
        self.data.disable_network = Some(disable);
        self
    }

    pub fn init_timeout_ms(mut self, timeout: u64) -> Self {
        self.data.init_timeout_ms = Some(timeout);
        self
    }

    pub fn global_custom_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data
            .global_custom_fields
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn data_store(mut self, store: Arc<dyn DataStoreAdapter>) -> Self {
        self.data_store = Some(store);
        self
    }

    pub fn metrics(mut self, metrics: Arc<dyn MetricsAdapter>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn sticky_value_store(mut self, store: Arc<dyn StickyValueStore>) -> Self {
        self.sticky_store = Some(store);
        self
    }

    pub fn data(&self) -> &OptionsData {
        &self.data
    }

    /// Create the native options through the process-wide bridge.
    pub fn build(self) -> BridgeResult<Options> {
        self.build_in(Bridge::global()?)
    }

    /// Register attached adapters, then create the native options.
    ///
    /// Adapters registered before a failing step are released again when
    /// the error is returned.
    pub fn build_in(self, bridge: &Bridge) -> BridgeResult<Options> {
        let OptionsBuilder {
            mut data,
            data_store,
            metrics,
            sticky_store,
        } = self;
        let mut adapters = Vec::new();

        if let Some(store) = data_store {
            let registration = adapters::data_store::register(bridge, store)?;
            data.data_store_ref = Some(registration.raw());
            adapters.push(registration);
        }
        if let Some(metrics) = metrics {
            let registration = adapters::observability::register(bridge, metrics)?;
            data.observability_client_ref = Some(registration.raw());
            adapters.push(registration);
        }
        if let Some(store) = sticky_store {
            let registration = adapters::persistent_storage::register(bridge, store)?;
            data.persistent_storage_ref = Some(registration.raw());
            adapters.push(registration);
        }

        let json = encode_json(&data, "options")?;
        let api = bridge.api();
        let raw = unsafe { (api.options_create_from_data)(json.as_ptr()) };
        let handle = NativeHandle::new(raw, HandleKind::Options, api.options_release)?;

        Ok(Options {
            handle,
            data,
            adapters,
        })
    }
}

impl fmt::Debug for OptionsBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptionsBuilder")
            .field("data", &self.data)
            .field("data_store", &self.data_store.is_some())
            .field("metrics", &self.metrics.is_some())
            .field("sticky_store", &self.sticky_store.is_some())
            .finish()
    }
}

/// Native engine options
#[derive(Debug)]
pub struct Options {
    // Released before the adapters it refers to.
    handle: NativeHandle,
    data: OptionsData,
    adapters: Vec<AdapterRegistration>,
}

impl Options {
    pub fn builder() -> OptionsBuilder {
        OptionsBuilder::new()
    }

    pub fn data(&self) -> &OptionsData {
        &self.data
    }

    /// Native handle, `0` once released
    pub fn raw(&self) -> u64 {
        self.handle.raw()
    }

    /// Native handle, or [`BridgeError::Released`](crate::BridgeError::Released)
    /// once released.
    pub fn require(&self) -> BridgeResult<u64> {
        self.handle.require()
    }

    pub fn adapters(&self) -> &[AdapterRegistration] {
        &self.adapters
    }

    /// Release the native options and every attached adapter.
    pub fn release(&self) -> bool {
        let released = self.handle.release();
        for adapter in &self.adapters {
            adapter.release();
        }
        released
    }
}
