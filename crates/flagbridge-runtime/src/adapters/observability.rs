//! Metrics sink adapter

use super::AdapterRegistration;
use crate::error::BridgeResult;
use crate::ffi::handle::HandleKind;
use crate::ffi::marshal::{borrow_bytes, borrow_str, decode_json};
use crate::ffi::registry::CallbackRegistry;
use crate::ffi::Bridge;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// Metric tags as sent by the engine
pub type Tags = HashMap<String, String>;

/// Host-side metrics sink (statsd, OpenTelemetry, ...)
pub trait MetricsAdapter: Send + Sync {
    fn init(&self) {}

    fn increment(&self, metric: &str, value: f64, tags: Option<&Tags>);

    fn gauge(&self, metric: &str, value: f64, tags: Option<&Tags>);

    fn distribution(&self, metric: &str, value: f64, tags: Option<&Tags>);

    fn error(&self, _tag: &str, _message: &str) {}

    /// Whether high-cardinality tags should be attached for `tag`.
    fn should_use_high_cardinality(&self, _tag: &str) -> bool {
        false
    }
}

#[derive(Debug, Deserialize)]
struct MetricArgs {
    metric: String,
    value: f64,
    #[serde(default)]
    tags: Option<Tags>,
}

#[derive(Debug, Deserialize)]
struct ErrorArgs {
    tag: String,
    error: String,
}

#[derive(Clone, Copy)]
enum MetricKind {
    Increment,
    Gauge,
    Distribution,
}

impl MetricKind {
    fn method(self) -> &'static str {
        match self {
            MetricKind::Increment => "increment",
            MetricKind::Gauge => "gauge",
            MetricKind::Distribution => "distribution",
        }
    }
}

fn registry() -> &'static CallbackRegistry<dyn MetricsAdapter> {
    static SINKS: OnceLock<CallbackRegistry<dyn MetricsAdapter>> = OnceLock::new();
    SINKS.get_or_init(|| CallbackRegistry::new("observability client"))
}

fn unregister(id: u64) {
    registry().unregister(id);
}

/// Register `adapter` with the native engine.
pub fn register(bridge: &Bridge, adapter: Arc<dyn MetricsAdapter>) -> BridgeResult<AdapterRegistration> {
    let api = bridge.api();
    let id = registry().register(adapter);

    let raw = unsafe {
        (api.observability_client_create)(
            id,
            metrics_init,
            metrics_increment,
            metrics_gauge,
            metrics_distribution,
            metrics_error,
            metrics_high_cardinality,
        )
    };
    AdapterRegistration::new(
        id,
        raw,
        HandleKind::ObservabilityClient,
        api.observability_client_release,
        unregister,
    )
}

/// # Safety
///
/// `payload` must be valid for reads of `payload_len` bytes for the call.
unsafe fn record(id: u64, kind: MetricKind, payload: *const u8, payload_len: u64) {
    registry().dispatch(id, kind.method(), (), |sink| {
        let args = unsafe { borrow_bytes(payload, payload_len) }
            .and_then(|bytes| decode_json::<MetricArgs>(bytes, "metric arguments"));
        let args = match args {
            Ok(args) => args,
            Err(err) => {
                tracing::warn!(registry_id = id, error = %err, "dropping metric");
                return;
            }
        };

        let tags = args.tags.as_ref();
        match kind {
            MetricKind::Increment => sink.increment(&args.metric, args.value, tags),
            MetricKind::Gauge => sink.gauge(&args.metric, args.value, tags),
            MetricKind::Distribution => sink.distribution(&args.metric, args.value, tags),
        }
    });
}

extern "C" fn metrics_init(id: u64) {
    registry().dispatch(id, "init", (), |sink| sink.init());
}

unsafe extern "C" fn metrics_increment(id: u64, payload: *const u8, payload_len: u64) {
    record(id, MetricKind::Increment, payload, payload_len);
}

unsafe extern "C" fn metrics_gauge(id: u64, payload: *const u8, payload_len: u64) {
    record(id, MetricKind::Gauge, payload, payload_len);
}

unsafe extern "C" fn metrics_distribution(id: u64, payload: *const u8, payload_len: u64) {
    record(id, MetricKind::Distribution, payload, payload_len);
}

unsafe extern "C" fn metrics_error(id: u64, payload: *const u8, payload_len: u64) {
    registry().dispatch(id, "error", (), |sink| {
        let args = unsafe { borrow_bytes(payload, payload_len) }
            .and_then(|bytes| decode_json::<ErrorArgs>(bytes, "error arguments"));
        match args {
            Ok(args) => sink.error(&args.tag, &args.error),
            Err(err) => tracing::warn!(registry_id = id, error = %err, "dropping error report"),
        }
    });
}

unsafe extern "C" fn metrics_high_cardinality(id: u64, tag: *const u8, tag_len: u64) -> bool {
    registry().dispatch(id, "should_use_high_cardinality", false, |sink| {
        match unsafe { borrow_str(tag, tag_len, "metric tag") } {
            Ok(tag) => sink.should_use_high_cardinality(tag),
            Err(_) => false,
        }
    })
}
