//! flagbridge runtime - host bridge to the native evaluation engine
//!
//! This library provides:
//! - Loading and binding the native engine library (once per process)
//! - Safe owners for native handles with exactly-once release
//! - Marshaling of JSON payloads and native-owned result buffers
//! - Callback registries that let host adapters serve the engine
//! - Engine, user and options facades

/// flagbridge runtime version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Public API modules
pub mod adapters;
pub mod engine;
pub mod error;
pub mod ffi;
pub mod logging;
pub mod options;
pub mod types;
pub mod user;

// Re-export commonly used types
pub use adapters::{
    AdapterRegistration, DataStoreAdapter, MetricsAdapter, StickyValueStore, StickyValues,
    UserPersistedValues,
};
pub use engine::Engine;
pub use error::{BridgeError, BridgeResult};
pub use ffi::{Bridge, Completion, HandleKind, MarshalError, NativeApi};
pub use logging::{init_from_config, init_logging};
pub use options::{Options, OptionsBuilder};
pub use types::{
    ClientInitResponseOptions, DynamicConfig, EvaluationOptions, Event, Experiment, FeatureGate,
    InitializeDetails, Layer, ParameterStore, ValueGetters,
};
pub use user::{User, UserBuilder};
