//! Native interop layer
//!
//! Leaves first:
//! - `loader`: open the engine library (override path or embedded image)
//! - `api`: bind every entry point into a typed call table
//! - `bridge`: the process-wide, load-once bridge
//! - `handle`: exactly-once release of native handles
//! - `marshal`: JSON payloads in, `(ptr, len)` buffers out
//! - `registry`: id-indexed host objects for native callbacks
//! - `completion`: one-shot signals for non-blocking calls

pub mod api;
pub mod bridge;
pub mod completion;
pub mod handle;
pub mod loader;
pub mod marshal;
pub mod registry;

pub use api::NativeApi;
pub use bridge::Bridge;
pub use completion::Completion;
pub use handle::{HandleKind, NativeHandle};
pub use loader::LibrarySource;
pub use marshal::MarshalError;
pub use registry::CallbackRegistry;
