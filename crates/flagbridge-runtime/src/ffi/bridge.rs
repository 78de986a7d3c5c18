//! Process-wide bridge state
//!
//! Loading and binding happen at most once per process. Concurrent first
//! callers are serialized by a `OnceLock`; all of them observe the same call
//! table, or the same cached failure.

use super::api::NativeApi;
use super::loader::{load_library, LibrarySource, RUSTC_VERSION};
use super::marshal::{self, MarshalError};
use crate::error::{BridgeError, BridgeResult};
use crate::logging::init_from_config;
use flagbridge_config::bridge::DEFAULT_SDK_TYPE;
use flagbridge_config::{BridgeConfig, ConfigLoader};
use libloading::Library;
use std::ffi::c_char;
use std::fmt;
use std::sync::OnceLock;

static GLOBAL: OnceLock<Result<Bridge, String>> = OnceLock::new();

/// A bound native call table and the library backing it
pub struct Bridge {
    api: NativeApi,
    /// Keeps the mapping alive for as long as `api` is reachable.
    _library: Option<Library>,
}

impl Bridge {
    /// The process-wide bridge, loading it on first use.
    ///
    /// Configuration comes from `flagbridge.toml` (searched upward from the
    /// current directory), the global config file and `FLAGBRIDGE_*`
    /// variables. A `[logging]` section installs the fmt subscriber before
    /// the library loads, unless the host already installed one. A failed
    /// first load is cached and reported as [`BridgeError::Unavailable`] on
    /// every later call.
    pub fn global() -> BridgeResult<&'static Bridge> {
        GLOBAL
            .get_or_init(|| {
                load_config()
                    .and_then(|config| {
                        init_from_config(&config);
                        Bridge::init(&config)
                    })
                    .map_err(|err| {
                        tracing::error!(error = %err, "native bridge initialization failed");
                        err.to_string()
                    })
            })
            .as_ref()
            .map_err(|msg| BridgeError::Unavailable(msg.clone()))
    }

    /// Make `bridge` the process-wide bridge.
    ///
    /// Fails if [`global`](Self::global) or `install` already ran.
    pub fn install(bridge: Bridge) -> BridgeResult<&'static Bridge> {
        if GLOBAL.set(Ok(bridge)).is_err() {
            return Err(BridgeError::Unavailable(
                "native bridge already initialized".to_string(),
            ));
        }
        Self::global()
    }

    /// Load and bind the library described by `config`.
    pub fn init(config: &BridgeConfig) -> BridgeResult<Bridge> {
        let source = LibrarySource::resolve(config.library_path())?;

        // SAFETY: the configured or embedded library is the engine build this
        // crate's call table describes.
        let library = unsafe { load_library(&source, config.temp_dir())? };
        let api = unsafe { NativeApi::bind(&library)? };

        let bridge = Bridge {
            api,
            _library: Some(library),
        };
        bridge.report_metadata(config.sdk_type());
        Ok(bridge)
    }

    /// Wrap an already-bound call table (statically linked engines, tests).
    pub fn from_api(api: NativeApi) -> Bridge {
        let bridge = Bridge {
            api,
            _library: None,
        };
        bridge.report_metadata(DEFAULT_SDK_TYPE);
        bridge
    }

    pub fn api(&self) -> &NativeApi {
        &self.api
    }

    /// Copy a native-returned buffer and free it.
    ///
    /// `None` when the producer returned a null pointer.
    ///
    /// # Safety
    ///
    /// A non-null pointer returned by `producer` must be a buffer allocated
    /// by this bridge's engine, valid for reads of the length it reports.
    ///
    /// ```compile_fail
    /// # fn copy(bridge: &flagbridge_runtime::Bridge) {
    /// let _ = bridge.use_native_bytes(|len| {
    ///     unsafe { *len = 4096 };
    ///     b"tiny\0".as_ptr() as *mut std::ffi::c_char
    /// });
    /// # }
    /// ```
    pub unsafe fn use_native_bytes<F>(&self, producer: F) -> Option<Vec<u8>>
    where
        F: FnOnce(*mut u64) -> *mut c_char,
    {
        unsafe { marshal::use_native_bytes(self.api.free_buffer, producer) }
    }

    /// Copy a native-returned UTF-8 string and free it.
    ///
    /// # Safety
    ///
    /// Same contract as [`use_native_bytes`](Self::use_native_bytes).
    pub unsafe fn use_native_string<F>(&self, producer: F) -> Result<String, MarshalError>
    where
        F: FnOnce(*mut u64) -> *mut c_char,
    {
        unsafe { marshal::use_native_string(self.api.free_buffer, producer) }
    }

    fn report_metadata(&self, sdk_type: &str) {
        let values = (|| -> Result<_, MarshalError> {
            Ok((
                marshal::to_cstring(sdk_type, "sdk type")?,
                marshal::to_cstring(std::env::consts::OS, "os")?,
                marshal::to_cstring(std::env::consts::ARCH, "arch")?,
                marshal::to_cstring(RUSTC_VERSION, "language version")?,
            ))
        })();

        match values {
            Ok((sdk_type, os, arch, version)) => {
                unsafe {
                    (self.api.metadata_update_values)(
                        sdk_type.as_ptr(),
                        os.as_ptr(),
                        arch.as_ptr(),
                        version.as_ptr(),
                    )
                };
                tracing::debug!(
                    os = std::env::consts::OS,
                    arch = std::env::consts::ARCH,
                    "bridge metadata reported"
                );
            }
            Err(err) => tracing::warn!(error = %err, "skipping bridge metadata report"),
        }
    }
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("api", &self.api)
            .field("dynamic", &self._library.is_some())
            .finish()
    }
}

fn load_config() -> BridgeResult<BridgeConfig> {
    let mut loader = ConfigLoader::new();
    let config = match std::env::current_dir() {
        Ok(dir) => loader.load_from_directory(&dir)?,
        Err(_) => loader.load_from_env()?,
    };
    Ok(config.bridge)
}
