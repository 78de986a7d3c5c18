//! Native library loading
//!
//! The engine library comes from one of two places:
//! - an explicit path (`[library] path` or `FLAGBRIDGE_LIB_PATH`), opened as is
//! - the binary embedded at build time for this platform, written to a private
//!   temporary file, opened, then removed again
//!
//! Once a shared object is mapped the file on disk is no longer needed, so the
//! temporary copy is deleted immediately after opening. Failing to delete it
//! is only logged.

use crate::error::{BridgeError, BridgeResult};
use libloading::Library;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Platform key the embedded binary was selected for (`<os>-<arch>[-musl]`)
pub const EMBEDDED_PLATFORM: &str = env!("FLAGBRIDGE_EMBED_PLATFORM");

/// Compiler version recorded at build time, reported as bridge metadata
pub const RUSTC_VERSION: &str = env!("FLAGBRIDGE_RUSTC_VERSION");

/// Engine binary compiled into this crate, if one was provided at build time
#[cfg(flagbridge_embedded)]
pub static EMBEDDED_LIBRARY: Option<&[u8]> = Some(include_bytes!(concat!(
    env!("OUT_DIR"),
    "/embedded_engine.bin"
)));

/// Engine binary compiled into this crate, if one was provided at build time
#[cfg(not(flagbridge_embedded))]
pub static EMBEDDED_LIBRARY: Option<&[u8]> = None;

/// Where to load the native library from
#[derive(Debug, Clone)]
pub enum LibrarySource {
    /// Explicit path on disk
    Path(PathBuf),
    /// Library image held in memory
    Embedded(&'static [u8]),
}

impl LibrarySource {
    /// Pick the override path when present, otherwise the embedded binary.
    pub fn resolve(override_path: Option<&Path>) -> BridgeResult<Self> {
        if let Some(path) = override_path {
            return Ok(LibrarySource::Path(path.to_path_buf()));
        }

        match EMBEDDED_LIBRARY {
            Some(bytes) => Ok(LibrarySource::Embedded(bytes)),
            None => Err(BridgeError::NoEmbeddedLibrary {
                platform: EMBEDDED_PLATFORM.to_string(),
            }),
        }
    }
}

/// Open the native library described by `source`.
///
/// # Safety
///
/// Opening a library runs its initializers in this process. The library must
/// be a trusted build of the engine.
pub unsafe fn load_library(source: &LibrarySource, temp_dir: Option<&Path>) -> BridgeResult<Library> {
    open_with(source, temp_dir, |path| {
        Library::new(path).map_err(|e| BridgeError::library_load(path.display().to_string(), e))
    })
}

/// Resolve `source` to a file and hand it to `open`.
///
/// For embedded images the file only exists while `open` runs.
pub fn open_with<L, F>(source: &LibrarySource, temp_dir: Option<&Path>, open: F) -> BridgeResult<L>
where
    F: FnOnce(&Path) -> BridgeResult<L>,
{
    match source {
        LibrarySource::Path(path) => {
            let library = open(path)?;
            tracing::info!(path = %path.display(), "native library loaded");
            Ok(library)
        }
        LibrarySource::Embedded(bytes) => {
            let temp_path = materialize(bytes, temp_dir)?;
            let result = open(&temp_path);

            let temp_file = temp_path.to_path_buf();
            if let Err(err) = temp_path.close() {
                tracing::warn!(
                    path = %temp_file.display(),
                    error = %err,
                    "failed to remove temporary library file"
                );
            }

            let library = result?;
            tracing::info!(platform = EMBEDDED_PLATFORM, "embedded native library loaded");
            Ok(library)
        }
    }
}

fn materialize(bytes: &[u8], temp_dir: Option<&Path>) -> BridgeResult<tempfile::TempPath> {
    let mut builder = tempfile::Builder::new();
    builder
        .prefix("flagbridge-engine-")
        .suffix(std::env::consts::DLL_SUFFIX);

    let mut file = match temp_dir {
        Some(dir) => builder.tempfile_in(dir),
        None => builder.tempfile(),
    }
    .map_err(BridgeError::TempFile)?;

    file.write_all(bytes).map_err(BridgeError::TempFile)?;
    file.flush().map_err(BridgeError::TempFile)?;

    tracing::debug!(
        path = %file.path().display(),
        size = bytes.len(),
        "embedded library written"
    );

    // Close the handle; the path stays until the TempPath is closed or dropped.
    Ok(file.into_temp_path())
}
