//! Error types for bridge operations.

use crate::ffi::handle::HandleKind;
use crate::ffi::marshal::MarshalError;
use flagbridge_config::ConfigError;
use thiserror::Error;

/// Errors surfaced by the bridge.
///
/// Read-style queries on the facades never return these; they fall back to
/// defaults. Construction and lifecycle operations do.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The native library could not be opened.
    #[error("Failed to load native library '{path}': {source}")]
    LibraryLoad {
        path: String,
        #[source]
        source: libloading::Error,
    },

    /// No override path was configured and nothing was embedded for this platform.
    #[error("No embedded native library for platform '{platform}'; set FLAGBRIDGE_LIB_PATH")]
    NoEmbeddedLibrary { platform: String },

    /// Writing the embedded library to disk failed.
    #[error("Failed to materialize embedded library: {0}")]
    TempFile(#[source] std::io::Error),

    /// A required symbol is missing from the library.
    #[error("Symbol '{symbol}' not found in native library")]
    SymbolNotFound { symbol: String },

    /// Bridge initialization failed earlier in this process.
    #[error("Native bridge unavailable: {0}")]
    Unavailable(String),

    /// A native create call returned handle 0.
    #[error("Native create call for {kind} returned no handle")]
    CreateFailed { kind: HandleKind },

    /// The wrapper's handle has already been released.
    #[error("{kind} handle has already been released")]
    Released { kind: HandleKind },

    /// Encoding or decoding a payload failed.
    #[error(transparent)]
    Marshal(#[from] MarshalError),

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The native side dropped a completion without signalling it.
    #[error("Native completion callback was never invoked")]
    CompletionDropped,
}

impl BridgeError {
    /// Create a load error.
    pub fn library_load(path: impl Into<String>, source: libloading::Error) -> Self {
        Self::LibraryLoad {
            path: path.into(),
            source,
        }
    }

    /// Create a symbol not found error.
    pub fn symbol_not_found(symbol: impl Into<String>) -> Self {
        Self::SymbolNotFound {
            symbol: symbol.into(),
        }
    }

    /// Errors that leave the bridge without a usable call table.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::LibraryLoad { .. }
                | Self::NoEmbeddedLibrary { .. }
                | Self::TempFile(_)
                | Self::SymbolNotFound { .. }
                | Self::Unavailable(_)
        )
    }

    /// Errors local to one call; the bridge remains usable.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Marshal(_) | Self::CompletionDropped)
    }
}

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;
