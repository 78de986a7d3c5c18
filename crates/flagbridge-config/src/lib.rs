//! Flagbridge Configuration System
//!
//! Provides configuration for the native bridge:
//! - Project configuration (flagbridge.toml)
//! - Global user configuration (~/.flagbridge/config.toml)
//! - Environment variable overrides (FLAGBRIDGE_*)
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded and merged in the following order (later overrides earlier):
//! 1. Global config (~/.flagbridge/config.toml)
//! 2. Project config (./flagbridge.toml, searched upwards)
//! 3. Environment variables (FLAGBRIDGE_*)
//!
//! # Example
//!
//! ```no_run
//! use flagbridge_config::ConfigLoader;
//! use std::path::Path;
//!
//! let mut loader = ConfigLoader::new();
//! let config = loader.load_from_directory(Path::new(".")).unwrap();
//! println!("{:?}", config.library_path());
//! ```

pub mod bridge;
pub mod loader;

use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax in {file}: {error}")]
    TomlParseError {
        file: PathBuf,
        error: toml::de::Error,
    },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Home directory not found")]
    HomeNotFound,
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

// Re-export main types
pub use bridge::{BridgeConfig, LibraryConfig, LogFormat, LoggingConfig, MetadataConfig};
pub use loader::{
    apply_env_overrides, Config, ConfigLoader, ENV_LIB_PATH, ENV_LOG, ENV_LOG_FORMAT,
    ENV_SDK_TYPE, ENV_TEMP_DIR,
};
