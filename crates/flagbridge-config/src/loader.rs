//! Configuration Loader
//!
//! Handles loading and merging configuration from multiple sources with proper precedence.

use crate::bridge::{BridgeConfig, LogFormat};
use crate::{ConfigError, ConfigResult};
use std::env;
use std::path::{Path, PathBuf};

/// Project configuration file name
pub const PROJECT_CONFIG_FILE: &str = "flagbridge.toml";

/// Explicit native library path
pub const ENV_LIB_PATH: &str = "FLAGBRIDGE_LIB_PATH";
/// Directory for the materialized embedded library
pub const ENV_TEMP_DIR: &str = "FLAGBRIDGE_TEMP_DIR";
/// SDK type reported to the engine
pub const ENV_SDK_TYPE: &str = "FLAGBRIDGE_SDK_TYPE";
/// Tracing filter directive
pub const ENV_LOG: &str = "FLAGBRIDGE_LOG";
/// Log output format
pub const ENV_LOG_FORMAT: &str = "FLAGBRIDGE_LOG_FORMAT";

/// Configuration loader
///
/// Loads configuration from multiple sources and merges them with proper precedence:
/// 1. Global config (~/.flagbridge/config.toml) - lowest priority
/// 2. Project config (./flagbridge.toml) - overrides global
/// 3. Environment variables (FLAGBRIDGE_*) - highest priority
pub struct ConfigLoader {
    /// Cached global config path
    global_config_path: Option<PathBuf>,
}

/// Merged configuration result
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Effective bridge configuration
    pub bridge: BridgeConfig,

    /// Directory where flagbridge.toml was found
    pub project_root: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self {
            global_config_path: None,
        }
    }

    /// Use a specific file as the global configuration instead of ~/.flagbridge/config.toml
    pub fn with_global_path(path: impl Into<PathBuf>) -> Self {
        Self {
            global_config_path: Some(path.into()),
        }
    }

    /// Load configuration starting from the given directory
    ///
    /// Walks up the directory tree to find flagbridge.toml, layers it over
    /// the global config, then applies environment overrides.
    pub fn load_from_directory(&mut self, start_dir: &Path) -> ConfigResult<Config> {
        let (project_root, project_config) = self.find_project_config(start_dir)?;

        let mut bridge = self.load_global_config().unwrap_or_default();
        if let Some(project_config) = project_config {
            bridge.merge(&project_config);
        }

        let bridge = apply_env_overrides(bridge)?;
        bridge.validate()?;

        Ok(Config {
            bridge,
            project_root,
        })
    }

    /// Load configuration from a specific project config file
    pub fn load_from_file(&mut self, config_path: &Path) -> ConfigResult<Config> {
        let project_config = BridgeConfig::load_from_file(config_path)?;

        let mut bridge = self.load_global_config().unwrap_or_default();
        bridge.merge(&project_config);
        let bridge = apply_env_overrides(bridge)?;
        bridge.validate()?;

        Ok(Config {
            bridge,
            project_root: config_path.parent().map(|p| p.to_path_buf()),
        })
    }

    /// Load only the global config and environment overrides
    pub fn load_from_env(&mut self) -> ConfigResult<Config> {
        let bridge = self.load_global_config().unwrap_or_default();
        let bridge = apply_env_overrides(bridge)?;
        bridge.validate()?;

        Ok(Config {
            bridge,
            project_root: None,
        })
    }

    /// Find project configuration by walking up directory tree
    fn find_project_config(
        &self,
        start_dir: &Path,
    ) -> ConfigResult<(Option<PathBuf>, Option<BridgeConfig>)> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(PROJECT_CONFIG_FILE);

            if config_path.exists() {
                let config = BridgeConfig::load_from_file(&config_path)?;
                return Ok((Some(current), Some(config)));
            }

            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => return Ok((None, None)),
            }
        }
    }

    /// Load global configuration (optional file)
    fn load_global_config(&mut self) -> ConfigResult<BridgeConfig> {
        let path = match &self.global_config_path {
            Some(path) => path.clone(),
            None => {
                let path = Self::global_config_dir()?.join("config.toml");
                self.global_config_path = Some(path.clone());
                path
            }
        };

        if !path.exists() {
            return Ok(BridgeConfig::default());
        }

        BridgeConfig::load_from_file(&path)
    }

    /// Get the global configuration directory (~/.flagbridge)
    pub fn global_config_dir() -> ConfigResult<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
        Ok(home.join(".flagbridge"))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply FLAGBRIDGE_* environment variables on top of a config.
///
/// Empty values are treated as unset.
pub fn apply_env_overrides(mut config: BridgeConfig) -> ConfigResult<BridgeConfig> {
    if let Some(path) = non_empty_var(ENV_LIB_PATH) {
        config.library.get_or_insert_with(Default::default).path = Some(PathBuf::from(path));
    }

    if let Some(dir) = non_empty_var(ENV_TEMP_DIR) {
        config.library.get_or_insert_with(Default::default).temp_dir = Some(PathBuf::from(dir));
    }

    if let Some(sdk_type) = non_empty_var(ENV_SDK_TYPE) {
        config.metadata.get_or_insert_with(Default::default).sdk_type = Some(sdk_type);
    }

    if let Some(filter) = non_empty_var(ENV_LOG) {
        config.logging.get_or_insert_with(Default::default).filter = Some(filter);
    }

    if let Some(format) = non_empty_var(ENV_LOG_FORMAT) {
        let parsed = LogFormat::parse(&format).ok_or_else(|| ConfigError::InvalidValue {
            field: ENV_LOG_FORMAT.to_string(),
            reason: format!("must be 'pretty', 'compact', or 'json', got '{}'", format),
        })?;
        config.logging.get_or_insert_with(Default::default).format = Some(parsed);
    }

    Ok(config)
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

impl Config {
    /// Explicit native library path
    pub fn library_path(&self) -> Option<&Path> {
        self.bridge.library_path()
    }

    /// Get the project root directory
    pub fn project_root(&self) -> Option<&Path> {
        self.project_root.as_deref()
    }

    /// Check if a flagbridge.toml was found
    pub fn is_project(&self) -> bool {
        self.project_root.is_some()
    }
}
