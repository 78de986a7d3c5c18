//! Bridge Configuration (flagbridge.toml)
//!
//! The same schema is used for the project file and the global
//! `~/.flagbridge/config.toml`; every field is optional so that files can be
//! layered on top of each other.

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default SDK type reported to the native engine
pub const DEFAULT_SDK_TYPE: &str = "flagbridge-rust";

/// Default tracing filter
pub const DEFAULT_LOG_FILTER: &str = "flagbridge=info";

/// Bridge configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct BridgeConfig {
    /// Native library location
    #[serde(skip_serializing_if = "Option::is_none")]
    pub library: Option<LibraryConfig>,

    /// Metadata reported to the native engine after binding
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MetadataConfig>,

    /// Logging setup
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

/// `[library]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct LibraryConfig {
    /// Explicit path to the native library. Bypasses the embedded binary.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Directory used to materialize the embedded binary (default: system temp dir)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_dir: Option<PathBuf>,
}

/// `[metadata]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct MetadataConfig {
    /// SDK type string reported to the engine
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sdk_type: Option<String>,
}

/// `[logging]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive string
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,

    /// Output format
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<LogFormat>,
}

/// Log output format
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

impl LogFormat {
    /// Parse a format name, case-insensitively
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "pretty" => Some(Self::Pretty),
            "compact" => Some(Self::Compact),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

impl LoggingConfig {
    /// Effective filter directive
    pub fn filter_or_default(&self) -> &str {
        self.filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }

    /// Effective output format
    pub fn format_or_default(&self) -> LogFormat {
        self.format.unwrap_or_default()
    }
}

impl BridgeConfig {
    /// Load bridge configuration from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
            file: path.to_path_buf(),
            error: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(library) = &self.library {
            if let Some(path) = &library.path {
                if path.as_os_str().is_empty() {
                    return Err(ConfigError::InvalidValue {
                        field: "library.path".to_string(),
                        reason: "must not be empty".to_string(),
                    });
                }
            }
        }

        if let Some(metadata) = &self.metadata {
            if let Some(sdk_type) = &metadata.sdk_type {
                if sdk_type.trim().is_empty() {
                    return Err(ConfigError::InvalidValue {
                        field: "metadata.sdk_type".to_string(),
                        reason: "must not be empty".to_string(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Merge another config into this one.
    /// Fields set in `other` take precedence.
    pub fn merge(&mut self, other: &BridgeConfig) {
        if let Some(other_lib) = &other.library {
            let lib = self.library.get_or_insert_with(Default::default);
            if other_lib.path.is_some() {
                lib.path = other_lib.path.clone();
            }
            if other_lib.temp_dir.is_some() {
                lib.temp_dir = other_lib.temp_dir.clone();
            }
        }

        if let Some(other_meta) = &other.metadata {
            let meta = self.metadata.get_or_insert_with(Default::default);
            if other_meta.sdk_type.is_some() {
                meta.sdk_type = other_meta.sdk_type.clone();
            }
        }

        if let Some(other_log) = &other.logging {
            let log = self.logging.get_or_insert_with(Default::default);
            if other_log.filter.is_some() {
                log.filter = other_log.filter.clone();
            }
            if other_log.format.is_some() {
                log.format = other_log.format;
            }
        }
    }

    /// Explicit library path override, if any
    pub fn library_path(&self) -> Option<&Path> {
        self.library.as_ref().and_then(|l| l.path.as_deref())
    }

    /// Directory for the materialized embedded library, if configured
    pub fn temp_dir(&self) -> Option<&Path> {
        self.library.as_ref().and_then(|l| l.temp_dir.as_deref())
    }

    /// SDK type reported to the engine
    pub fn sdk_type(&self) -> &str {
        self.metadata
            .as_ref()
            .and_then(|m| m.sdk_type.as_deref())
            .unwrap_or(DEFAULT_SDK_TYPE)
    }

    /// Logging section (default when absent)
    pub fn logging(&self) -> LoggingConfig {
        self.logging.clone().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_minimal_config() {
        let toml = r#"
[library]
path = "/opt/engine/libengine.so"
"#;

        let config: BridgeConfig = toml::from_str(toml).unwrap();
        assert_eq!(
            config.library_path(),
            Some(Path::new("/opt/engine/libengine.so"))
        );
        assert_eq!(config.sdk_type(), DEFAULT_SDK_TYPE);
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[library]
path = "/opt/engine/libengine.so"
temp_dir = "/var/tmp"

[metadata]
sdk_type = "my-service"

[logging]
filter = "flagbridge=debug"
format = "json"
"#;

        let config: BridgeConfig = toml::from_str(toml).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.temp_dir(), Some(Path::new("/var/tmp")));
        assert_eq!(config.sdk_type(), "my-service");
        assert_eq!(config.logging().format_or_default(), LogFormat::Json);
        assert_eq!(config.logging().filter_or_default(), "flagbridge=debug");
    }

    #[test]
    fn test_unknown_field_rejected() {
        let toml = r#"
[library]
pth = "/typo"
"#;
        assert!(toml::from_str::<BridgeConfig>(toml).is_err());
    }

    #[test]
    fn test_empty_library_path_invalid() {
        let config = BridgeConfig {
            library: Some(LibraryConfig {
                path: Some(PathBuf::new()),
                temp_dir: None,
            }),
            ..Default::default()
        };

        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field, .. }) if field == "library.path"
        ));
    }

    #[test]
    fn test_blank_sdk_type_invalid() {
        let config = BridgeConfig {
            metadata: Some(MetadataConfig {
                sdk_type: Some("  ".to_string()),
            }),
            ..Default::default()
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_merge_field_by_field() {
        let mut base: BridgeConfig = toml::from_str(
            r#"
[library]
path = "/global/libengine.so"
temp_dir = "/global/tmp"

[logging]
filter = "warn"
"#,
        )
        .unwrap();
        let project: BridgeConfig = toml::from_str(
            r#"
[library]
path = "/project/libengine.so"

[logging]
format = "compact"
"#,
        )
        .unwrap();

        base.merge(&project);

        assert_eq!(base.library_path(), Some(Path::new("/project/libengine.so")));
        assert_eq!(base.temp_dir(), Some(Path::new("/global/tmp")));
        assert_eq!(base.logging().filter_or_default(), "warn");
        assert_eq!(base.logging().format_or_default(), LogFormat::Compact);
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("JSON"), Some(LogFormat::Json));
        assert_eq!(LogFormat::parse("compact"), Some(LogFormat::Compact));
        assert_eq!(LogFormat::parse("xml"), None);
    }
}
