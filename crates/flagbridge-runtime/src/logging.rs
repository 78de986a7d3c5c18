//! Tracing subscriber setup
//!
//! The bridge only emits `tracing` events; hosts that already install a
//! subscriber need nothing from here. [`init_logging`] is a convenience for
//! hosts that do not. The first [`Bridge::global`](crate::Bridge::global)
//! load applies a configured `[logging]` section through [`init_from_config`].

use flagbridge_config::bridge::DEFAULT_LOG_FILTER;
use flagbridge_config::{BridgeConfig, LogFormat, LoggingConfig};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Build the filter: `RUST_LOG` when set and valid, else the configured directive.
pub fn build_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::try_new(config.filter_or_default())
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
    })
}

/// Install a global fmt subscriber writing to stderr.
///
/// Returns `false` if a global subscriber was already installed, in which
/// case nothing changes.
pub fn init_logging(config: &LoggingConfig) -> bool {
    let filter = build_filter(config);
    let layer = fmt::layer().with_writer(std::io::stderr).with_target(true);
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match config.format_or_default() {
        LogFormat::Pretty => registry.with(layer.pretty()).try_init(),
        LogFormat::Compact => registry.with(layer.compact()).try_init(),
        LogFormat::Json => registry.with(layer.json()).try_init(),
    };
    installed.is_ok()
}

/// Apply the `[logging]` section of `config`, if it has one.
///
/// Without the section the host's own subscriber choice stands and nothing
/// is installed.
pub fn init_from_config(config: &BridgeConfig) -> bool {
    match &config.logging {
        Some(logging) => {
            let installed = init_logging(logging);
            if !installed {
                tracing::debug!("subscriber already installed, [logging] section not applied");
            }
            installed
        }
        None => false,
    }
}
