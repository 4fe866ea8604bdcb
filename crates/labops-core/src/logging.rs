//! Structured logging setup.

use std::sync::OnceLock;

use tracing_subscriber::EnvFilter;

use crate::config::LabOpsConfig;

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Install a global `tracing` subscriber once per process.
///
/// `RUST_LOG` takes precedence over `level`. Later calls are no-ops, and an
/// existing global subscriber (e.g. installed by an FFI host) is left alone.
pub fn init_logging(level: &str, json: bool) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

        let result = if json {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(true)
                .json()
                .try_init()
        } else {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(true)
                .try_init()
        };

        if result.is_err() {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::info!(level, json, "Logging initialized");
    });
}

/// Install logging from configuration.
pub fn init_from_config(config: &LabOpsConfig) {
    init_logging(&config.log_level, config.log_json);
}
