//! Runtime configuration.
//!
//! Sources, later ones overriding earlier ones:
//! 1. built-in defaults
//! 2. an optional TOML file
//! 3. `LABOPS__*` environment variables (e.g. `LABOPS__COLLECTOR_SYNC_ATTEMPTS=10`)

use std::path::{Path, PathBuf};

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Settings for the lab-operations core.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LabOpsConfig {
    /// SQLite file; in-memory when absent
    pub database_path: Option<PathBuf>,
    /// Compare-and-swap attempts when re-deriving a collector's status
    pub collector_sync_attempts: u32,
    /// Report window used when the caller does not give one
    pub default_window_days: u32,
    /// `tracing` filter directive (overridden by `RUST_LOG`)
    pub log_level: String,
    /// Emit JSON log lines
    pub log_json: bool,
}

impl Default for LabOpsConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            collector_sync_attempts: 5,
            default_window_days: 30,
            log_level: "info".into(),
            log_json: false,
        }
    }
}

impl LabOpsConfig {
    /// Load from defaults, an optional file, then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        let settings = builder
            .add_source(
                Environment::with_prefix("LABOPS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document on top of the defaults (no environment).
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        let config: Self = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.collector_sync_attempts == 0 {
            return Err(ConfigError::Invalid(
                "collector_sync_attempts must be at least 1".into(),
            ));
        }
        if self.default_window_days == 0 {
            return Err(ConfigError::Invalid(
                "default_window_days must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = LabOpsConfig::default();
        assert_eq!(config.collector_sync_attempts, 5);
        assert_eq!(config.default_window_days, 30);
        assert!(config.database_path.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = LabOpsConfig::from_toml_str("default_window_days = 7\nlog_json = true").unwrap();
        assert_eq!(config.default_window_days, 7);
        assert!(config.log_json);
        assert_eq!(config.collector_sync_attempts, 5);
    }

    #[test]
    fn test_rejects_zero_attempts() {
        let err = LabOpsConfig::from_toml_str("collector_sync_attempts = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "database_path = \"/var/lib/labops/labops.db\"").unwrap();
        writeln!(file, "log_level = \"debug\"").unwrap();

        let config = LabOpsConfig::load(Some(file.path())).unwrap();
        assert_eq!(
            config.database_path,
            Some(PathBuf::from("/var/lib/labops/labops.db"))
        );
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = LabOpsConfig::load(Some(Path::new("/nonexistent/labops.toml")));
        assert!(matches!(result, Err(ConfigError::Load(_))));
    }
}
