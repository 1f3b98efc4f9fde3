//! Engine configuration.
//!
//! Stored as TOML at `~/.config/figq/config.toml` (or the XDG equivalent);
//! `$FIGQ_CONFIG` points at an explicit file. A missing file means defaults.
//!
//! # Example Configuration
//!
//! ```toml
//! [locale]
//! grouping_separator = "."
//! decimal_separator = ","
//!
//! [table]
//! page_size = 20
//! default_sort = "-date"
//! column_size = "small"
//!
//! [logging]
//! level = "debug"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::format::NumberLocale;

pub const CONFIG_ENV: &str = "FIGQ_CONFIG";
const APP_DIR: &str = "figq";
const CONFIG_FILE: &str = "config.toml";

/// Errors that can occur when loading or saving engine configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Table figure defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    /// Rows per page for paginated table figures.
    pub page_size: u64,
    /// Order-by used when the caller gives none.
    pub default_sort: String,
    /// `size` written on every rendered column.
    pub column_size: String,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            page_size: 12,
            default_sort: "date".into(),
            column_size: "medium".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub locale: NumberLocale,
    pub table: TableConfig,
    pub logging: LoggingConfig,
}

impl EngineConfig {
    /// Load configuration from the default location.
    ///
    /// Returns defaults if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file; using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;

        Ok(config)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Get the configuration file path.
    ///
    /// - `$FIGQ_CONFIG` when set
    /// - `$XDG_CONFIG_HOME/figq/config.toml`
    /// - platform config dir (e.g. `~/.config/figq/config.toml` on Linux)
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        if let Ok(explicit) = std::env::var(CONFIG_ENV)
            && !explicit.trim().is_empty()
        {
            return Ok(PathBuf::from(explicit));
        }

        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            return Ok(PathBuf::from(xdg_config).join(APP_DIR).join(CONFIG_FILE));
        }

        dirs::config_dir()
            .map(|p| p.join(APP_DIR).join(CONFIG_FILE))
            .ok_or(ConfigError::NoConfigDir)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let locale = &self.locale;
        if locale.grouping_separator.is_empty() || locale.decimal_separator.is_empty() {
            return Err(ConfigError::Validation(
                "locale separators must not be empty".into(),
            ));
        }
        if locale.grouping_separator == locale.decimal_separator {
            return Err(ConfigError::Validation(format!(
                "grouping and decimal separators are both '{}'",
                locale.decimal_separator
            )));
        }
        if self.table.page_size == 0 {
            return Err(ConfigError::Validation(
                "table.page_size must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.table.page_size, 12);
        assert_eq!(config.table.default_sort, "date");
        assert_eq!(config.table.column_size, "medium");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.locale, NumberLocale::english());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let config: EngineConfig = toml::from_str("[table]\npage_size = 30\n").unwrap();
        assert_eq!(config.table.page_size, 30);
        assert_eq!(config.table.default_sort, "date");
        assert_eq!(config.locale.grouping_separator, ",");
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = EngineConfig::default();
        config.table.page_size = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));

        let mut config = EngineConfig::default();
        config.locale.decimal_separator = ",".into();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));

        let mut config = EngineConfig::default();
        config.locale.grouping_separator.clear();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_missing_file_is_default() {
        let config = EngineConfig::load_from(Path::new("/nonexistent/figq/config.toml")).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_serialization_roundtrip() {
        let mut config = EngineConfig::default();
        config.locale.grouping_separator = " ".into();
        config.table.default_sort = "-date".into();

        let serialized = toml::to_string_pretty(&config).unwrap();
        let deserialized: EngineConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(deserialized, config);
    }
}
