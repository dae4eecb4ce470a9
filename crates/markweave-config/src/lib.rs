use std::path::{Path, PathBuf};

use markweave_engine::commands::InsertTable;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {config_path}: {source}")]
    ConfigReadError {
        config_path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {config_path}: {source}")]
    ConfigParseError {
        config_path: PathBuf,
        source: toml::de::Error,
    },
}

/// Canonical markup forms used when nodes and marks are constructed
/// programmatically rather than parsed from text.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkupDefaults {
    pub emphasis: String,
    pub strong: String,
    pub bullet: String,
    pub ordered_delim: String,
    pub code_fence: String,
}

impl Default for MarkupDefaults {
    fn default() -> Self {
        MarkupDefaults {
            emphasis: "*".to_string(),
            strong: "**".to_string(),
            bullet: "-".to_string(),
            ordered_delim: ".".to_string(),
            code_fence: "```".to_string(),
        }
    }
}

/// Grid dimensions for a freshly inserted table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TableDefaults {
    pub rows: usize,
    pub columns: usize,
}

impl Default for TableDefaults {
    fn default() -> Self {
        TableDefaults { rows: 2, columns: 2 }
    }
}

/// Session configuration for the editing core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub markup: MarkupDefaults,
    pub table: TableDefaults,
}

impl Config {
    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Option<Self>, ConfigError> {
        let config_path = config_path.as_ref();
        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(config_path).map_err(|source| {
            ConfigError::ConfigReadError {
                config_path: config_path.to_path_buf(),
                source,
            }
        })?;

        let config: Config =
            toml::from_str(&content).map_err(|source| ConfigError::ConfigParseError {
                config_path: config_path.to_path_buf(),
                source,
            })?;

        Ok(Some(config))
    }

    pub fn load() -> Result<Option<Self>, ConfigError> {
        let config_path = Self::config_path();
        Self::load_from_path(&config_path)
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, config_path: P) -> anyhow::Result<()> {
        let config_path = config_path.as_ref();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        let config_dir = shellexpand::tilde("~/.config/markweave");
        PathBuf::from(config_dir.as_ref()).join("config.toml")
    }

    /// The insert-table command sized per this configuration.
    pub fn insert_table_command(&self) -> InsertTable {
        InsertTable {
            rows: self.table.rows,
            cols: self.table.columns,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_config_path() {
        let config_path = Config::config_path();
        let path_str = config_path.to_string_lossy();

        // Should not contain tilde anymore
        assert!(!path_str.starts_with('~'));
        assert!(path_str.ends_with(".config/markweave/config.toml"));
    }

    #[test]
    fn test_defaults_are_canonical_forms() {
        let config = Config::default();
        assert_eq!(config.markup.emphasis, "*");
        assert_eq!(config.markup.strong, "**");
        assert_eq!(config.markup.bullet, "-");
        assert_eq!(config.table.rows, 2);
        assert_eq!(config.table.columns, 2);
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let mut original = Config::default();
        original.markup.emphasis = "_".to_string();
        original.table.rows = 4;

        let toml_str = toml::to_string(&original).unwrap();
        let deserialized: Config = toml::from_str(&toml_str).unwrap();

        assert_eq!(deserialized.markup.emphasis, "_");
        assert_eq!(deserialized.table.rows, 4);
    }

    #[test]
    fn test_load_config_file_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let non_existent_config = temp_dir.path().join("nonexistent.toml");

        let result = Config::load_from_path(&non_existent_config).unwrap();

        assert!(result.is_none());
    }

    #[test]
    fn test_save_and_load_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("config.toml");
        let mut test_config = Config::default();
        test_config.markup.bullet = "*".to_string();

        test_config.save_to_path(&config_file).unwrap();
        let loaded_config = Config::load_from_path(&config_file).unwrap().unwrap();

        assert_eq!(loaded_config.markup.bullet, "*");
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config_content = r#"
[table]
rows = 5
"#;

        let config: Config = toml::from_str(config_content).unwrap();

        assert_eq!(config.table.rows, 5);
        assert_eq!(config.table.columns, 2);
        assert_eq!(config.markup.strong, "**");
    }

    #[test]
    fn test_malformed_config_is_a_parse_error() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("config.toml");
        std::fs::write(&config_file, "not [valid toml").unwrap();

        let err = Config::load_from_path(&config_file).unwrap_err();
        assert!(matches!(err, ConfigError::ConfigParseError { .. }));
    }

    #[test]
    fn test_insert_table_command_uses_configured_size() {
        let mut config = Config::default();
        config.table.rows = 3;
        config.table.columns = 4;

        let command = config.insert_table_command();
        assert_eq!(command.rows, 3);
        assert_eq!(command.cols, 4);
    }
}
