//! Config loading, validation, and utility operations.

use super::model::Config;
use super::types::LOG_LEVELS;
use crate::error::{OpsError, Result};
use std::path::{Path, PathBuf};

/// Config file picked up from the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "clusterops.yaml";

impl Config {
    /// Load config from a YAML file.
    ///
    /// Unknown fields in the YAML are silently ignored for forward compatibility.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the config file
    ///
    /// # Returns
    ///
    /// * `Ok(Config)` - Successfully loaded and validated config
    /// * `Err(OpsError::ConfigError)` - Read error, parse error or validation failure
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            OpsError::ConfigError(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Resolve the config for a CLI invocation.
    ///
    /// An explicit path must exist. Without one, `clusterops.yaml` in the current
    /// directory is used if present, otherwise defaults apply.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load(path),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::load(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Parse config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)
            .map_err(|e| OpsError::ConfigError(format!("failed to parse config YAML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize config to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| OpsError::ConfigError(format!("failed to serialize config to YAML: {}", e)))
    }

    /// Validate config values and return error on invalid values.
    ///
    /// Validation rules:
    /// - `data_dir` must be non-empty
    /// - `tasks_collection` must be non-empty and a single path component
    /// - `id_allocation_attempts` must be positive
    /// - `log_level` must be a known level
    pub fn validate(&self) -> Result<()> {
        if self.data_dir.trim().is_empty() {
            return Err(OpsError::ConfigError(
                "config validation failed: data_dir must not be empty".to_string(),
            ));
        }

        if self.tasks_collection.trim().is_empty() {
            return Err(OpsError::ConfigError(
                "config validation failed: tasks_collection must not be empty".to_string(),
            ));
        }
        if self.tasks_collection.contains(['/', '\\']) || self.tasks_collection == ".." {
            return Err(OpsError::ConfigError(format!(
                "config validation failed: tasks_collection must be a plain name (found '{}')",
                self.tasks_collection
            )));
        }

        if self.id_allocation_attempts == 0 {
            return Err(OpsError::ConfigError(
                "config validation failed: id_allocation_attempts must be greater than 0"
                    .to_string(),
            ));
        }

        let level = self.log_level.to_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(OpsError::ConfigError(format!(
                "config validation failed: unknown log_level '{}' (expected one of: {})",
                self.log_level,
                LOG_LEVELS.join(", ")
            )));
        }

        Ok(())
    }

    /// Directory holding the task collection documents.
    pub fn tasks_dir(&self) -> PathBuf {
        Path::new(&self.data_dir).join(&self.tasks_collection)
    }
}
