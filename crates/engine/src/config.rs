//! Recorder configuration via `regrest.toml` and environment variables
//!
//! There is no global configuration: a `RegrestConfig` is built explicitly
//! and handed to `Recorder::open`. Sources, lowest precedence first:
//! 1. `RegrestConfig::default()`
//! 2. `RegrestConfig::from_file("regrest.toml")`
//! 3. `with_env_overrides()`
//! 4. Per-function options on `Regression`

use std::path::{Path, PathBuf};

use regrest_core::{Limits, ResolutionPolicy, DEFAULT_MAX_DEPTH};
use regrest_matcher::{Matcher, DEFAULT_TOLERANCE};
use regrest_storage::{StoreConfig, DEFAULT_STORE_DIR};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Conventional config file name
pub const CONFIG_FILE_NAME: &str = "regrest.toml";

/// Environment variable overriding `storage_dir`
pub const ENV_STORAGE_DIR: &str = "REGREST_STORAGE_DIR";
/// Environment variable overriding `tolerance`
pub const ENV_TOLERANCE: &str = "REGREST_TOLERANCE";
/// Environment variable overriding `update_mode`
pub const ENV_UPDATE_MODE: &str = "REGREST_UPDATE_MODE";
/// Environment variable overriding `raise_on_error`
pub const ENV_RAISE_ON_ERROR: &str = "REGREST_RAISE_ON_ERROR";

/// Recorder configuration
///
/// # Example
///
/// ```toml
/// storage_dir = ".regrest"
/// tolerance = 1e-9
/// update_mode = false
/// raise_on_error = false
/// strict_types = true
/// max_depth = 128
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegrestConfig {
    /// Directory holding record files (default: `.regrest`)
    pub storage_dir: PathBuf,
    /// Absolute float tolerance (default: 1e-9)
    pub tolerance: f64,
    /// Overwrite records instead of comparing against them
    pub update_mode: bool,
    /// Return mismatches and load failures as errors instead of logging them
    pub raise_on_error: bool,
    /// Treat unregistered object types in records as load failures
    pub strict_types: bool,
    /// Nesting bound for encoding, loading and comparison
    pub max_depth: usize,
}

impl Default for RegrestConfig {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from(DEFAULT_STORE_DIR),
            tolerance: DEFAULT_TOLERANCE,
            update_mode: false,
            raise_on_error: false,
            strict_types: true,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl RegrestConfig {
    /// Default config for a given storage directory
    pub fn with_storage_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            storage_dir: dir.into(),
            ..Self::default()
        }
    }

    /// Returns the default config file content with comments
    pub fn default_toml() -> &'static str {
        r#"# regrest configuration
#
# Directory holding one JSON file per recorded call
storage_dir = ".regrest"

# Absolute tolerance for float comparisons
tolerance = 1e-9

# Overwrite records with fresh results instead of comparing (default: false)
update_mode = false

# Return regressions as errors instead of logging them (default: false)
raise_on_error = false

# Fail to load records that contain unregistered object types (default: true)
# When false, such objects are still compared, but cannot be rebuilt.
strict_types = true

# Maximum nesting depth of recorded values
max_depth = 128
"#
    }

    /// Read and parse config from a file path
    ///
    /// Missing fields take their defaults.
    pub fn from_file(path: &Path) -> EngineResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            EngineError::config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: RegrestConfig = toml::from_str(&content).map_err(|e| {
            EngineError::config(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist
    pub fn write_default_if_missing(path: &Path) -> EngineResult<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                EngineError::config(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Apply `REGREST_*` environment variables
    pub fn with_env_overrides(self) -> EngineResult<Self> {
        self.with_overrides_from(|name| std::env::var(name).ok())
    }

    /// Apply overrides from any variable source
    pub fn with_overrides_from<F>(mut self, lookup: F) -> EngineResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(ENV_STORAGE_DIR) {
            self.storage_dir = PathBuf::from(dir);
        }
        if let Some(value) = lookup(ENV_TOLERANCE) {
            self.tolerance = value.trim().parse().map_err(|_| {
                EngineError::config(format!("{} must be a number, got '{}'", ENV_TOLERANCE, value))
            })?;
        }
        if let Some(value) = lookup(ENV_UPDATE_MODE) {
            self.update_mode = parse_flag(ENV_UPDATE_MODE, &value)?;
        }
        if let Some(value) = lookup(ENV_RAISE_ON_ERROR) {
            self.raise_on_error = parse_flag(ENV_RAISE_ON_ERROR, &value)?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Check value ranges
    pub fn validate(&self) -> EngineResult<()> {
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(EngineError::config(format!(
                "tolerance must be a finite, non-negative number, got {}",
                self.tolerance
            )));
        }
        if self.max_depth == 0 {
            return Err(EngineError::config("max_depth must be at least 1"));
        }
        if self.storage_dir.as_os_str().is_empty() {
            return Err(EngineError::config("storage_dir must not be empty"));
        }
        Ok(())
    }

    /// Depth limits
    pub fn limits(&self) -> Limits {
        Limits::with_max_depth(self.max_depth)
    }

    /// Record store configuration
    pub fn store_config(&self) -> StoreConfig {
        let policy = if self.strict_types {
            ResolutionPolicy::Strict
        } else {
            ResolutionPolicy::Lenient
        };
        StoreConfig::new(&self.storage_dir)
            .with_policy(policy)
            .with_limits(self.limits())
    }

    /// Matcher with this tolerance and limits
    pub fn matcher(&self) -> Matcher {
        Matcher::new(self.tolerance).with_limits(self.limits())
    }
}

fn parse_flag(name: &str, value: &str) -> EngineResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(EngineError::config(format!(
            "{} must be a boolean flag, got '{}'",
            name, value
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn default_config() {
        let config = RegrestConfig::default();
        assert_eq!(config.storage_dir, PathBuf::from(".regrest"));
        assert_eq!(config.tolerance, 1e-9);
        assert!(!config.update_mode);
        assert!(!config.raise_on_error);
        assert!(config.strict_types);
        assert_eq!(config.max_depth, 128);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn default_toml_parses_to_default() {
        let config: RegrestConfig = toml::from_str(RegrestConfig::default_toml()).unwrap();
        assert_eq!(config, RegrestConfig::default());
    }

    #[test]
    fn write_default_creates_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        assert!(!path.exists());

        RegrestConfig::write_default_if_missing(&path).unwrap();
        assert!(path.exists());

        let config = RegrestConfig::from_file(&path).unwrap();
        assert_eq!(config, RegrestConfig::default());
    }

    #[test]
    fn write_default_does_not_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "update_mode = true\n").unwrap();

        RegrestConfig::write_default_if_missing(&path).unwrap();

        let config = RegrestConfig::from_file(&path).unwrap();
        assert!(config.update_mode);
    }

    #[test]
    fn from_file_with_missing_fields_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "tolerance = 0.01\n").unwrap();

        let config = RegrestConfig::from_file(&path).unwrap();
        assert_eq!(config.tolerance, 0.01);
        assert_eq!(config.storage_dir, PathBuf::from(".regrest"));
    }

    #[test]
    fn from_file_rejects_invalid_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "tolerance = -1.0\n").unwrap();
        assert!(matches!(
            RegrestConfig::from_file(&path),
            Err(EngineError::Config(_))
        ));

        std::fs::write(&path, "max_depth = \"deep\"\n").unwrap();
        assert!(RegrestConfig::from_file(&path).is_err());
    }

    #[test]
    fn missing_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        let err = RegrestConfig::from_file(&dir.path().join("nope.toml")).unwrap_err();
        assert!(err.to_string().contains("nope.toml"));
    }

    #[test]
    fn env_overrides() {
        let config = RegrestConfig::default()
            .with_overrides_from(env(&[
                ("REGREST_STORAGE_DIR", "/tmp/records"),
                ("REGREST_TOLERANCE", "0.5"),
                ("REGREST_UPDATE_MODE", "1"),
                ("REGREST_RAISE_ON_ERROR", "True"),
            ]))
            .unwrap();
        assert_eq!(config.storage_dir, PathBuf::from("/tmp/records"));
        assert_eq!(config.tolerance, 0.5);
        assert!(config.update_mode);
        assert!(config.raise_on_error);
    }

    #[test]
    fn env_flag_off_values() {
        let config = RegrestConfig {
            update_mode: true,
            ..RegrestConfig::default()
        }
        .with_overrides_from(env(&[("REGREST_UPDATE_MODE", "off")]))
        .unwrap();
        assert!(!config.update_mode);
    }

    #[test]
    fn env_rejects_garbage() {
        assert!(RegrestConfig::default()
            .with_overrides_from(env(&[("REGREST_UPDATE_MODE", "maybe")]))
            .is_err());
        assert!(RegrestConfig::default()
            .with_overrides_from(env(&[("REGREST_TOLERANCE", "small")]))
            .is_err());
        assert!(RegrestConfig::default()
            .with_overrides_from(env(&[("REGREST_TOLERANCE", "NaN")]))
            .is_err());
    }

    #[test]
    fn store_config_policy() {
        let lenient = RegrestConfig {
            strict_types: false,
            ..RegrestConfig::with_storage_dir("r")
        };
        assert_eq!(lenient.store_config().policy, ResolutionPolicy::Lenient);
        assert_eq!(lenient.store_config().dir, PathBuf::from("r"));
        assert_eq!(lenient.matcher().tolerance(), 1e-9);
    }
}
