//! Configuration for lsq.
//!
//! Config file resolution order:
//! 1. Explicit path passed to Config::load_from()
//! 2. LSQ_CONFIG environment variable
//! 3. Default: <platform config dir>/lsq/config.toml

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Environment variable naming the config file.
pub const LSQ_CONFIG_VAR: &str = "LSQ_CONFIG";

/// lsq configuration. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Field catalog used when no `--catalog` is given.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog: Option<PathBuf>,

    /// Result size when the compile input omits one.
    pub default_size: u64,

    /// Lint compiled output and report messages on stderr.
    pub lint_on_compile: bool,

    /// Treat lint warnings as failures.
    pub strict: bool,

    /// Pretty-print JSON output.
    pub pretty: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            catalog: None,
            default_size: 0,
            lint_on_compile: true,
            strict: false,
            pretty: true,
        }
    }
}

impl Config {
    /// Load config using the default resolution order.
    pub fn load() -> Result<Self> {
        match resolve_config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load config from a specific file. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Save config as TOML, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))
    }

    /// Path the config is read from when none is given explicitly.
    pub fn default_path() -> Option<PathBuf> {
        resolve_config_path()
    }
}

/// Resolve the config file path using the standard resolution order.
fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(LSQ_CONFIG_VAR) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    ProjectDirs::from("", "", "lsq").map(|dirs| dirs.config_dir().join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert_eq!(config.catalog, None);
        assert_eq!(config.default_size, 0);
        assert!(config.lint_on_compile);
        assert!(!config.strict);
        assert!(config.pretty);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = Config::load_from(&tmp.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "strict = true\ncatalog = \"fields.json\"\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert!(config.strict);
        assert_eq!(config.catalog, Some(PathBuf::from("fields.json")));
        assert!(config.lint_on_compile);
        assert_eq!(config.default_size, 0);
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "strict = \"sometimes\"").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_config_save_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested/dir/config.toml");

        let config = Config {
            catalog: Some(PathBuf::from("/srv/catalog.toml")),
            default_size: 25,
            pretty: false,
            ..Config::default()
        };
        config.save(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_to_toml_omits_unset_catalog() {
        let toml = Config::default().to_toml().unwrap();
        assert!(!toml.contains("catalog"));
        assert!(toml.contains("lint_on_compile = true"));
    }
}
