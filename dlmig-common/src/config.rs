//! Configuration file loading
//!
//! The TOML file only supplies values; resolution against command-line
//! arguments and validation happen in the consuming tool.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit configuration file
pub const CONFIG_ENV_VAR: &str = "DLMIG_CONFIG";

/// Top-level TOML configuration
///
/// Every field is optional so a partial file only overrides what it names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub aleph: AlephSection,
    pub imageserver: ImageserverSection,
    pub kramerius: KrameriusSection,
    pub catalog: CatalogSection,
    pub logging: LoggingConfig,
}

/// Catalog-update side file settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlephSection {
    /// Directory receiving one `<uuid>.csv` update record per title
    pub directory: Option<PathBuf>,
}

/// Image server settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageserverSection {
    /// Root directory of the image server storage
    pub directory: Option<PathBuf>,
    /// Public base URL the tiles are served from
    pub url: Option<String>,
}

/// Digital library (Kramerius) settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KrameriusSection {
    /// Import directory watched by the digital library
    pub directory: Option<PathBuf>,
    /// Import process endpoint
    pub address: Option<String>,
    /// `user:password`
    pub credentials: Option<String>,
    /// Prefix of `importDirectory` as seen by the digital library host
    pub import_prefix: Option<String>,
}

/// Bibliographic catalog lookup settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogSection {
    pub base_url: Option<String>,
    pub partitions: Option<Vec<String>>,
    pub retry_count: Option<u32>,
    pub institution_prefix: Option<String>,
    pub fallback_partition: Option<String>,
    pub max_candidates: Option<u32>,
}

/// Logging configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `dlmig_ingest=debug`
    pub level: Option<String>,
}

/// Load and parse a TOML configuration file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Could not read config file at {}: {}", path.display(), e))
    })?;

    toml::from_str(&content).map_err(|e| {
        Error::Config(format!("Could not parse config file at {}: {}", path.display(), e))
    })
}

/// Locate the configuration file
///
/// Priority order:
/// 1. Command-line argument
/// 2. `DLMIG_CONFIG` environment variable
/// 3. `<config_dir>/dlmig/config.toml` when it exists
///
/// An explicitly named file must exist; the platform default is optional.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(path) = cli_arg {
        return require_file(path.to_path_buf()).map(Some);
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return require_file(PathBuf::from(path)).map(Some);
        }
    }

    Ok(default_config_path().filter(|p| p.is_file()))
}

/// Platform default configuration file path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("dlmig").join("config.toml"))
}

/// Resolve and load the configuration, falling back to an empty config
pub fn load_config(cli_arg: Option<&Path>) -> Result<TomlConfig> {
    match resolve_config_path(cli_arg)? {
        Some(path) => {
            tracing::info!(path = %path.display(), "Loading configuration file");
            load_toml_config(&path)
        }
        None => {
            tracing::debug!("No configuration file found, using command-line values and defaults");
            Ok(TomlConfig::default())
        }
    }
}

fn require_file(path: PathBuf) -> Result<PathBuf> {
    if path.is_file() {
        Ok(path)
    } else {
        Err(Error::Config(format!("Config file not found: {}", path.display())))
    }
}
