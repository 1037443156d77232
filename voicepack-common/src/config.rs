//! Bootstrap configuration loading and root folder resolution
//!
//! Settings sources, highest priority first:
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Built-in defaults

use crate::types::Mode;
use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable consulted for the root folder
pub const ROOT_FOLDER_ENV: &str = "VOICEPACK_ROOT_FOLDER";

/// Name of the bootstrap file looked up inside the root folder
pub const CONFIG_FILE_NAME: &str = "voicepack.toml";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// Root folder holding the database (optional, see [`resolve_root_folder`])
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// SQLite database path; defaults to `<root>/voicepack.db`
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// HTTP control API port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Version every installed component is expected to match
    #[serde(default = "default_target_version")]
    pub target_version: String,

    /// Prefix of component fetch URLs (`{prefix}@{version}/...`)
    #[serde(default = "default_package_url_prefix")]
    pub package_url_prefix: String,

    /// Base URL of the remote synthesis service
    #[serde(default = "default_remote_api_url")]
    pub remote_api_url: String,

    /// HTTP timeout: connect timeout and longest stall while reading a
    /// chunk body; whole-request timeout for remote synthesis
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Maximum number of cached sentences (unbounded when unset)
    #[serde(default)]
    pub cache_capacity: Option<usize>,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Overrides of the built-in package layout
    #[serde(default)]
    pub components: Vec<ComponentOverride>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// One `[[components]]` entry: replaces or adds a component of a mode's layout
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ComponentOverride {
    pub mode: Mode,
    pub name: String,
    pub chunks: usize,
}

fn default_port() -> u16 {
    5780
}

fn default_target_version() -> String {
    "1.0.0".to_string()
}

fn default_package_url_prefix() -> String {
    "https://cdn.jsdelivr.net/npm/voicepack-data".to_string()
}

fn default_remote_api_url() -> String {
    "http://localhost:5781/synthesize".to_string()
}

fn default_request_timeout_ms() -> u64 {
    30000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            database_path: None,
            port: default_port(),
            target_version: default_target_version(),
            package_url_prefix: default_package_url_prefix(),
            remote_api_url: default_remote_api_url(),
            request_timeout_ms: default_request_timeout_ms(),
            cache_capacity: None,
            logging: LoggingConfig::default(),
            components: Vec::new(),
        }
    }
}

impl TomlConfig {
    /// Load configuration from a TOML file
    ///
    /// A missing file is not an error: a warning is logged and built-in
    /// defaults are returned. An unreadable or malformed file is.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!("Config file {:?} not found, using built-in defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config = Self::parse(&content)?;
        info!("Loaded TOML configuration from {:?}", path);
        Ok(config)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))?;

        if config.target_version.trim().is_empty() {
            return Err(Error::Config("target_version must not be empty".to_string()));
        }
        if let Some(bad) = config.components.iter().find(|c| c.chunks == 0) {
            return Err(Error::Config(format!(
                "Component '{}' must have at least one chunk",
                bad.name
            )));
        }

        Ok(config)
    }

    /// Database path, falling back to `<root>/voicepack.db`
    pub fn database_path(&self, root_folder: &Path) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| root_folder.join("voicepack.db"))
    }
}

/// Root folder resolution
///
/// 1. Command-line argument (highest priority)
/// 2. `VOICEPACK_ROOT_FOLDER` environment variable
/// 3. TOML `root_folder`
/// 4. OS-dependent default (fallback)
pub fn resolve_root_folder(cli_arg: Option<&Path>, toml_root: Option<&Path>) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = toml_root {
        return path.to_path_buf();
    }

    default_root_folder()
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("voicepack"))
        .unwrap_or_else(|| PathBuf::from("./voicepack_data"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TomlConfig::default();
        assert_eq!(config.port, 5780);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.request_timeout_ms, 30000);
        assert!(config.cache_capacity.is_none());
        assert!(config.components.is_empty());
    }

    #[test]
    fn test_parse_partial_file_fills_defaults() {
        let config = TomlConfig::parse(
            r#"
            target_version = "2.1.0"
            cache_capacity = 64

            [logging]
            level = "debug"

            [[components]]
            mode = "lightweight"
            name = "chars"
            chunks = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.target_version, "2.1.0");
        assert_eq!(config.cache_capacity, Some(64));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.port, 5780);
        assert_eq!(
            config.components,
            vec![ComponentOverride {
                mode: Mode::LocalSplice,
                name: "chars".to_string(),
                chunks: 3,
            }]
        );
    }

    #[test]
    fn test_parse_rejects_zero_chunks() {
        let result = TomlConfig::parse(
            r#"
            [[components]]
            mode = "offline"
            name = "model"
            chunks = 0
            "#,
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_database_path_defaults_into_root() {
        let config = TomlConfig::default();
        assert_eq!(
            config.database_path(Path::new("/data/vp")),
            PathBuf::from("/data/vp/voicepack.db")
        );
    }
}
