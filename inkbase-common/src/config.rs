//! Configuration loading and root folder resolution
//!
//! Bootstrap settings come from a small TOML file; everything that may change
//! at runtime lives in the database `settings` table instead.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable consulted for the root folder
pub const ROOT_FOLDER_ENV: &str = "INKBASE_ROOT_FOLDER";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "inkbase.db";

/// Bootstrap configuration loaded from TOML file
///
/// These settings cannot change during runtime.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    /// Root folder holding the database file
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// Address the HTTP listener binds to
    #[serde(default)]
    pub bind_address: Option<String>,

    /// HTTP listener port
    #[serde(default)]
    pub port: Option<u16>,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,
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

fn default_log_level() -> String {
    "info".to_string()
}

/// Outcome of loading the bootstrap file
///
/// Loading happens before logging is configured, so problems are collected
/// here for the caller to report once a subscriber is installed.
#[derive(Debug, Clone, Default)]
pub struct LoadedConfig {
    pub config: TomlConfig,
    /// File the configuration was read from, if any
    pub source: Option<PathBuf>,
    /// Problems that caused a file to be ignored
    pub warnings: Vec<String>,
}

impl TomlConfig {
    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))
    }

    /// Load TOML configuration, degrading to defaults
    ///
    /// An explicit path that cannot be read or parsed is reported and ignored;
    /// a missing platform config file is silently ignored.
    pub fn load(explicit_path: Option<&Path>) -> LoadedConfig {
        let path = match explicit_path {
            Some(path) => Some(path.to_path_buf()),
            None => default_config_file(),
        };

        let Some(path) = path else {
            return LoadedConfig::default();
        };

        match std::fs::read_to_string(&path) {
            Ok(content) => match Self::from_toml_str(&content) {
                Ok(config) => LoadedConfig {
                    config,
                    source: Some(path),
                    warnings: Vec::new(),
                },
                Err(e) => LoadedConfig {
                    warnings: vec![format!("Ignoring config file {}: {}", path.display(), e)],
                    ..LoadedConfig::default()
                },
            },
            Err(e) if explicit_path.is_some() => LoadedConfig {
                warnings: vec![format!("Cannot read config file {}: {}", path.display(), e)],
                ..LoadedConfig::default()
            },
            Err(_) => LoadedConfig::default(),
        }
    }
}

impl LoadedConfig {
    /// Report the load outcome through the installed subscriber
    pub fn log(&self) {
        if let Some(path) = &self.source {
            info!("Loaded configuration from {}", path.display());
        }
        for warning in &self.warnings {
            warn!("{}", warning);
        }
    }
}

/// Root folder resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(cli_arg: Option<&Path>, toml_config: &TomlConfig) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(path) = &toml_config.root_folder {
        return path.clone();
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// Database file location inside a root folder
pub fn database_path(root_folder: &Path) -> PathBuf {
    root_folder.join(DATABASE_FILE)
}

/// Platform config file, if one exists
fn default_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("inkbase").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    let system_config = PathBuf::from("/etc/inkbase/config.toml");
    if cfg!(unix) && system_config.exists() {
        return Some(system_config);
    }

    None
}

/// Get OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("inkbase"))
        .unwrap_or_else(|| PathBuf::from("./inkbase_data"))
}
