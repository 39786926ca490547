//! Modhost Configuration
//!
//! Handles parsing and management of modhost.toml configuration files.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name searched for by [`HostConfig::find_and_load`].
pub const CONFIG_FILE_NAME: &str = "modhost.toml";

/// Environment variable naming an explicit configuration file.
pub const CONFIG_ENV_VAR: &str = "MODHOST_CONFIG";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config file not found: {0}")]
    NotFound(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Root configuration structure matching modhost.toml.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HostConfig {
    /// Module loading settings
    #[serde(default)]
    pub host: HostSettings,

    /// Log filter and output format
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Modules loaded when the process-wide host is first touched
    #[serde(default)]
    pub preload: PreloadConfig,
}

impl HostConfig {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        let config: HostConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Find and load configuration by searching up from the given directory.
    pub fn find_and_load(start_dir: &Path) -> ConfigResult<Self> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let config_path = dir.join(CONFIG_FILE_NAME);
            if config_path.exists() {
                return Self::load(&config_path);
            }
            if !dir.pop() {
                return Ok(Self::default());
            }
        }
    }

    /// Load from `MODHOST_CONFIG` if set, else search up from the current
    /// directory, else defaults.
    pub fn from_env() -> ConfigResult<Self> {
        if let Some(path) = std::env::var_os(CONFIG_ENV_VAR) {
            return Self::load(Path::new(&path));
        }
        let cwd = std::env::current_dir()?;
        Self::find_and_load(&cwd)
    }

    /// Save configuration to a file.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Module loading settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostSettings {
    /// Open a private copy of each module file instead of the file itself
    #[serde(default = "default_true")]
    pub shadow_copy: bool,

    /// Where shadow copies are written
    #[serde(default = "default_shadow_dir")]
    pub shadow_dir: PathBuf,

    /// Directories searched for bare module names, before the system paths
    #[serde(default)]
    pub search_paths: Vec<PathBuf>,
}

fn default_true() -> bool {
    true
}

fn default_shadow_dir() -> PathBuf {
    std::env::temp_dir().join("modhost-shadow")
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            shadow_copy: true,
            shadow_dir: default_shadow_dir(),
            search_paths: Vec::new(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
    Json,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive, used when neither `MODHOST_LOG` nor
    /// `RUST_LOG` is set
    #[serde(default = "default_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::Compact,
        }
    }
}

/// Modules to load at startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreloadConfig {
    #[serde(default)]
    pub modules: Vec<PathBuf>,
}
