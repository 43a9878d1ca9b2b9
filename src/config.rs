//! Configuration management for the application.
//!
//! This module handles loading, validating, and saving application configuration
//! in TOML format with platform-specific directory resolution.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::{APP_DIR_NAME, PERMISSION_OPERATIONS};

/// HTTP server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

const fn default_port() -> u16 {
    3001
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Path configuration for file system locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PathConfig {
    /// Site definition file (sidebars and widget types); the built-in site is
    /// served when unset
    pub site_file: Option<PathBuf>,
    /// JSON option store file (defaults to `options.json` in the config dir)
    pub data_file: Option<PathBuf>,
}

impl PathConfig {
    /// Resolves the option store file, falling back to the config directory.
    pub fn data_file(&self) -> Result<PathBuf> {
        match &self.data_file {
            Some(path) => Ok(path.clone()),
            None => Ok(Config::config_dir()?.join("options.json")),
        }
    }
}

/// Application configuration.
///
/// # File Location
///
/// - Linux: `~/.config/WidgetRest/config.toml`
/// - macOS: `~/Library/Application Support/WidgetRest/config.toml`
/// - Windows: `%APPDATA%\WidgetRest\config.toml`
///
/// # Permissions
///
/// The `[permissions]` table maps operation names (`get_sidebars`,
/// `create_widget`, ...) to the verdict of the permission hook for that
/// operation. `true` permits, `false` denies, and any other value is
/// reported as a misconfigured hook when the operation is requested.
///
/// ```toml
/// [server]
/// port = 8080
///
/// [permissions]
/// create_widget = false
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,
    /// File system paths
    #[serde(default)]
    pub paths: PathConfig,
    /// Per-operation permission verdicts
    #[serde(default)]
    pub permissions: BTreeMap<String, toml::Value>,
}

impl Config {
    /// Creates a new Config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets the configuration directory path.
    ///
    /// - Linux: `~/.config/WidgetRest/`
    /// - macOS: `~/Library/Application Support/WidgetRest/`
    /// - Windows: `%APPDATA%\WidgetRest\`
    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to determine config directory")?
            .join(APP_DIR_NAME);

        Ok(config_dir)
    }

    /// Gets the full path to the configuration file.
    pub fn config_file_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Loads configuration from the default location.
    ///
    /// Returns defaults if the file doesn't exist.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    /// Loads configuration from a specific file, returning defaults if it is absent.
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::new());
        }

        let content = fs::read_to_string(config_path).context(format!(
            "Failed to read config file: {}",
            config_path.display()
        ))?;

        let config: Self = toml::from_str(&content).context(format!(
            "Failed to parse config file: {}",
            config_path.display()
        ))?;

        config.validate()?;
        Ok(config)
    }

    /// Saves configuration to the default location.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path()?)
    }

    /// Saves configuration to a specific file.
    ///
    /// Uses atomic write pattern (temp file + rename) to prevent corruption.
    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        self.validate()?;

        // Ensure config directory exists
        if let Some(config_dir) = config_path.parent() {
            fs::create_dir_all(config_dir).context(format!(
                "Failed to create config directory: {}",
                config_dir.display()
            ))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        let temp_path = config_path.with_extension("toml.tmp");

        // Write to temp file
        fs::write(&temp_path, content).context(format!(
            "Failed to write temp config file: {}",
            temp_path.display()
        ))?;

        // Atomic rename
        fs::rename(&temp_path, config_path).context(format!(
            "Failed to rename temp config file to: {}",
            config_path.display()
        ))?;

        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.server.host.trim().is_empty() {
            anyhow::bail!("Server host must not be empty");
        }

        if let Some(site_file) = &self.paths.site_file {
            if !site_file.is_file() {
                anyhow::bail!("Site file does not exist: {}", site_file.display());
            }
        }

        if let Some(data_file) = &self.paths.data_file {
            if data_file.is_dir() {
                anyhow::bail!(
                    "Data file path is a directory: {}",
                    data_file.display()
                );
            }
        }

        for operation in self.permissions.keys() {
            if !PERMISSION_OPERATIONS.contains(&operation.as_str()) {
                anyhow::bail!(
                    "Unknown operation in [permissions]: '{operation}' (expected one of: {})",
                    PERMISSION_OPERATIONS.join(", ")
                );
            }
        }

        Ok(())
    }
}
