//! Configuration management for pbar.
//!
//! Loads configuration from ${PBAR_HOME}/config.toml with sensible defaults.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Returns the default config template with comments.
///
/// This is embedded from default_config.toml at compile time.
fn default_config_template() -> &'static str {
    include_str!("../default_config.toml")
}

pub mod paths {
    //! Path resolution for pbar configuration and log directories.
    //!
    //! PBAR_HOME resolution order:
    //! 1. PBAR_HOME environment variable (if set)
    //! 2. ~/.config/pbar (default)
    //! 3. ./.pbar when no home directory can be determined

    use std::path::PathBuf;

    /// Returns the pbar home directory.
    pub fn pbar_home() -> PathBuf {
        if let Ok(home) = std::env::var("PBAR_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir().map_or_else(
            || PathBuf::from(".pbar"),
            |h| h.join(".config").join("pbar"),
        )
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        pbar_home().join("config.toml")
    }

    /// Returns the directory log files are written to.
    pub fn logs_dir() -> PathBuf {
        pbar_home().join("logs")
    }
}

/// Where the overlay is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    #[default]
    Stderr,
    Stdout,
}

/// Output configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub destination: Destination,
    /// Terminal type hint; `None` falls back to `$TERM`.
    pub term: Option<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Minimum time between two repaints
    pub min_redraw_interval_ms: u64,

    /// Auto-refresh interval (0 disables)
    pub refresh_interval_ms: u64,

    /// Rows reserved for the overlay
    pub height: u16,

    /// Read key bindings while running
    pub enable_input: bool,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub log: LogConfig,

    /// Style overrides keyed by style class
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub theme: BTreeMap<String, String>,
}

impl Config {
    const DEFAULT_MIN_REDRAW_INTERVAL_MS: u64 = 50;
    const DEFAULT_REFRESH_INTERVAL_MS: u64 = 300;
    const DEFAULT_HEIGHT: u16 = 10;

    /// Loads configuration from the default config path.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    pub fn min_redraw_interval(&self) -> Duration {
        Duration::from_millis(self.min_redraw_interval_ms)
    }

    pub fn refresh_interval(&self) -> Option<Duration> {
        if self.refresh_interval_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.refresh_interval_ms))
        }
    }

    /// Creates a default config file at the given path.
    /// Returns an error if the file already exists.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists at {}", path.display());
        }

        Self::write_config(path, default_config_template())
    }

    fn write_config(path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let tmp_path = path.with_extension("toml.tmp");
        fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write config to {}", tmp_path.display()))?;
        fs::rename(&tmp_path, path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                tmp_path.display(),
                path.display()
            )
        })?;

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_redraw_interval_ms: Self::DEFAULT_MIN_REDRAW_INTERVAL_MS,
            refresh_interval_ms: Self::DEFAULT_REFRESH_INTERVAL_MS,
            height: Self::DEFAULT_HEIGHT,
            enable_input: true,
            output: OutputConfig::default(),
            log: LogConfig::default(),
            theme: BTreeMap::new(),
        }
    }
}
