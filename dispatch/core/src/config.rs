//! TOML Configuration File Support
//!
//! Configuration for the dispatch engine and its hosts, read from
//! `~/.config/genstudio/dispatch.toml`.
//!
//! # Configuration Priority
//!
//! Configuration values are loaded with the following priority (highest first):
//! 1. CLI arguments (via [`ConfigOverrides`])
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! # XDG Base Directory Compliance
//!
//! - `$XDG_CONFIG_HOME/genstudio/dispatch.toml` (typically `~/.config/genstudio/dispatch.toml`)
//!
//! # Example Configuration
//!
//! ```toml
//! [backend]
//! base_url = "http://gpu-box:7860"
//! generation_timeout_secs = 3600
//! metadata_timeout_secs = 30
//! connect_timeout_secs = 10
//!
//! [output]
//! directory = "/srv/genstudio/outputs"
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backend::BackendConfig;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// Backend section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendToml {
    /// Base URL of the generation server
    pub base_url: Option<String>,

    /// Timeout for generation calls in seconds
    pub generation_timeout_secs: Option<u64>,

    /// Timeout for metadata calls in seconds
    pub metadata_timeout_secs: Option<u64>,

    /// TCP connect timeout in seconds
    pub connect_timeout_secs: Option<u64>,
}

/// Output section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputToml {
    /// Where artifacts are written
    pub directory: Option<PathBuf>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchToml {
    /// Backend configuration section
    pub backend: BackendToml,

    /// Output configuration section
    pub output: OutputToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Resolved configuration
///
/// Use [`load_config`] to load configuration with proper priority handling.
#[derive(Clone, Debug)]
pub struct DispatchConfig {
    /// Backend connection settings
    pub backend: BackendConfig,

    /// Where hosts write artifacts
    pub output_dir: PathBuf,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    /// Source of configuration values
    source: ConfigSource,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            output_dir: PathBuf::from("./outputs"),
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl DispatchConfig {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Set the configuration source
    pub fn set_source(&mut self, source: ConfigSource) {
        self.source = source;
    }

    /// Check the values make sense
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] for a zero timeout or a base
    /// URL that is not http(s).
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = &self.backend.base_url;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::ValidationError(format!(
                "backend base_url must start with http:// or https://, got {url:?}"
            )));
        }
        for (name, timeout) in [
            ("generation_timeout", self.backend.generation_timeout),
            ("metadata_timeout", self.backend.metadata_timeout),
            ("connect_timeout", self.backend.connect_timeout),
        ] {
            if timeout.is_zero() {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must be greater than zero"
                )));
            }
        }
        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/genstudio/dispatch.toml` or
/// `~/.config/genstudio/dispatch.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("genstudio").join("dispatch.toml"))
}

/// Load configuration from all sources with proper priority
///
/// CLI overrides are not handled here; apply a [`ConfigOverrides`] afterwards
/// and call [`DispatchConfig::validate`].
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed.
/// A missing config file is not an error (defaults are used).
pub fn load_config() -> Result<DispatchConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path
///
/// # Arguments
///
/// * `path` - Optional path to the configuration file. If `None`, only defaults
///   and environment variables are used.
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<DispatchConfig, ConfigError> {
    let mut config = DispatchConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: DispatchToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_config(&mut config, |key| std::env::var(key).ok());

    Ok(config)
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut DispatchConfig, toml: &DispatchToml) {
    if let Some(ref url) = toml.backend.base_url {
        config.backend.base_url.clone_from(url);
    }
    if let Some(secs) = toml.backend.generation_timeout_secs {
        config.backend.generation_timeout = Duration::from_secs(secs);
    }
    if let Some(secs) = toml.backend.metadata_timeout_secs {
        config.backend.metadata_timeout = Duration::from_secs(secs);
    }
    if let Some(secs) = toml.backend.connect_timeout_secs {
        config.backend.connect_timeout = Duration::from_secs(secs);
    }

    if let Some(ref dir) = toml.output.directory {
        config.output_dir.clone_from(dir);
    }
}

/// Apply environment variable overrides to the config
///
/// `lookup` is `std::env::var` in production.
fn apply_env_config(config: &mut DispatchConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(url) = lookup("DISPATCH_BACKEND_URL") {
        config.backend.base_url = url;
        config.source = ConfigSource::Env;
    }

    let secs = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());
    if let Some(s) = secs("DISPATCH_GENERATION_TIMEOUT") {
        config.backend.generation_timeout = Duration::from_secs(s);
        config.source = ConfigSource::Env;
    }
    if let Some(s) = secs("DISPATCH_METADATA_TIMEOUT") {
        config.backend.metadata_timeout = Duration::from_secs(s);
        config.source = ConfigSource::Env;
    }
    if let Some(s) = secs("DISPATCH_CONNECT_TIMEOUT") {
        config.backend.connect_timeout = Duration::from_secs(s);
        config.source = ConfigSource::Env;
    }

    if let Some(dir) = lookup("DISPATCH_OUTPUT_DIR") {
        config.output_dir = PathBuf::from(dir);
        config.source = ConfigSource::Env;
    }
}

// =============================================================================
// CLI Overrides
// =============================================================================

/// Command-line overrides, applied last
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Backend base URL
    pub backend_url: Option<String>,

    /// Output directory
    pub output_dir: Option<PathBuf>,

    /// Generation timeout in seconds
    pub generation_timeout_secs: Option<u64>,
}

impl ConfigOverrides {
    /// Create empty overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the backend URL
    #[must_use]
    pub fn with_backend_url(mut self, url: String) -> Self {
        self.backend_url = Some(url);
        self
    }

    /// Override the output directory
    #[must_use]
    pub fn with_output_dir(mut self, dir: PathBuf) -> Self {
        self.output_dir = Some(dir);
        self
    }

    /// Override the generation timeout
    #[must_use]
    pub fn with_generation_timeout_secs(mut self, secs: u64) -> Self {
        self.generation_timeout_secs = Some(secs);
        self
    }

    /// Apply overrides to a configuration
    pub fn apply(&self, config: &mut DispatchConfig) {
        if let Some(ref url) = self.backend_url {
            config.backend.base_url.clone_from(url);
            config.source = ConfigSource::Cli;
        }
        if let Some(ref dir) = self.output_dir {
            config.output_dir.clone_from(dir);
            config.source = ConfigSource::Cli;
        }
        if let Some(secs) = self.generation_timeout_secs {
            config.backend.generation_timeout = Duration::from_secs(secs);
            config.source = ConfigSource::Cli;
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
