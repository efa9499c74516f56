//! Configuration loading and service endpoint resolution
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments (`--base-url`, `--token`)
//! 2. Environment variables (`SSF_BASE_URL`, `SSF_AUTH_TOKEN`)
//! 3. TOML configuration file (`~/.config/ssf/<module>.toml`)
//! 4. Compiled defaults
//!
//! A missing or unparsable TOML file is never fatal: it is logged and the
//! remaining tiers are used.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::model::Coordinate;
use crate::{Error, Result};

/// Environment variable overriding the service base URL
pub const ENV_BASE_URL: &str = "SSF_BASE_URL";
/// Environment variable carrying the bearer token
pub const ENV_AUTH_TOKEN: &str = "SSF_AUTH_TOKEN";

/// Configuration file contents
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Service base URL, e.g. `https://studyspot.online/api`
    #[serde(default)]
    pub base_url: Option<String>,

    /// Bearer token attached to every request
    #[serde(default)]
    pub auth_token: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,

    /// Event bus capacity
    #[serde(default)]
    pub event_capacity: Option<usize>,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Position reported when the device location is requested
    #[serde(default)]
    pub default_location: Option<DefaultLocation>,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
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

/// `[default_location]` table
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DefaultLocation {
    pub latitude: f64,
    pub longitude: f64,
}

impl DefaultLocation {
    pub fn coordinate(&self) -> Option<Coordinate> {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// Built-in defaults (lowest priority tier)
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledDefaults {
    pub base_url: String,
    pub request_timeout: Duration,
    pub event_capacity: usize,
    pub log_level: String,
}

impl Default for CompiledDefaults {
    fn default() -> Self {
        Self {
            base_url: "https://studyspot.online/api".to_string(),
            request_timeout: Duration::from_secs(15),
            event_capacity: 256,
            log_level: default_log_level(),
        }
    }
}

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub base_url: Option<String>,
    pub auth_token: Option<String>,
}

/// Fully resolved client configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub base_url: String,
    pub auth_token: Option<String>,
    pub request_timeout: Duration,
    pub event_capacity: usize,
    pub log_level: String,
    pub default_location: Option<Coordinate>,
}

/// Resolves [`ServiceConfig`] across the four tiers
#[derive(Debug, Clone)]
pub struct ServiceConfigResolver {
    module_name: String,
    config_file: Option<PathBuf>,
}

impl ServiceConfigResolver {
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
            config_file: None,
        }
    }

    /// Use an explicit TOML file instead of the per-user location
    pub fn with_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    /// Path the TOML tier is read from
    pub fn config_file_path(&self) -> Option<PathBuf> {
        self.config_file.clone().or_else(|| {
            dirs::config_dir().map(|d| d.join("ssf").join(format!("{}.toml", self.module_name)))
        })
    }

    /// Load the TOML tier, degrading to defaults on any problem
    pub fn load_toml(&self) -> TomlConfig {
        let Some(path) = self.config_file_path() else {
            debug!("No config directory on this platform, skipping TOML tier");
            return TomlConfig::default();
        };
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return TomlConfig::default();
        }
        match load_toml_file(&path) {
            Ok(config) => {
                info!(path = %path.display(), "Loaded configuration file");
                config
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable config file");
                TomlConfig::default()
            }
        }
    }

    /// Resolve every setting by priority
    pub fn resolve(&self, cli: &CliOverrides) -> ServiceConfig {
        let toml = self.load_toml();
        let defaults = CompiledDefaults::default();

        let base_url = cli
            .base_url
            .clone()
            .or_else(|| non_blank_env(ENV_BASE_URL))
            .or(toml.base_url)
            .unwrap_or(defaults.base_url);

        let auth_token = cli
            .auth_token
            .clone()
            .or_else(|| non_blank_env(ENV_AUTH_TOKEN))
            .or(toml.auth_token)
            .filter(|t| !t.trim().is_empty());

        ServiceConfig {
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_token,
            request_timeout: toml
                .request_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            event_capacity: toml.event_capacity.unwrap_or(defaults.event_capacity),
            log_level: toml.logging.level,
            default_location: toml.default_location.and_then(|l| l.coordinate()),
        }
    }
}

fn non_blank_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Read and parse a TOML config file
pub fn load_toml_file(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
}
