//! Client configuration.
//!
//! Loaded from TOML, in this order:
//! 1. An explicit path (`--config`)
//! 2. `<config_dir>/pickup/config.toml`
//! 3. Built-in defaults
//!
//! `PICKUP_BASE_URL` and `PICKUP_FALLBACK_URL` override whatever the file says.

use crate::paths::{PathError, PickupPaths};
use pickup_core::session::{SessionSettings, DEFAULT_PAGE, DEFAULT_STORAGE_KEY};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "http://localhost:5000/aiml/corporatewebsite";
pub const BASE_URL_ENV: &str = "PICKUP_BASE_URL";
pub const FALLBACK_URL_ENV: &str = "PICKUP_FALLBACK_URL";

/// Errors that can occur while loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Path(PathError),
    /// An explicit config path was given but does not exist.
    NotFound(PathBuf),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "I/O error: {}", e),
            ConfigError::Parse(e) => write!(f, "TOML parse error: {}", e),
            ConfigError::Path(e) => write!(f, "Path error: {}", e),
            ConfigError::NotFound(path) => {
                write!(f, "Config file not found: {}", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

impl From<PathError> for ConfigError {
    fn from(e: PathError) -> Self {
        ConfigError::Path(e)
    }
}

/// Per-call deadlines, in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub login_secs: u64,
    pub session_secs: u64,
    pub trip_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            login_secs: 30,
            session_secs: 10,
            trip_secs: 15,
        }
    }
}

impl TimeoutConfig {
    pub fn login(&self) -> Duration {
        Duration::from_secs(self.login_secs)
    }

    pub fn session(&self) -> Duration {
        Duration::from_secs(self.session_secs)
    }

    pub fn trip(&self) -> Duration {
        Duration::from_secs(self.trip_secs)
    }
}

/// Settings for the pickup client.
///
/// ```toml
/// base_url = "https://pickup.example.com/api"
/// fallback_base_url = "http://10.0.0.2:5000/api"
/// refresh_interval_minutes = 15
///
/// [timeouts]
/// login_secs = 30
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    pub fallback_base_url: Option<String>,
    pub timeouts: TimeoutConfig,
    pub refresh_interval_minutes: u64,
    pub default_page: String,
    pub storage_key: String,
    /// Directory for the durable session record. Defaults to the data dir.
    pub storage_dir: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            fallback_base_url: None,
            timeouts: TimeoutConfig::default(),
            refresh_interval_minutes: 15,
            default_page: DEFAULT_PAGE.to_string(),
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            storage_dir: None,
        }
    }
}

impl ClientConfig {
    /// Parses a TOML document. Missing keys take their defaults.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Reads a config file.
    ///
    /// # Errors
    ///
    /// `ConfigError::NotFound` when the file does not exist.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Resolves configuration from the explicit path, the default location
    /// or defaults, then applies environment overrides.
    pub fn load(explicit: Option<&Path>, paths: &PickupPaths) -> Result<Self, ConfigError> {
        let mut config = match explicit {
            Some(path) => {
                debug!("[Config] Loading {}", path.display());
                Self::from_file(path)?
            }
            None => {
                let default_path = paths.config_file()?;
                if default_path.exists() {
                    debug!("[Config] Loading {}", default_path.display());
                    Self::from_file(&default_path)?
                } else {
                    debug!("[Config] No config file, using defaults");
                    Self::default()
                }
            }
        };

        config.apply_overrides(|name| std::env::var(name).ok());
        if config.storage_dir.is_none() {
            config.storage_dir = Some(paths.data_dir()?);
        }
        Ok(config)
    }

    /// Applies URL overrides from `lookup` (normally the process environment).
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(BASE_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.base_url = url.trim().to_string();
        }
        if let Some(url) = lookup(FALLBACK_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.fallback_base_url = Some(url.trim().to_string());
        }
    }

    /// Interval between background refresh checks. Never zero.
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_minutes.max(1) * 60)
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            storage_key: self.storage_key.clone(),
            default_page: self.default_page.clone(),
        }
    }
}
