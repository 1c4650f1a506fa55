//! Path management for pickup client files.
//!
//! ```text
//! ~/.config/pickup/            # Config directory
//! └── config.toml              # Client configuration
//!
//! ~/.local/share/pickup/       # Data directory (default storage)
//! └── driver_session.json      # Persisted session record
//! ```

use std::path::{Path, PathBuf};

const APP_DIR: &str = "pickup";

/// Errors that can occur during path resolution.
#[derive(Debug)]
pub enum PathError {
    /// The platform config or data directory could not be determined.
    HomeDirNotFound,
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathError::HomeDirNotFound => write!(f, "Cannot find home directory"),
        }
    }
}

impl std::error::Error for PathError {}

/// Path resolution with an optional base directory override.
///
/// With a base directory every path lives under it, which is what tests and
/// portable installs use.
#[derive(Debug, Clone, Default)]
pub struct PickupPaths {
    base: Option<PathBuf>,
}

impl PickupPaths {
    pub fn new(base: Option<&Path>) -> Self {
        Self {
            base: base.map(Path::to_path_buf),
        }
    }

    /// Configuration directory (e.g. `~/.config/pickup/`).
    pub fn config_dir(&self) -> Result<PathBuf, PathError> {
        match &self.base {
            Some(base) => Ok(base.clone()),
            None => dirs::config_dir()
                .map(|dir| dir.join(APP_DIR))
                .ok_or(PathError::HomeDirNotFound),
        }
    }

    /// Data directory (e.g. `~/.local/share/pickup/`).
    pub fn data_dir(&self) -> Result<PathBuf, PathError> {
        match &self.base {
            Some(base) => Ok(base.join("data")),
            None => dirs::data_dir()
                .map(|dir| dir.join(APP_DIR))
                .ok_or(PathError::HomeDirNotFound),
        }
    }

    pub fn config_file(&self) -> Result<PathBuf, PathError> {
        Ok(self.config_dir()?.join("config.toml"))
    }
}
