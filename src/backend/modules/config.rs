//! Loader configuration (`config.toml`).
//!
//! ```toml
//! extension = ".sx"
//! default_root = "."
//! repositories = [
//!     "file:/usr/share/scriptmods",
//!     "jar:file:/opt/plugins/geo.jar!/modules",
//! ]
//! ```
//!
//! `repositories` are appended after the default directory, both when the
//! loader is built and after every reset.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use super::error::{LoadResult, ModuleError};
use super::locator::DEFAULT_EXTENSION;

/// Environment variable naming an explicit configuration file.
pub const CONFIG_ENV_VAR: &str = "SCRIPTMODS_CONFIG";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoaderConfig {
    /// Extension tried when an id has none.
    pub extension: String,
    /// Root of the default directory locator.
    pub default_root: PathBuf,
    /// Repository descriptors registered after the default locator.
    pub repositories: Vec<String>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            extension: DEFAULT_EXTENSION.to_string(),
            default_root: PathBuf::from("."),
            repositories: Vec::new(),
        }
    }
}

impl LoaderConfig {
    /// Parse a configuration from TOML content.
    pub fn parse_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load a configuration file.
    pub fn load(path: &Path) -> LoadResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ModuleError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::parse_toml(&content).map_err(|e| ModuleError::Config {
            path: path.to_path_buf(),
            message: e.message().to_string(),
        })
    }

    /// The per-user configuration file location.
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("scriptmods").join("config.toml"))
    }

    /// Locate and load the active configuration.
    ///
    /// `$SCRIPTMODS_CONFIG` wins when set; otherwise the per-user file is
    /// used if it exists. Falls back to defaults.
    pub fn discover() -> LoadResult<Self> {
        if let Some(path) = std::env::var_os(CONFIG_ENV_VAR) {
            debug!(path = ?path, "loading configuration from environment");
            return Self::load(Path::new(&path));
        }
        match Self::user_config_path() {
            Some(path) if path.is_file() => {
                debug!(path = %path.display(), "loading user configuration");
                Self::load(&path)
            }
            _ => Ok(Self::default()),
        }
    }
}
