//! Manager configuration, read from `sitegate.toml`.
//!
//! ```toml
//! backend = "memory"
//! debug = false
//! default_ladder = "default"
//! # max_resolution_depth = 32
//!
//! [site_inheritance]
//! "blog.example.com" = ["example.com"]
//! ```

use serde::{Deserialize, Serialize};
use sitegate_store::{SiteInheritance, MEMORY_BACKEND};
use std::path::Path;
use thiserror::Error;
use tracing::info;

/// Conventional configuration file name.
pub const CONFIG_FILE: &str = "sitegate.toml";

/// Rank ladder used when a group does not name one.
pub const DEFAULT_LADDER: &str = "default";

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration could not be read or is invalid.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Name of the backend to construct through the registry.
    pub backend: String,
    /// Extra resolution logging. Never changes results.
    pub debug: bool,
    /// Upper bound on inheritance depth. Defaults to the number of known
    /// groups plus one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_resolution_depth: Option<usize>,
    pub default_ladder: String,
    /// Seeds site inheritance for sites the backend has no entry for.
    pub site_inheritance: SiteInheritance,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            backend: MEMORY_BACKEND.to_string(),
            debug: false,
            max_resolution_depth: None,
            default_ladder: DEFAULT_LADDER.to_string(),
            site_inheritance: SiteInheritance::new(),
        }
    }
}

impl ManagerConfig {
    /// Loads configuration from a TOML file.
    ///
    /// A missing file yields the defaults; an unreadable or malformed file
    /// is an error.
    pub fn load_from(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!(path = %path.display(), "No config file found, using defaults");
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&contents)?;
        info!(path = %path.display(), backend = %config.backend, "Loaded manager config");
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.backend.trim().is_empty() {
            return Err(ConfigError::Invalid("backend name must not be empty".into()));
        }
        if self.default_ladder.trim().is_empty() {
            return Err(ConfigError::Invalid("default_ladder must not be empty".into()));
        }
        if self.max_resolution_depth == Some(0) {
            return Err(ConfigError::Invalid(
                "max_resolution_depth must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
