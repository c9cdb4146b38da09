//! Configuration loading.
//!
//! Reads `~/.config/parley/config.toml` and fills missing values from defaults.

use crate::paths::ParleyPaths;
use parley_core::Result;
use parley_core::config::ParleyConfig;
use std::fs;
use std::path::{Path, PathBuf};

/// Loads the root configuration from a TOML file.
#[derive(Debug, Clone)]
pub struct ConfigService {
    path: PathBuf,
}

impl ConfigService {
    /// Creates a service reading the given file.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Creates a service reading the platform default location.
    pub fn default_location() -> Result<Self> {
        Ok(Self::with_path(ParleyPaths::config_file()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the configuration.
    ///
    /// A missing file yields the defaults. An unreadable or malformed file is
    /// an error rather than a silent fallback.
    pub fn load(&self) -> Result<ParleyConfig> {
        if !self.path.exists() {
            tracing::debug!(
                "[ConfigService] No config at {}, using defaults",
                self.path.display()
            );
            return Ok(ParleyConfig::default());
        }

        let content = fs::read_to_string(&self.path)?;
        let config = ParleyConfig::from_toml_str(&content).map_err(|e| {
            parley_core::ParleyError::config(format!(
                "Failed to parse {}: {}",
                self.path.display(),
                e
            ))
        })?;

        tracing::debug!("[ConfigService] Loaded config from {}", self.path.display());
        Ok(config)
    }

    /// Resolves the sessions directory, honouring `storage.sessions_dir`.
    pub fn sessions_dir(config: &ParleyConfig) -> Result<PathBuf> {
        match &config.storage.sessions_dir {
            Some(dir) => Ok(dir.clone()),
            None => ParleyPaths::sessions_dir(),
        }
    }
}
