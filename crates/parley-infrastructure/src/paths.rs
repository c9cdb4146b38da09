//! Unified path management for parley files.
//!
//! ```text
//! ~/.config/parley/           # Config directory
//! ├── config.toml             # Application configuration
//! ├── sessions/               # One TOML file per session
//! └── logs/                   # Daily-rolling application logs
//! ```

use parley_core::{ParleyError, Result};
use std::path::PathBuf;

pub struct ParleyPaths;

impl ParleyPaths {
    /// Returns the parley configuration directory (e.g., `~/.config/parley/`).
    pub fn config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("parley"))
            .ok_or_else(|| ParleyError::config("Cannot find configuration directory"))
    }

    /// Returns the path to the main configuration file.
    pub fn config_file() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Returns the default sessions directory.
    pub fn sessions_dir() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("sessions"))
    }

    /// Returns the default log directory.
    pub fn logs_dir() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("logs"))
    }
}
