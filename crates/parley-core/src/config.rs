//! Configuration model.
//!
//! Every field has a default so a missing or partial `config.toml` is valid.

use crate::error::Result;
use crate::session::DEFAULT_SESSION_TITLE;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct ParleyConfig {
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub auto_send: AutoSendConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl ParleyConfig {
    /// Parses a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

/// Behaviour of the generation orchestrator.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct GenerationConfig {
    /// Title that marks a session as not yet named
    pub default_title: String,
    /// Maximum characters taken from the first prompt for the title
    pub title_max_chars: usize,
    /// Title used when the first message only carries attachments
    pub attachment_title: String,
    /// Content of the error message written when a stream ends without a result
    pub stream_failure_message: String,
    /// Force permissive safety filters when the service speaks as the user
    pub mimic_safety_override: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            default_title: DEFAULT_SESSION_TITLE.to_string(),
            title_max_chars: 35,
            attachment_title: "File Upload Chat".to_string(),
            stream_failure_message:
                "Error: Response processing failed or stream ended unexpectedly.".to_string(),
            mimic_safety_override: true,
        }
    }
}

/// Behaviour of the auto-send sequencer.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AutoSendConfig {
    /// Upper bound accepted for a run's repetitions
    pub max_repetitions: u32,
    /// Seconds counted down before an errored round is regenerated
    pub retry_countdown_secs: u32,
    /// Consecutive regenerations attempted for one errored round
    pub max_error_retries: u32,
}

impl Default for AutoSendConfig {
    fn default() -> Self {
        Self {
            max_repetitions: 100,
            retry_countdown_secs: 5,
            max_error_retries: 5,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
    /// Directory for daily-rolling log files
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            log_dir: None,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding one TOML file per session
    pub sessions_dir: Option<PathBuf>,
}
