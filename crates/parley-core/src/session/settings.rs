//! Generation settings carried by a session.

use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Blocking threshold applied by the completion service's safety filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SafetyThreshold {
    /// Most permissive setting
    BlockNone,
    BlockOnlyHigh,
    #[default]
    BlockMediumAndAbove,
    BlockLowAndAbove,
}

/// Safety filter configuration, one threshold per harm category.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct SafetySettings {
    #[serde(default)]
    pub harassment: SafetyThreshold,
    #[serde(default)]
    pub hate_speech: SafetyThreshold,
    #[serde(default)]
    pub sexually_explicit: SafetyThreshold,
    #[serde(default)]
    pub dangerous_content: SafetyThreshold,
}

impl SafetySettings {
    /// Every category at `BlockNone`.
    pub fn permissive() -> Self {
        Self {
            harassment: SafetyThreshold::BlockNone,
            hate_speech: SafetyThreshold::BlockNone,
            sexually_explicit: SafetyThreshold::BlockNone,
            dangerous_content: SafetyThreshold::BlockNone,
        }
    }
}

/// Per-session generation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GenerationSettings {
    /// Session-wide system instruction
    #[serde(default)]
    pub system_instruction: Option<String>,
    /// Guidance used when the service is asked to speak as the user
    #[serde(default)]
    pub user_persona_instruction: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub top_p: Option<f32>,
    #[serde(default)]
    pub top_k: Option<u32>,
    #[serde(default)]
    pub max_output_tokens: Option<u32>,
    #[serde(default)]
    pub safety: SafetySettings,
    /// Search grounding augmentation
    #[serde(default)]
    pub use_search: bool,
    /// URL-context augmentation
    #[serde(default)]
    pub use_url_context: bool,
}

impl GenerationSettings {
    /// Stable fingerprint used to key cached completion contexts.
    ///
    /// Two settings values with the same fingerprint produce the same request
    /// configuration. Floats are hashed by bit pattern.
    pub fn fingerprint(&self) -> String {
        let mut hasher = DefaultHasher::new();
        self.system_instruction.hash(&mut hasher);
        self.user_persona_instruction.hash(&mut hasher);
        self.temperature.map(f32::to_bits).hash(&mut hasher);
        self.top_p.map(f32::to_bits).hash(&mut hasher);
        self.top_k.hash(&mut hasher);
        self.max_output_tokens.hash(&mut hasher);
        self.safety.hash(&mut hasher);
        self.use_search.hash(&mut hasher);
        self.use_url_context.hash(&mut hasher);
        format!("{:016x}", hasher.finish())
    }

    /// Applies a sparse override on top of these settings.
    pub fn with_override(&self, overrides: &SettingsOverride) -> Self {
        let mut settings = self.clone();
        if let Some(safety) = &overrides.safety {
            settings.safety = safety.clone();
        }
        if let Some(use_search) = overrides.use_search {
            settings.use_search = use_search;
        }
        if let Some(use_url_context) = overrides.use_url_context {
            settings.use_url_context = use_url_context;
        }
        settings
    }
}

/// Sparse settings override applied to a single request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SettingsOverride {
    pub safety: Option<SafetySettings>,
    pub use_search: Option<bool>,
    pub use_url_context: Option<bool>,
}

impl SettingsOverride {
    /// The override used when the service imitates the user: permissive safety
    /// (when `permissive_safety` is set) and no search or URL augmentation.
    pub fn role_mimic(permissive_safety: bool) -> Self {
        Self {
            safety: permissive_safety.then(SafetySettings::permissive),
            use_search: Some(false),
            use_url_context: Some(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_stable() {
        let settings = GenerationSettings {
            temperature: Some(0.7),
            ..Default::default()
        };
        assert_eq!(settings.fingerprint(), settings.clone().fingerprint());
    }

    #[test]
    fn test_fingerprint_changes_with_settings() {
        let a = GenerationSettings::default();
        let b = GenerationSettings {
            use_search: true,
            ..Default::default()
        };
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_role_mimic_override() {
        let settings = GenerationSettings {
            use_search: true,
            use_url_context: true,
            ..Default::default()
        };
        let applied = settings.with_override(&SettingsOverride::role_mimic(true));
        assert!(!applied.use_search);
        assert!(!applied.use_url_context);
        assert_eq!(applied.safety, SafetySettings::permissive());

        let kept = settings.with_override(&SettingsOverride::role_mimic(false));
        assert_eq!(kept.safety, SafetySettings::default());
    }
}
