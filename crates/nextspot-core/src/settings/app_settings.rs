use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::models::{PresetPrompt, SessionConfig, default_presets};
use crate::services::gemini_client::DEFAULT_BASE_URL;
use crate::services::{AttachmentPolicy, ModelCatalog};

/// Persisted application settings. Missing fields take their defaults.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Environment variable holding the API key. The key itself is never stored.
    pub api_key_env: String,
    pub base_url: String,
    pub models: ModelCatalog,
    /// Initial session configuration. The subscription flag is not part of it.
    pub session: SessionConfig,
    pub attachments: AttachmentPolicy,
    /// Fail a reply when no chunk arrives for this long. Unset or 0 disables it.
    pub chunk_timeout_secs: Option<u64>,
    pub presets: Vec<PresetPrompt>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            api_key_env: "GEMINI_API_KEY".to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            models: ModelCatalog::default(),
            session: SessionConfig::default(),
            attachments: AttachmentPolicy::default(),
            chunk_timeout_secs: None,
            presets: default_presets(),
        }
    }
}

impl AppSettings {
    pub fn chunk_timeout(&self) -> Option<Duration> {
        self.chunk_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    /// API key from the configured environment variable, if set and non-empty
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ModelTier, Persona, TacticalPhase};

    #[test]
    fn test_partial_json_keeps_defaults() {
        let settings: AppSettings = serde_json::from_str(
            r#"{
                "models": {"fast": "gemini-custom-flash"},
                "session": {"persona": "blue_team", "use_search": true},
                "chunk_timeout_secs": 30
            }"#,
        )
        .unwrap();

        assert_eq!(settings.models.fast, "gemini-custom-flash");
        assert_eq!(settings.models.advanced, ModelCatalog::default().advanced);
        assert_eq!(settings.session.persona, Persona::BlueTeam);
        assert_eq!(settings.session.phase, TacticalPhase::Execution);
        assert_eq!(settings.session.model, ModelTier::Fast);
        assert!(settings.session.use_search);
        assert_eq!(settings.chunk_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(settings.api_key_env, "GEMINI_API_KEY");
        assert_eq!(settings.presets, default_presets());
    }

    #[test]
    fn test_subscription_flag_is_never_persisted() {
        let mut settings = AppSettings::default();
        settings.session.is_subscribed = true;

        let json = serde_json::to_string(&settings).unwrap();
        assert!(!json.contains("is_subscribed"));

        let loaded: AppSettings =
            serde_json::from_str(r#"{"session": {"is_subscribed": true}}"#).unwrap();
        assert!(!loaded.session.is_subscribed);
    }

    #[test]
    fn test_zero_timeout_disables_it() {
        let settings = AppSettings {
            chunk_timeout_secs: Some(0),
            ..AppSettings::default()
        };
        assert_eq!(settings.chunk_timeout(), None);
        assert_eq!(AppSettings::default().chunk_timeout(), None);
    }

    #[test]
    fn test_api_key_from_named_variable() {
        let settings = AppSettings {
            api_key_env: "NEXTSPOT_TEST_UNSET_KEY_VARIABLE".to_string(),
            ..AppSettings::default()
        };
        assert_eq!(settings.api_key(), None);
    }
}
