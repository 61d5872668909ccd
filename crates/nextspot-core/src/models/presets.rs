use serde::{Deserialize, Serialize};

/// Canned prompt offered by the presentation layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresetPrompt {
    pub id: String,
    pub label: String,
    pub prompt: String,
    /// Premium presets require an active subscription
    #[serde(default)]
    pub premium: bool,
}

impl PresetPrompt {
    fn new(id: &str, label: &str, prompt: &str, premium: bool) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            prompt: prompt.to_string(),
            premium,
        }
    }
}

pub fn default_presets() -> Vec<PresetPrompt> {
    vec![
        PresetPrompt::new(
            "summarize",
            "Session Summary",
            "Summarize the key findings of this session so far as a short bulleted list.",
            false,
        ),
        PresetPrompt::new(
            "explain-log",
            "Explain Log Entry",
            "Explain the most recent log excerpt I shared: what component produced it, \
             what it indicates, and whether it needs follow-up.",
            false,
        ),
        PresetPrompt::new(
            "hardening",
            "Hardening Checklist",
            "Produce a prioritized hardening checklist for the systems discussed in this session.",
            false,
        ),
        PresetPrompt::new(
            "report",
            "Engagement Report",
            "Generate a comprehensive, executive-ready engagement report in Markdown from this \
             session, including findings, severity ratings and remediation steps.",
            true,
        ),
        PresetPrompt::new(
            "threat-model",
            "Threat Model Review",
            "Review the architecture described in this session and produce a threat model \
             listing assets, trust boundaries, likely attack paths and mitigations.",
            true,
        ),
        PresetPrompt::new(
            "detections",
            "Detection Engineering",
            "Propose detection rules and log sources that would surface the activity discussed \
             in this session, with expected false-positive sources for each.",
            true,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_default_presets_have_unique_ids() {
        let presets = default_presets();
        let ids: HashSet<_> = presets.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids.len(), presets.len());
    }

    #[test]
    fn test_default_presets_mix_standard_and_premium() {
        let presets = default_presets();
        assert!(presets.iter().any(|p| p.premium));
        assert!(presets.iter().any(|p| !p.premium));
    }

    #[test]
    fn test_premium_defaults_to_false_when_missing() {
        let preset: PresetPrompt =
            serde_json::from_str(r#"{"id":"x","label":"X","prompt":"do x"}"#).unwrap();
        assert!(!preset.premium);
    }
}
