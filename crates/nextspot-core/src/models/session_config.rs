use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelTier {
    #[default]
    Fast,
    Advanced,
}

impl ModelTier {
    pub const ALL: [ModelTier; 2] = [ModelTier::Fast, ModelTier::Advanced];

    pub fn label(self) -> &'static str {
        match self {
            ModelTier::Fast => "Fast",
            ModelTier::Advanced => "Advanced",
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            ModelTier::Fast => "fast",
            ModelTier::Advanced => "advanced",
        }
    }

    /// Whether selecting this tier needs an active subscription
    pub fn requires_subscription(self) -> bool {
        matches!(self, ModelTier::Advanced)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Persona {
    General,
    #[default]
    RedTeam,
    ExploitDev,
    BlueTeam,
    BugBounty,
}

impl Persona {
    pub const ALL: [Persona; 5] = [
        Persona::General,
        Persona::RedTeam,
        Persona::ExploitDev,
        Persona::BlueTeam,
        Persona::BugBounty,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Persona::General => "Cybersecurity Lead",
            Persona::RedTeam => "Red Team Operator",
            Persona::ExploitDev => "Exploit Engineer",
            Persona::BlueTeam => "Defensive Architect",
            Persona::BugBounty => "Security Researcher",
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            Persona::General => "general",
            Persona::RedTeam => "red-team",
            Persona::ExploitDev => "exploit-dev",
            Persona::BlueTeam => "blue-team",
            Persona::BugBounty => "bug-bounty",
        }
    }
}

/// Engagement stage label used to frame the system instruction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TacticalPhase {
    Recon,
    Access,
    #[default]
    Execution,
    Persistence,
    Lateral,
    Exfil,
}

impl TacticalPhase {
    pub const ALL: [TacticalPhase; 6] = [
        TacticalPhase::Recon,
        TacticalPhase::Access,
        TacticalPhase::Execution,
        TacticalPhase::Persistence,
        TacticalPhase::Lateral,
        TacticalPhase::Exfil,
    ];

    pub fn label(self) -> &'static str {
        match self {
            TacticalPhase::Recon => "Reconnaissance",
            TacticalPhase::Access => "Initial Access",
            TacticalPhase::Execution => "Execution",
            TacticalPhase::Persistence => "Persistence",
            TacticalPhase::Lateral => "Lateral Movement",
            TacticalPhase::Exfil => "Exfiltration",
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            TacticalPhase::Recon => "recon",
            TacticalPhase::Access => "access",
            TacticalPhase::Execution => "execution",
            TacticalPhase::Persistence => "persistence",
            TacticalPhase::Lateral => "lateral",
            TacticalPhase::Exfil => "exfil",
        }
    }
}

macro_rules! impl_label_enum {
    ($ty:ident, $what:literal) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }

        impl FromStr for $ty {
            type Err = String;

            /// Accepts the slug or the display label, case-insensitively
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = s.trim();
                $ty::ALL
                    .into_iter()
                    .find(|v| {
                        v.slug().eq_ignore_ascii_case(wanted)
                            || v.label().eq_ignore_ascii_case(wanted)
                    })
                    .ok_or_else(|| {
                        let known: Vec<&str> = $ty::ALL.iter().map(|v| v.slug()).collect();
                        format!("unknown {} '{}' (expected one of: {})", $what, wanted, known.join(", "))
                    })
            }
        }
    };
}

impl_label_enum!(ModelTier, "model tier");
impl_label_enum!(Persona, "persona");
impl_label_enum!(TacticalPhase, "phase");

/// User-controlled session settings, read by the controller when a send starts.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub model: ModelTier,
    pub persona: Persona,
    pub phase: TacticalPhase,
    pub use_search: bool,
    /// Entitlement flag. Only `confirm_upgrade` sets it; never persisted.
    #[serde(skip)]
    pub is_subscribed: bool,
}

impl SessionConfig {
    /// Whether the current selection is allowed for the current entitlement
    pub fn is_entitled(&self) -> bool {
        self.is_subscribed || !self.model.requires_subscription()
    }
}

/// Partial update issued by the presentation layer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConfigPatch {
    pub model: Option<ModelTier>,
    pub persona: Option<Persona>,
    pub phase: Option<TacticalPhase>,
    pub use_search: Option<bool>,
}

impl ConfigPatch {
    pub fn model(model: ModelTier) -> Self {
        Self {
            model: Some(model),
            ..Self::default()
        }
    }

    pub fn persona(persona: Persona) -> Self {
        Self {
            persona: Some(persona),
            ..Self::default()
        }
    }

    pub fn phase(phase: TacticalPhase) -> Self {
        Self {
            phase: Some(phase),
            ..Self::default()
        }
    }

    pub fn use_search(enabled: bool) -> Self {
        Self {
            use_search: Some(enabled),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// True if applying this patch would select a gated tier
    pub fn needs_subscription(&self) -> bool {
        self.model.is_some_and(ModelTier::requires_subscription)
    }

    pub(crate) fn apply_to(&self, config: &mut SessionConfig) {
        if let Some(model) = self.model {
            config.model = model;
        }
        if let Some(persona) = self.persona {
            config.persona = persona;
        }
        if let Some(phase) = self.phase {
            config.phase = phase;
        }
        if let Some(use_search) = self.use_search {
            config.use_search = use_search;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_slug_and_label() {
        assert_eq!("red-team".parse::<Persona>(), Ok(Persona::RedTeam));
        assert_eq!("Defensive Architect".parse::<Persona>(), Ok(Persona::BlueTeam));
        assert_eq!("LATERAL".parse::<TacticalPhase>(), Ok(TacticalPhase::Lateral));
        assert_eq!(
            "initial access".parse::<TacticalPhase>(),
            Ok(TacticalPhase::Access)
        );
        assert_eq!("advanced".parse::<ModelTier>(), Ok(ModelTier::Advanced));
    }

    #[test]
    fn test_parse_unknown_lists_choices() {
        let err = "turbo".parse::<ModelTier>().unwrap_err();
        assert!(err.contains("fast, advanced"));
    }

    #[test]
    fn test_entitlement() {
        let mut config = SessionConfig::default();
        assert!(config.is_entitled());

        config.model = ModelTier::Advanced;
        assert!(!config.is_entitled());

        config.is_subscribed = true;
        assert!(config.is_entitled());
    }

    #[test]
    fn test_patch_applies_only_set_fields() {
        let mut config = SessionConfig::default();
        let patch = ConfigPatch {
            phase: Some(TacticalPhase::Recon),
            use_search: Some(true),
            ..ConfigPatch::default()
        };
        patch.apply_to(&mut config);

        assert_eq!(config.phase, TacticalPhase::Recon);
        assert!(config.use_search);
        assert_eq!(config.persona, Persona::RedTeam);
        assert_eq!(config.model, ModelTier::Fast);
        assert!(!patch.needs_subscription());
        assert!(ConfigPatch::model(ModelTier::Advanced).needs_subscription());
    }

    #[test]
    fn test_subscription_flag_not_serialized() {
        let config = SessionConfig {
            is_subscribed: true,
            ..SessionConfig::default()
        };
        let json = serde_json::to_value(&config).unwrap();
        assert!(json.get("is_subscribed").is_none());

        let restored: SessionConfig =
            serde_json::from_str(r#"{"model":"advanced","is_subscribed":true}"#).unwrap();
        assert_eq!(restored.model, ModelTier::Advanced);
        assert!(!restored.is_subscribed);
    }
}
