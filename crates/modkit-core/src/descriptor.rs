//! Module descriptors: the metadata every module declares about itself.
//!
//! A descriptor is produced once by a module's metadata accessor during
//! discovery and treated as immutable afterwards.  A module reload replaces
//! the descriptor wholesale; nothing mutates it field by field.

use serde::{Deserialize, Serialize};

use crate::settings::{SettingValue, SettingsMap};

/// The unique string key a module is referenced by across the settings
/// table, the running set, and the hotkey binding table.
pub type ModuleId = String;

/// The distinguished category marking internal "system" modules.
///
/// System modules carry host-wide configuration only; they are never
/// toggleable end-user automations and get no synthesized `enabled` flag.
pub const SYSTEM_CATEGORY: &str = "system";

/// One declared setting: key, default value, and a human-readable blurb the
/// UI shows next to the input field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingSpec {
    pub key: String,
    pub default: SettingValue,
    #[serde(default)]
    pub description: String,
}

impl SettingSpec {
    pub fn new(
        key: impl Into<String>,
        default: impl Into<SettingValue>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            default: default.into(),
            description: description.into(),
        }
    }
}

/// Immutable metadata a module declares via its metadata accessor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    /// Explicit identity override.  When absent, the host derives the
    /// identity from the discovery unit name (see [`normalized_identity`]).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
    /// Name shown in the UI dashboard.
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    /// Category tag; [`SYSTEM_CATEGORY`] marks internal modules.
    pub category: String,
    /// Declared setting schema, in declaration order.
    #[serde(default)]
    pub settings: Vec<SettingSpec>,
    /// Whether the module exposes a blocking calibration routine.
    #[serde(default)]
    pub has_calibration: bool,
    /// Whether the module distinguishes an engaged/disengaged state driven
    /// by a global hotkey, separate from running/stopped.
    #[serde(default)]
    pub has_hotkey_toggle: bool,
}

impl ModuleDescriptor {
    pub fn is_system(&self) -> bool {
        self.category == SYSTEM_CATEGORY
    }

    /// Resolves the identity this module is keyed by: the explicit override
    /// when declared and non-empty, otherwise the normalized unit name.
    pub fn resolve_identity(&self, unit_name: &str) -> ModuleId {
        match &self.identity {
            Some(id) if !id.is_empty() => id.clone(),
            _ => normalized_identity(unit_name),
        }
    }

    /// Whether `key` appears in the declared schema.
    pub fn declares(&self, key: &str) -> bool {
        self.settings.iter().any(|s| s.key == key)
    }

    /// Builds the default settings map from the declared schema.
    pub fn default_settings(&self) -> SettingsMap {
        self.settings
            .iter()
            .map(|s| (s.key.clone(), s.default.clone()))
            .collect()
    }
}

/// Derives a module identity from a discovery unit name: lowercased, with
/// spaces collapsed to underscores.
pub fn normalized_identity(unit_name: &str) -> ModuleId {
    unit_name.trim().to_lowercase().replace(' ', "_")
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn make_descriptor() -> ModuleDescriptor {
        ModuleDescriptor {
            identity: None,
            display_name: "Auto Clicker".to_string(),
            description: "Paced synthetic clicks.".to_string(),
            category: "input".to_string(),
            settings: vec![
                SettingSpec::new("hotkey", "f4", "Toggle hotkey"),
                SettingSpec::new("threshold", 0.9, "Match threshold"),
            ],
            has_calibration: true,
            has_hotkey_toggle: true,
        }
    }

    #[test]
    fn test_resolve_identity_prefers_explicit_override() {
        let mut d = make_descriptor();
        d.identity = Some("clicker".to_string());
        assert_eq!(d.resolve_identity("Auto Clicker"), "clicker");
    }

    #[test]
    fn test_resolve_identity_falls_back_to_normalized_unit_name() {
        let d = make_descriptor();
        assert_eq!(d.resolve_identity("Auto Clicker"), "auto_clicker");
    }

    #[test]
    fn test_resolve_identity_ignores_empty_override() {
        let mut d = make_descriptor();
        d.identity = Some(String::new());
        assert_eq!(d.resolve_identity("Auto Clicker"), "auto_clicker");
    }

    #[test]
    fn test_default_settings_carries_schema_defaults() {
        let d = make_descriptor();
        let defaults = d.default_settings();
        assert_eq!(defaults.get("hotkey"), Some(&SettingValue::Text("f4".into())));
        assert_eq!(defaults.get("threshold"), Some(&SettingValue::Float(0.9)));
        assert_eq!(defaults.len(), 2);
    }

    #[test]
    fn test_declares_checks_schema_membership() {
        let d = make_descriptor();
        assert!(d.declares("hotkey"));
        assert!(!d.declares("enabled"));
    }

    #[test]
    fn test_is_system_only_for_system_category() {
        let mut d = make_descriptor();
        assert!(!d.is_system());
        d.category = SYSTEM_CATEGORY.to_string();
        assert!(d.is_system());
    }

    #[test]
    fn test_normalized_identity_lowercases_and_underscores() {
        assert_eq!(normalized_identity("  Crystal Aura "), "crystal_aura");
        assert_eq!(normalized_identity("config"), "config");
    }
}
