//! Per-user narrative and display settings.
//!
//! Settings are stored in the auth user's metadata under `settings`. Updates merge: only
//! the fields present in an update change.

use crate::pb;
use serde::{Deserialize, Serialize};

/// Narrative format preferences that also seed the EMS form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrativeSettings {
    pub format_type: String,
    pub use_abbreviations: bool,
    pub include_headers: bool,
    pub default_unit: String,
    pub default_hospital: String,
    pub custom_format: String,
}

impl Default for NarrativeSettings {
    fn default() -> Self {
        Self {
            format_type: "D.R.A.T.T.".to_string(),
            use_abbreviations: true,
            include_headers: true,
            default_unit: String::new(),
            default_hospital: String::new(),
            custom_format: String::new(),
        }
    }
}

impl NarrativeSettings {
    pub fn merge(&mut self, patch: &pb::NarrativeSettings) {
        if let Some(v) = &patch.format_type {
            self.format_type = v.clone();
        }
        if let Some(v) = patch.use_abbreviations {
            self.use_abbreviations = v;
        }
        if let Some(v) = patch.include_headers {
            self.include_headers = v;
        }
        if let Some(v) = &patch.default_unit {
            self.default_unit = v.clone();
        }
        if let Some(v) = &patch.default_hospital {
            self.default_hospital = v.clone();
        }
        if let Some(v) = &patch.custom_format {
            self.custom_format = v.clone();
        }
    }
}

/// Everything saved on the settings page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserSettings {
    pub narrative: NarrativeSettings,
    pub dark_mode: bool,
    pub font_size: String,
    pub email_notifications: bool,
    pub push_notifications: bool,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            narrative: NarrativeSettings::default(),
            dark_mode: false,
            font_size: "Medium".to_string(),
            email_notifications: true,
            push_notifications: true,
        }
    }
}

impl UserSettings {
    /// Read settings out of auth user metadata, using defaults for anything missing.
    ///
    /// Unreadable stored settings are logged and replaced by defaults rather than failing the
    /// request.
    pub fn from_metadata(metadata: &serde_json::Value) -> Self {
        match metadata.get(crate::constants::SETTINGS_METADATA_KEY) {
            Some(value) if !value.is_null() => serde_json::from_value(value.clone())
                .unwrap_or_else(|e| {
                    tracing::warn!("stored settings could not be parsed, using defaults: {e}");
                    Self::default()
                }),
            _ => Self::default(),
        }
    }

    pub fn merge(&mut self, patch: &pb::UserSettings) {
        if let Some(narrative) = &patch.narrative {
            self.narrative.merge(narrative);
        }
        if let Some(v) = patch.dark_mode {
            self.dark_mode = v;
        }
        if let Some(v) = &patch.font_size {
            self.font_size = v.clone();
        }
        if let Some(v) = patch.email_notifications {
            self.email_notifications = v;
        }
        if let Some(v) = patch.push_notifications {
            self.push_notifications = v;
        }
    }
}

impl From<NarrativeSettings> for pb::NarrativeSettings {
    fn from(s: NarrativeSettings) -> Self {
        pb::NarrativeSettings {
            format_type: Some(s.format_type),
            use_abbreviations: Some(s.use_abbreviations),
            include_headers: Some(s.include_headers),
            default_unit: Some(s.default_unit),
            default_hospital: Some(s.default_hospital),
            custom_format: Some(s.custom_format),
        }
    }
}

impl From<UserSettings> for pb::UserSettings {
    fn from(s: UserSettings) -> Self {
        pb::UserSettings {
            narrative: Some(s.narrative.into()),
            dark_mode: Some(s.dark_mode),
            font_size: Some(s.font_size),
            email_notifications: Some(s.email_notifications),
            push_notifications: Some(s.push_notifications),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_match_settings_page() {
        let s = UserSettings::default();
        assert_eq!(s.narrative.format_type, "D.R.A.T.T.");
        assert!(s.narrative.use_abbreviations);
        assert!(s.narrative.include_headers);
        assert_eq!(s.font_size, "Medium");
        assert!(!s.dark_mode);
        assert!(s.email_notifications && s.push_notifications);
    }

    #[test]
    fn from_metadata_fills_missing_fields() {
        let metadata = json!({
            "full_name": "Pat Medic",
            "settings": { "dark_mode": true, "narrative": { "default_unit": "Medic 7" } }
        });
        let s = UserSettings::from_metadata(&metadata);
        assert!(s.dark_mode);
        assert_eq!(s.narrative.default_unit, "Medic 7");
        assert_eq!(s.narrative.format_type, "D.R.A.T.T.");
    }

    #[test]
    fn from_metadata_without_settings_uses_defaults() {
        assert_eq!(
            UserSettings::from_metadata(&json!({})),
            UserSettings::default()
        );
        assert_eq!(
            UserSettings::from_metadata(&json!({ "settings": "garbage" })),
            UserSettings::default()
        );
    }

    #[test]
    fn merge_only_changes_provided_fields() {
        let mut s = UserSettings::default();
        s.merge(&pb::UserSettings {
            narrative: Some(pb::NarrativeSettings {
                format_type: Some("S.O.A.P.".into()),
                default_hospital: Some("Mercy".into()),
                ..Default::default()
            }),
            font_size: Some("Large".into()),
            ..Default::default()
        });

        assert_eq!(s.narrative.format_type, "S.O.A.P.");
        assert_eq!(s.narrative.default_hospital, "Mercy");
        assert!(s.narrative.use_abbreviations);
        assert_eq!(s.font_size, "Large");
        assert!(s.email_notifications);
    }

    #[test]
    fn merge_can_clear_a_default() {
        let mut s = NarrativeSettings {
            default_unit: "Medic 1".into(),
            ..Default::default()
        };
        s.merge(&pb::NarrativeSettings {
            default_unit: Some(String::new()),
            ..Default::default()
        });
        assert_eq!(s.default_unit, "");
    }
}
