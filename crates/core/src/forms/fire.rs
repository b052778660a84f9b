//! Fire (NFIRS) incident form.

use super::{is_blank, to_strings, NarrativeForm};
use crate::constants::{EMERGENCY_TYPE_OPTIONS, FORM_TIMESTAMP_FORMAT, OTHER_EMERGENCY_TYPE};
use crate::settings::NarrativeSettings;
use crate::{pb, NarrativeError, NarrativeResult};
use chrono::NaiveDateTime;
use ezn_types::NarrativeKind;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FireForm {
    pub unit: String,
    pub emergency_type: String,
    /// Only used when `emergency_type` is `Other`.
    pub custom_emergency_type: String,
    pub additional_info: String,
}

impl FireForm {
    /// The emergency type as reported: the custom text when `Other` is selected.
    pub fn resolved_emergency_type(&self) -> &str {
        if self.emergency_type == OTHER_EMERGENCY_TYPE {
            self.custom_emergency_type.trim()
        } else {
            self.emergency_type.trim()
        }
    }

    /// Incident data sent to the language model.
    pub fn incident_data(&self) -> serde_json::Value {
        json!({
            "unit": self.unit,
            "emergency_type": self.resolved_emergency_type(),
            "additional_info": self.additional_info,
        })
    }

    pub fn reset(&mut self, settings: &NarrativeSettings) {
        *self = Self {
            unit: settings.default_unit.clone(),
            ..Self::default()
        };
    }

    /// Sample structure-fire call. The unit is the saved default unit, possibly empty.
    pub fn prefill(settings: &NarrativeSettings) -> Self {
        Self {
            unit: settings.default_unit.clone(),
            emergency_type: "Structure Fire".to_string(),
            custom_emergency_type: String::new(),
            additional_info: "Standard fire protocols followed.".to_string(),
        }
    }

    pub fn options() -> pb::FireFormOptions {
        pb::FireFormOptions {
            emergency_types: to_strings(EMERGENCY_TYPE_OPTIONS),
        }
    }
}

impl NarrativeForm for FireForm {
    const KIND: NarrativeKind = NarrativeKind::Fire;

    fn validate(&self) -> NarrativeResult<()> {
        if is_blank(&self.unit) {
            return Err(NarrativeError::validation("Please enter a unit."));
        }
        if is_blank(&self.emergency_type) {
            return Err(NarrativeError::validation(
                "Please select an emergency type.",
            ));
        }
        if self.emergency_type == OTHER_EMERGENCY_TYPE && is_blank(&self.custom_emergency_type) {
            return Err(NarrativeError::validation(
                "Please specify the emergency type.",
            ));
        }
        Ok(())
    }

    fn form_data(&self, now: NaiveDateTime) -> serde_json::Value {
        let mut data = self.incident_data();
        if let Some(obj) = data.as_object_mut() {
            obj.insert(
                "timestamp".into(),
                now.format(FORM_TIMESTAMP_FORMAT).to_string().into(),
            );
        }
        data
    }

    fn title_subject(&self) -> String {
        self.resolved_emergency_type().to_string()
    }
}

impl From<pb::FireForm> for FireForm {
    fn from(f: pb::FireForm) -> Self {
        Self {
            unit: f.unit,
            emergency_type: f.emergency_type,
            custom_emergency_type: f.custom_emergency_type,
            additional_info: f.additional_info,
        }
    }
}

impl From<FireForm> for pb::FireForm {
    fn from(f: FireForm) -> Self {
        pb::FireForm {
            unit: f.unit,
            emergency_type: f.emergency_type,
            custom_emergency_type: f.custom_emergency_type,
            additional_info: f.additional_info,
        }
    }
}
