//! Incident forms that feed narrative generation.
//!
//! Each form owns its defaults, required-field validation and the JSON snapshot that is sent
//! to the language model and stored alongside the generated narrative.

pub mod ems;
pub mod fire;

pub use ems::EmsForm;
pub use fire::FireForm;

use crate::constants::TITLE_TIMESTAMP_FORMAT;
use crate::NarrativeResult;
use chrono::NaiveDateTime;
use ezn_types::NarrativeKind;

/// Common behaviour the narrative service needs from a form.
pub trait NarrativeForm {
    const KIND: NarrativeKind;

    /// Check required fields in display order; the first missing field wins.
    fn validate(&self) -> NarrativeResult<()>;

    /// Snapshot stored with the narrative, stamped with `now`.
    fn form_data(&self, now: NaiveDateTime) -> serde_json::Value;

    /// The part of the title that identifies the incident.
    fn title_subject(&self) -> String;

    fn title(&self, now: NaiveDateTime) -> String {
        narrative_title(Self::KIND, &self.title_subject(), now)
    }
}

/// `EMS Narrative - Chest pain - 2025-03-04 14:15`
pub fn narrative_title(kind: NarrativeKind, subject: &str, now: NaiveDateTime) -> String {
    format!(
        "{} Narrative - {} - {}",
        kind.label(),
        subject.trim(),
        now.format(TITLE_TIMESTAMP_FORMAT)
    )
}

pub(crate) fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Add `value` if absent, remove it if present. Order of the remaining entries is kept.
pub(crate) fn toggle_membership(values: &mut Vec<String>, value: &str) {
    if let Some(pos) = values.iter().position(|v| v == value) {
        values.remove(pos);
    } else {
        values.push(value.to_string());
    }
}

pub(crate) fn to_strings(options: &[&str]) -> Vec<String> {
    options.iter().map(|o| o.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn title_uses_kind_label_and_minute_precision() {
        let now = NaiveDate::from_ymd_opt(2025, 3, 4)
            .unwrap()
            .and_hms_opt(14, 15, 59)
            .unwrap();
        assert_eq!(
            narrative_title(NarrativeKind::Fire, "Brush Fire", now),
            "Fire Narrative - Brush Fire - 2025-03-04 14:15"
        );
    }

    #[test]
    fn toggle_membership_preserves_order() {
        let mut values = vec!["Nausea".to_string()];
        toggle_membership(&mut values, "Headache");
        toggle_membership(&mut values, "Dizziness");
        toggle_membership(&mut values, "Headache");
        assert_eq!(values, vec!["Nausea", "Dizziness"]);
    }
}
