//! EMS patient care report form.

use super::{is_blank, to_strings, toggle_membership, NarrativeForm};
use crate::constants::{
    gcs_score_options, ABNORMAL_VITAL_OPTIONS, FORMAT_TYPE_OPTIONS, FORM_TIMESTAMP_FORMAT,
    PERTINENT_NEGATIVE_OPTIONS, PUPILS_OPTIONS, RESPONSE_DELAY_OPTIONS, SEX_OPTIONS,
    TRANSPORT_POSITION_OPTIONS,
};
use crate::settings::NarrativeSettings;
use crate::{pb, NarrativeError, NarrativeResult};
use chrono::NaiveDateTime;
use ezn_types::NarrativeKind;
use serde::{Deserialize, Serialize};

/// All fields of the EMS form, grouped by form section.
///
/// Field order is the order used in the run data sent to the language model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmsForm {
    // dispatch
    pub unit: String,
    pub dispatch_reason: String,
    pub response_delay: String,
    pub response_delay_custom: String,

    // patient
    pub patient_sex: String,
    pub patient_age: String,
    pub chief_complaint: String,
    pub duration: String,
    pub patient_presentation: String,

    // assessment
    pub aao_person: bool,
    pub aao_place: bool,
    pub aao_time: bool,
    pub aao_event: bool,
    pub is_unresponsive: bool,
    pub gcs_score: String,
    pub pupils: String,
    pub selected_pertinent_negatives: Vec<String>,
    pub unable_to_obtain_negatives: bool,
    pub vital_signs_normal: bool,
    pub selected_abnormal_vitals: Vec<String>,
    pub all_other_vitals_normal: bool,
    pub dcap_btls: bool,
    pub additional_assessment: String,

    // treatment
    pub treatment_provided: String,
    pub add_protocol_treatments: bool,
    pub protocol_exclusions: String,

    // transport
    pub refused_transport: bool,
    pub refusal_details: String,
    pub transport_destination: String,
    pub transport_position: String,
    pub room_number: String,
    pub nurse_name: String,
    pub unit_in_service: bool,

    // format options
    pub format_type: String,
    pub use_abbreviations: bool,
    pub include_headers: bool,
    pub default_unit: String,
    pub default_hospital: String,
    pub custom_format: String,
}

impl Default for EmsForm {
    fn default() -> Self {
        let format = NarrativeSettings::default();
        Self {
            unit: String::new(),
            dispatch_reason: String::new(),
            response_delay: "No response delays".to_string(),
            response_delay_custom: String::new(),

            patient_sex: String::new(),
            patient_age: String::new(),
            chief_complaint: String::new(),
            duration: String::new(),
            patient_presentation: String::new(),

            aao_person: true,
            aao_place: true,
            aao_time: true,
            aao_event: true,
            is_unresponsive: false,
            gcs_score: "15".to_string(),
            pupils: "PERRL".to_string(),
            selected_pertinent_negatives: Vec::new(),
            unable_to_obtain_negatives: false,
            vital_signs_normal: true,
            selected_abnormal_vitals: Vec::new(),
            all_other_vitals_normal: true,
            dcap_btls: true,
            additional_assessment: String::new(),

            treatment_provided: String::new(),
            add_protocol_treatments: false,
            protocol_exclusions: String::new(),

            refused_transport: false,
            refusal_details: String::new(),
            transport_destination: String::new(),
            transport_position: "Position of comfort".to_string(),
            room_number: String::new(),
            nurse_name: String::new(),
            unit_in_service: true,

            format_type: format.format_type,
            use_abbreviations: format.use_abbreviations,
            include_headers: format.include_headers,
            default_unit: format.default_unit,
            default_hospital: format.default_hospital,
            custom_format: format.custom_format,
        }
    }
}

impl EmsForm {
    /// A blank form seeded from the user's saved settings.
    pub fn with_settings(settings: &NarrativeSettings) -> Self {
        let mut form = Self::default();
        form.apply_settings(settings);
        form
    }

    /// Copy format settings into the form. Non-empty defaults also fill unit and destination.
    pub fn apply_settings(&mut self, settings: &NarrativeSettings) {
        self.format_type = settings.format_type.clone();
        self.use_abbreviations = settings.use_abbreviations;
        self.include_headers = settings.include_headers;
        self.default_unit = settings.default_unit.clone();
        self.default_hospital = settings.default_hospital.clone();
        self.custom_format = settings.custom_format.clone();

        if !self.default_unit.is_empty() {
            self.unit = self.default_unit.clone();
        }
        if !self.default_hospital.is_empty() {
            self.transport_destination = self.default_hospital.clone();
        }
    }

    /// Format settings currently carried by the form.
    pub fn narrative_settings(&self) -> NarrativeSettings {
        NarrativeSettings {
            format_type: self.format_type.clone(),
            use_abbreviations: self.use_abbreviations,
            include_headers: self.include_headers,
            default_unit: self.default_unit.clone(),
            default_hospital: self.default_hospital.clone(),
            custom_format: self.custom_format.clone(),
        }
    }

    /// Clear every incident field, keeping the format settings.
    pub fn reset(&mut self) {
        let settings = self.narrative_settings();
        *self = Self {
            unit: settings.default_unit.clone(),
            transport_destination: settings.default_hospital.clone(),
            ..Self::default()
        };
        self.format_type = settings.format_type;
        self.use_abbreviations = settings.use_abbreviations;
        self.include_headers = settings.include_headers;
        self.default_unit = settings.default_unit;
        self.default_hospital = settings.default_hospital;
        self.custom_format = settings.custom_format;
    }

    /// A sample chest-pain call used for demos and training.
    pub fn prefill(settings: &NarrativeSettings) -> Self {
        let mut form = Self::with_settings(settings);

        form.unit = non_empty_or(&settings.default_unit, "Medic 1");
        form.dispatch_reason = "123 Main St for chest pain".into();
        form.response_delay = "No response delays".into();
        form.response_delay_custom = String::new();
        form.patient_sex = "Male".into();
        form.patient_age = "65".into();
        form.chief_complaint = "Chest pain".into();
        form.duration = "30 minutes".into();
        form.patient_presentation = "Patient found sitting upright in chair, clutching chest, appears anxious and diaphoretic.".into();
        form.aao_person = true;
        form.aao_place = true;
        form.aao_time = true;
        form.aao_event = true;
        form.is_unresponsive = false;
        form.gcs_score = "15".into();
        form.pupils = "PERRL".into();
        form.selected_pertinent_negatives = vec!["Shortness of breath".into(), "Nausea".into()];
        form.unable_to_obtain_negatives = false;
        form.vital_signs_normal = false;
        form.selected_abnormal_vitals = vec!["Hypertensive".into(), "Tachycardic".into()];
        form.all_other_vitals_normal = true;
        form.dcap_btls = true;
        form.additional_assessment = "12-lead ECG shows ST elevation in leads II, III, aVF.".into();
        form.treatment_provided = "Administered 324mg aspirin PO, established IV access, administered 0.4mg nitroglycerin SL with relief of pain.".into();
        form.add_protocol_treatments = true;
        form.protocol_exclusions = "None".into();
        form.refused_transport = false;
        form.refusal_details = String::new();
        form.transport_destination = non_empty_or(&settings.default_hospital, "Memorial Hospital");
        form.transport_position = "Position of comfort".into();
        form.room_number = "4".into();
        form.nurse_name = "Johnson".into();
        form.unit_in_service = true;

        form
    }

    pub fn toggle_pertinent_negative(&mut self, value: &str) {
        toggle_membership(&mut self.selected_pertinent_negatives, value);
    }

    pub fn toggle_abnormal_vital(&mut self, value: &str) {
        toggle_membership(&mut self.selected_abnormal_vitals, value);
    }

    /// Text used to search the knowledge base for relevant protocols.
    pub fn knowledge_query(&self) -> String {
        format!(
            "{} {}",
            self.chief_complaint.trim(),
            self.additional_assessment.trim()
        )
        .trim()
        .to_string()
    }

    pub fn options() -> pb::EmsFormOptions {
        pb::EmsFormOptions {
            response_delays: to_strings(RESPONSE_DELAY_OPTIONS),
            sexes: to_strings(SEX_OPTIONS),
            gcs_scores: gcs_score_options(),
            pupils: to_strings(PUPILS_OPTIONS),
            pertinent_negatives: to_strings(PERTINENT_NEGATIVE_OPTIONS),
            abnormal_vitals: to_strings(ABNORMAL_VITAL_OPTIONS),
            transport_positions: to_strings(TRANSPORT_POSITION_OPTIONS),
            format_types: to_strings(FORMAT_TYPE_OPTIONS),
        }
    }
}

impl NarrativeForm for EmsForm {
    const KIND: NarrativeKind = NarrativeKind::Ems;

    fn validate(&self) -> NarrativeResult<()> {
        let required = [
            (&self.unit, "Please enter a unit."),
            (&self.dispatch_reason, "Please enter a dispatch reason."),
            (&self.patient_sex, "Please select a patient sex."),
            (&self.patient_age, "Please enter a patient age."),
            (&self.chief_complaint, "Please enter a chief complaint."),
        ];

        for (value, message) in required {
            if is_blank(value) {
                return Err(NarrativeError::validation(message));
            }
        }
        Ok(())
    }

    fn form_data(&self, now: NaiveDateTime) -> serde_json::Value {
        let mut data = match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        };
        data.insert(
            "timestamp".into(),
            now.format(FORM_TIMESTAMP_FORMAT).to_string().into(),
        );
        serde_json::Value::Object(data)
    }

    fn title_subject(&self) -> String {
        self.chief_complaint.trim().to_string()
    }
}

fn non_empty_or(value: &str, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}

impl From<pb::EmsForm> for EmsForm {
    fn from(f: pb::EmsForm) -> Self {
        let d = EmsForm::default();
        Self {
            unit: f.unit,
            dispatch_reason: f.dispatch_reason,
            response_delay: non_empty_or(&f.response_delay, &d.response_delay),
            response_delay_custom: f.response_delay_custom,
            patient_sex: f.patient_sex,
            patient_age: f.patient_age,
            chief_complaint: f.chief_complaint,
            duration: f.duration,
            patient_presentation: f.patient_presentation,
            aao_person: f.aao_person.unwrap_or(d.aao_person),
            aao_place: f.aao_place.unwrap_or(d.aao_place),
            aao_time: f.aao_time.unwrap_or(d.aao_time),
            aao_event: f.aao_event.unwrap_or(d.aao_event),
            is_unresponsive: f.is_unresponsive.unwrap_or(d.is_unresponsive),
            gcs_score: non_empty_or(&f.gcs_score, &d.gcs_score),
            pupils: non_empty_or(&f.pupils, &d.pupils),
            selected_pertinent_negatives: f.selected_pertinent_negatives,
            unable_to_obtain_negatives: f
                .unable_to_obtain_negatives
                .unwrap_or(d.unable_to_obtain_negatives),
            vital_signs_normal: f.vital_signs_normal.unwrap_or(d.vital_signs_normal),
            selected_abnormal_vitals: f.selected_abnormal_vitals,
            all_other_vitals_normal: f
                .all_other_vitals_normal
                .unwrap_or(d.all_other_vitals_normal),
            dcap_btls: f.dcap_btls.unwrap_or(d.dcap_btls),
            additional_assessment: f.additional_assessment,
            treatment_provided: f.treatment_provided,
            add_protocol_treatments: f
                .add_protocol_treatments
                .unwrap_or(d.add_protocol_treatments),
            protocol_exclusions: f.protocol_exclusions,
            refused_transport: f.refused_transport.unwrap_or(d.refused_transport),
            refusal_details: f.refusal_details,
            transport_destination: f.transport_destination,
            transport_position: non_empty_or(&f.transport_position, &d.transport_position),
            room_number: f.room_number,
            nurse_name: f.nurse_name,
            unit_in_service: f.unit_in_service.unwrap_or(d.unit_in_service),
            format_type: non_empty_or(&f.format_type, &d.format_type),
            use_abbreviations: f.use_abbreviations.unwrap_or(d.use_abbreviations),
            include_headers: f.include_headers.unwrap_or(d.include_headers),
            default_unit: f.default_unit,
            default_hospital: f.default_hospital,
            custom_format: f.custom_format,
        }
    }
}

impl From<EmsForm> for pb::EmsForm {
    fn from(f: EmsForm) -> Self {
        pb::EmsForm {
            unit: f.unit,
            dispatch_reason: f.dispatch_reason,
            response_delay: f.response_delay,
            response_delay_custom: f.response_delay_custom,
            patient_sex: f.patient_sex,
            patient_age: f.patient_age,
            chief_complaint: f.chief_complaint,
            duration: f.duration,
            patient_presentation: f.patient_presentation,
            aao_person: Some(f.aao_person),
            aao_place: Some(f.aao_place),
            aao_time: Some(f.aao_time),
            aao_event: Some(f.aao_event),
            is_unresponsive: Some(f.is_unresponsive),
            gcs_score: f.gcs_score,
            pupils: f.pupils,
            selected_pertinent_negatives: f.selected_pertinent_negatives,
            unable_to_obtain_negatives: Some(f.unable_to_obtain_negatives),
            vital_signs_normal: Some(f.vital_signs_normal),
            selected_abnormal_vitals: f.selected_abnormal_vitals,
            all_other_vitals_normal: Some(f.all_other_vitals_normal),
            dcap_btls: Some(f.dcap_btls),
            additional_assessment: f.additional_assessment,
            treatment_provided: f.treatment_provided,
            add_protocol_treatments: Some(f.add_protocol_treatments),
            protocol_exclusions: f.protocol_exclusions,
            refused_transport: Some(f.refused_transport),
            refusal_details: f.refusal_details,
            transport_destination: f.transport_destination,
            transport_position: f.transport_position,
            room_number: f.room_number,
            nurse_name: f.nurse_name,
            unit_in_service: Some(f.unit_in_service),
            format_type: f.format_type,
            use_abbreviations: Some(f.use_abbreviations),
            include_headers: Some(f.include_headers),
            default_unit: f.default_unit,
            default_hospital: f.default_hospital,
            custom_format: f.custom_format,
        }
    }
}
