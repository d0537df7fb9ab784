//! DICOM descriptive metadata reported by the enhancement worker.
//!
//! The worker sends raw tag values. They are turned into labelled,
//! display-ready strings exactly once, at ingest time, and stored in that
//! form. Existing rows and the dashboard depend on the exact output, so the
//! transforms below must not change.

use serde::{Deserialize, Serialize};

/// Metadata as sent by the worker (raw DICOM tag values).
///
/// Every field is required; a missing key fails deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawStudyMetadata {
    pub patient_name: String,
    #[serde(rename = "patientID")]
    pub patient_id: String,
    /// Compact `YYYYMMDD` form.
    pub patient_birth_date: String,
    /// DICOM sex code (`M`, `F`, `O`).
    pub patient_sex: String,
    pub study_description: String,
    /// Compact `YYYYMMDD` form.
    pub study_date: String,
    pub modality: String,
}

/// Labelled metadata as persisted and broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyMetadata {
    pub patient_name: String,
    #[serde(rename = "patientID")]
    pub patient_id: String,
    pub patient_birth_date: String,
    pub patient_sex: String,
    pub study_description: String,
    pub study_date: String,
    pub modality: String,
}

impl RawStudyMetadata {
    pub fn normalize(&self) -> StudyMetadata {
        let patient_name = if self.patient_name.is_empty() {
            "N/A".to_string()
        } else {
            self.patient_name.clone()
        };

        let sex = if self.patient_sex == "M" {
            "Male"
        } else {
            "Female"
        };

        // Only the first underscore is replaced.
        let description = self
            .study_description
            .strip_prefix("RT^")
            .unwrap_or(&self.study_description)
            .replacen('_', " ", 1);

        StudyMetadata {
            patient_name,
            patient_id: format!("Patient ID: {}", self.patient_id),
            patient_birth_date: labelled_date("Birth Date", &self.patient_birth_date),
            patient_sex: format!("Sex: {sex}"),
            study_description: format!("Study Description: {description}"),
            study_date: labelled_date("Study Date", &self.study_date),
            modality: format!("Modality: {}", self.modality),
        }
    }
}

/// `YYYYMMDD` -> `"{label}: YYYY-MM-DD"`.
///
/// Short or malformed input is split at the same offsets without failing,
/// so `"1980"` becomes `"{label}: 1980--"`.
fn labelled_date(label: &str, compact: &str) -> String {
    let year = char_slice(compact, 0, Some(4));
    let month = char_slice(compact, 4, Some(6));
    let day = char_slice(compact, 6, None);
    format!("{label}: {year}-{month}-{day}")
}

fn char_slice(s: &str, start: usize, end: Option<usize>) -> String {
    let chars = s.chars().skip(start);
    match end {
        Some(end) => chars.take(end.saturating_sub(start)).collect(),
        None => chars.collect(),
    }
}
