//! Input for creating a study from files already staged in DICOM storage.

use serde::Deserialize;
use validator::Validate;

use crate::error::CoreError;

/// One uploaded DICOM instance, as returned by the storage service.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UploadedInstance {
    #[serde(rename = "ID")]
    #[validate(length(min = 1, message = "ID must not be empty"))]
    pub id: String,
    #[serde(rename = "ParentPatient")]
    #[validate(length(min = 1, message = "ParentPatient must not be empty"))]
    pub parent_patient: String,
    #[serde(rename = "ParentSeries")]
    #[validate(length(min = 1, message = "ParentSeries must not be empty"))]
    pub parent_series: String,
    #[serde(rename = "ParentStudy")]
    #[validate(length(min = 1, message = "ParentStudy must not be empty"))]
    pub parent_study: String,
}

/// Validate a creation request and return the input file ids in order.
pub fn file_ids_for_new_study(instances: &[UploadedInstance]) -> Result<Vec<String>, CoreError> {
    if instances.is_empty() {
        return Err(CoreError::Validation(
            "A study needs at least one uploaded file".into(),
        ));
    }

    for (index, instance) in instances.iter().enumerate() {
        instance
            .validate()
            .map_err(|e| CoreError::Validation(format!("File {index}: {e}")))?;
    }

    Ok(instances.iter().map(|i| i.id.clone()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn instance(id: &str) -> UploadedInstance {
        UploadedInstance {
            id: id.into(),
            parent_patient: "pat".into(),
            parent_series: "ser".into(),
            parent_study: "stu".into(),
        }
    }

    #[test]
    fn returns_ids_in_order() {
        let ids = file_ids_for_new_study(&[instance("f1"), instance("f2")]).unwrap();
        assert_eq!(ids, vec!["f1", "f2"]);
    }

    #[test]
    fn empty_request_rejected() {
        assert_matches!(file_ids_for_new_study(&[]), Err(CoreError::Validation(_)));
    }

    #[test]
    fn blank_id_rejected() {
        let result = file_ids_for_new_study(&[instance("f1"), instance("")]);
        assert_matches!(result, Err(CoreError::Validation(msg)) if msg.starts_with("File 1"));
    }

    #[test]
    fn deserializes_storage_field_names() {
        let parsed: Vec<UploadedInstance> = serde_json::from_value(serde_json::json!([
            { "ID": "a", "ParentPatient": "p", "ParentSeries": "s", "ParentStudy": "t" }
        ]))
        .unwrap();
        assert_eq!(parsed[0].id, "a");
        assert_eq!(parsed[0].parent_study, "t");
    }
}
