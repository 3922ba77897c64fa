use serde::Deserialize;
use time::Date;
use validator::Validate;

use crate::error::ApiError;
use crate::sync::ConflictResolution;

/// Create payload; doubles as the /medications/sync item.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateMedicationRequest {
    #[validate(length(min = 1, max = 200, message = "must be 1-200 characters"))]
    pub name: String,
    #[validate(length(max = 100, message = "must be at most 100 characters"))]
    pub dosage: Option<String>,
    #[validate(length(max = 100, message = "must be at most 100 characters"))]
    pub frequency: Option<String>,
    pub reminder_times: Option<serde_json::Value>,
    #[serde(default, with = "crate::dates::date_option")]
    pub start_date: Option<Date>,
    #[serde(default, with = "crate::dates::date_option")]
    pub end_date: Option<Date>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    pub notes: Option<String>,
}

fn default_active() -> bool {
    true
}

impl CreateMedicationRequest {
    pub fn check(&self) -> Result<(), ApiError> {
        self.validate()?;
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if end < start {
                return Err(ApiError::validation(
                    "end_date",
                    "must not be before start_date",
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateMedicationRequest {
    #[validate(length(min = 1, max = 200, message = "must be 1-200 characters"))]
    pub name: Option<String>,
    #[validate(length(max = 100, message = "must be at most 100 characters"))]
    pub dosage: Option<String>,
    #[validate(length(max = 100, message = "must be at most 100 characters"))]
    pub frequency: Option<String>,
    pub reminder_times: Option<serde_json::Value>,
    #[serde(default, with = "crate::dates::date_option")]
    pub start_date: Option<Date>,
    #[serde(default, with = "crate::dates::date_option")]
    pub end_date: Option<Date>,
    pub is_active: Option<bool>,
    pub notes: Option<String>,
}

impl UpdateMedicationRequest {
    pub fn check(&self) -> Result<(), ApiError> {
        self.validate()?;
        Ok(())
    }

    /// Sync items go through the same partial-update statement as PUT:
    /// fields absent from the item keep their stored values.
    pub fn from_sync_item(item: &CreateMedicationRequest) -> Self {
        Self {
            name: Some(item.name.clone()),
            dosage: item.dosage.clone(),
            frequency: item.frequency.clone(),
            reminder_times: item.reminder_times.clone(),
            start_date: item.start_date,
            end_date: item.end_date,
            is_active: Some(item.is_active),
            notes: item.notes.clone(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct MedicationFilters {
    /// Truthy (`true`/`1`) restricts to active medications.
    pub active: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SyncMedicationsRequest {
    pub items: Vec<CreateMedicationRequest>,
    #[serde(default)]
    pub conflict_resolution: ConflictResolution,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_medication_is_valid_and_active_by_default() {
        let req: CreateMedicationRequest =
            serde_json::from_value(serde_json::json!({"name": "Ibuprofen"})).unwrap();
        assert!(req.check().is_ok());
        assert!(req.is_active);
    }

    #[test]
    fn end_before_start_is_rejected() {
        let req: CreateMedicationRequest = serde_json::from_value(serde_json::json!({
            "name": "Ibuprofen",
            "start_date": "2024-02-01",
            "end_date": "2024-01-01"
        }))
        .unwrap();
        assert!(req.check().is_err());
    }

    #[test]
    fn reminder_times_accept_arbitrary_json() {
        let req: CreateMedicationRequest = serde_json::from_value(serde_json::json!({
            "name": "Vitamin D",
            "reminder_times": ["08:00", "20:00"]
        }))
        .unwrap();
        assert!(req.check().is_ok());
    }

    #[test]
    fn sync_item_update_leaves_absent_fields_untouched() {
        let item: CreateMedicationRequest = serde_json::from_value(serde_json::json!({
            "name": "Ibuprofen",
            "dosage": "200mg"
        }))
        .unwrap();
        let update = UpdateMedicationRequest::from_sync_item(&item);
        assert_eq!(update.dosage.as_deref(), Some("200mg"));
        assert_eq!(update.is_active, Some(true));
        assert!(update.frequency.is_none());
        assert!(update.notes.is_none());
    }
}
