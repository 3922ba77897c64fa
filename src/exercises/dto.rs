use serde::Deserialize;
use time::Date;
use validator::Validate;

use crate::error::ApiError;
use crate::sync::ConflictResolution;
use crate::validate::allow_listed_opt;

pub const INTENSITIES: &[&str] = &["low", "moderate", "high"];

/// Create payload; doubles as the /exercises/sync item. Templates carry
/// no date, logged sessions usually do.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateExerciseRequest {
    #[validate(length(min = 1, max = 200, message = "must be 1-200 characters"))]
    pub name: String,
    #[serde(default)]
    pub is_template: bool,
    #[serde(default, with = "crate::dates::date_option")]
    pub date: Option<Date>,
    #[validate(range(min = 0, max = 1440, message = "must be between 0 and 1440"))]
    pub duration_minutes: Option<i32>,
    #[validate(range(min = 0, max = 10000, message = "must be between 0 and 10000"))]
    pub calories_burned: Option<i32>,
    pub intensity: Option<String>,
    pub muscle_groups: Option<serde_json::Value>,
    pub equipment: Option<serde_json::Value>,
    pub notes: Option<String>,
}

impl CreateExerciseRequest {
    pub fn check(&self) -> Result<(), ApiError> {
        self.validate()?;
        allow_listed_opt(self.intensity.as_deref(), INTENSITIES, "intensity")
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateExerciseRequest {
    #[validate(length(min = 1, max = 200, message = "must be 1-200 characters"))]
    pub name: Option<String>,
    pub is_template: Option<bool>,
    #[serde(default, with = "crate::dates::date_option")]
    pub date: Option<Date>,
    #[validate(range(min = 0, max = 1440, message = "must be between 0 and 1440"))]
    pub duration_minutes: Option<i32>,
    #[validate(range(min = 0, max = 10000, message = "must be between 0 and 10000"))]
    pub calories_burned: Option<i32>,
    pub intensity: Option<String>,
    pub muscle_groups: Option<serde_json::Value>,
    pub equipment: Option<serde_json::Value>,
    pub notes: Option<String>,
}

impl UpdateExerciseRequest {
    pub fn check(&self) -> Result<(), ApiError> {
        self.validate()?;
        allow_listed_opt(self.intensity.as_deref(), INTENSITIES, "intensity")
    }

    /// Sync items go through the same partial-update statement as PUT:
    /// fields absent from the item keep their stored values.
    pub fn from_sync_item(item: &CreateExerciseRequest) -> Self {
        Self {
            name: Some(item.name.clone()),
            is_template: Some(item.is_template),
            date: item.date,
            duration_minutes: item.duration_minutes,
            calories_burned: item.calories_burned,
            intensity: item.intensity.clone(),
            muscle_groups: item.muscle_groups.clone(),
            equipment: item.equipment.clone(),
            notes: item.notes.clone(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ExerciseFilters {
    pub date: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub intensity: Option<String>,
    /// Truthy (`true`/`1`) restricts to templates.
    pub template: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SyncExercisesRequest {
    pub items: Vec<CreateExerciseRequest>,
    #[serde(default)]
    pub conflict_resolution: ConflictResolution,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_without_date_is_valid() {
        let req: CreateExerciseRequest = serde_json::from_value(serde_json::json!({
            "name": "Push-ups",
            "is_template": true,
            "muscle_groups": ["chest", "triceps"]
        }))
        .unwrap();
        assert!(req.check().is_ok());
        assert!(req.date.is_none());
    }

    #[test]
    fn unknown_intensity_is_rejected() {
        let req: CreateExerciseRequest = serde_json::from_value(serde_json::json!({
            "name": "Sprint",
            "intensity": "extreme"
        }))
        .unwrap();
        assert!(req.check().is_err());
    }

    #[test]
    fn duration_over_a_day_is_rejected() {
        let req: CreateExerciseRequest = serde_json::from_value(serde_json::json!({
            "name": "Walk",
            "duration_minutes": 2000
        }))
        .unwrap();
        assert!(req.check().is_err());
    }

    #[test]
    fn sync_item_update_leaves_absent_fields_untouched() {
        let item: CreateExerciseRequest = serde_json::from_value(serde_json::json!({
            "name": "Sprint",
            "duration_minutes": 20
        }))
        .unwrap();
        let update = UpdateExerciseRequest::from_sync_item(&item);
        assert_eq!(update.name.as_deref(), Some("Sprint"));
        assert_eq!(update.duration_minutes, Some(20));
        assert!(update.calories_burned.is_none());
        assert!(update.muscle_groups.is_none());
    }
}
