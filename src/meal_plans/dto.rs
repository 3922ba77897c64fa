use serde::Deserialize;
use time::Date;
use validator::Validate;

use crate::error::ApiError;
use crate::sync::ConflictResolution;

/// Create payload; doubles as the /meal-plans/sync item.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateMealPlanRequest {
    #[validate(length(min = 1, max = 200, message = "must be 1-200 characters"))]
    pub name: String,
    #[serde(default, with = "crate::dates::date_option")]
    pub start_date: Option<Date>,
    #[serde(default, with = "crate::dates::date_option")]
    pub end_date: Option<Date>,
    #[serde(default)]
    pub is_active: bool,
    pub goals: Option<serde_json::Value>,
    pub metadata: Option<serde_json::Value>,
}

impl CreateMealPlanRequest {
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
pub struct UpdateMealPlanRequest {
    #[validate(length(min = 1, max = 200, message = "must be 1-200 characters"))]
    pub name: Option<String>,
    #[serde(default, with = "crate::dates::date_option")]
    pub start_date: Option<Date>,
    #[serde(default, with = "crate::dates::date_option")]
    pub end_date: Option<Date>,
    pub is_active: Option<bool>,
    pub goals: Option<serde_json::Value>,
    pub metadata: Option<serde_json::Value>,
}

impl UpdateMealPlanRequest {
    pub fn check(&self) -> Result<(), ApiError> {
        self.validate()?;
        Ok(())
    }

    /// Sync items go through the same partial-update statement as PUT:
    /// fields absent from the item keep their stored values, and an
    /// activating item deactivates every other plan.
    pub fn from_sync_item(item: &CreateMealPlanRequest) -> Self {
        Self {
            name: Some(item.name.clone()),
            start_date: item.start_date,
            end_date: item.end_date,
            is_active: Some(item.is_active),
            goals: item.goals.clone(),
            metadata: item.metadata.clone(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct MealPlanFilters {
    /// Truthy (`true`/`1`) restricts to the active plan.
    pub active: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SyncMealPlansRequest {
    pub items: Vec<CreateMealPlanRequest>,
    #[serde(default)]
    pub conflict_resolution: ConflictResolution,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_plan_is_valid_and_inactive_by_default() {
        let req: CreateMealPlanRequest =
            serde_json::from_value(serde_json::json!({"name": "Cutting"})).unwrap();
        assert!(req.check().is_ok());
        assert!(!req.is_active);
    }

    #[test]
    fn inverted_date_range_is_rejected() {
        let req: CreateMealPlanRequest = serde_json::from_value(serde_json::json!({
            "name": "Cutting",
            "start_date": "2024-03-01",
            "end_date": "2024-02-01"
        }))
        .unwrap();
        assert!(req.check().is_err());
    }

    #[test]
    fn goals_and_metadata_accept_arbitrary_json() {
        let req: CreateMealPlanRequest = serde_json::from_value(serde_json::json!({
            "name": "Bulk",
            "goals": ["gain", {"target_kg": 2}],
            "metadata": {"source": "coach"}
        }))
        .unwrap();
        assert!(req.check().is_ok());
    }
}
