use serde::Deserialize;
use time::Date;
use validator::Validate;

use crate::error::ApiError;
use crate::sync::ConflictResolution;
use crate::validate::{allow_listed, allow_listed_opt};

pub const MEAL_TYPES: &[&str] = &["breakfast", "lunch", "dinner", "snack"];

/// Create payload; also the per-item shape for /meals/sync (the natural
/// key fields stay required, everything else is optional).
#[derive(Debug, Deserialize, Validate)]
pub struct CreateMealRequest {
    #[serde(with = "crate::dates::date")]
    pub date: Date,
    pub meal_type: String,
    #[validate(length(min = 1, max = 200, message = "must be 1-200 characters"))]
    pub name: String,
    #[validate(range(min = 0, max = 10000, message = "must be between 0 and 10000"))]
    pub calories: Option<i32>,
    #[validate(range(min = 0.0, max = 1000.0, message = "must be between 0 and 1000"))]
    pub protein_g: Option<f64>,
    #[validate(range(min = 0.0, max = 1000.0, message = "must be between 0 and 1000"))]
    pub carbs_g: Option<f64>,
    #[validate(range(min = 0.0, max = 1000.0, message = "must be between 0 and 1000"))]
    pub fat_g: Option<f64>,
    pub ingredients: Option<serde_json::Value>,
    pub eating_reasons: Option<serde_json::Value>,
    pub notes: Option<String>,
}

impl CreateMealRequest {
    pub fn check(&self) -> Result<(), ApiError> {
        self.validate()?;
        allow_listed(&self.meal_type, MEAL_TYPES, "meal_type")
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateMealRequest {
    #[serde(default, with = "crate::dates::date_option")]
    pub date: Option<Date>,
    pub meal_type: Option<String>,
    #[validate(length(min = 1, max = 200, message = "must be 1-200 characters"))]
    pub name: Option<String>,
    #[validate(range(min = 0, max = 10000, message = "must be between 0 and 10000"))]
    pub calories: Option<i32>,
    #[validate(range(min = 0.0, max = 1000.0, message = "must be between 0 and 1000"))]
    pub protein_g: Option<f64>,
    #[validate(range(min = 0.0, max = 1000.0, message = "must be between 0 and 1000"))]
    pub carbs_g: Option<f64>,
    #[validate(range(min = 0.0, max = 1000.0, message = "must be between 0 and 1000"))]
    pub fat_g: Option<f64>,
    pub ingredients: Option<serde_json::Value>,
    pub eating_reasons: Option<serde_json::Value>,
    pub notes: Option<String>,
}

impl UpdateMealRequest {
    pub fn check(&self) -> Result<(), ApiError> {
        self.validate()?;
        allow_listed_opt(self.meal_type.as_deref(), MEAL_TYPES, "meal_type")
    }

    /// Sync items go through the same partial-update statement as PUT:
    /// fields absent from the item keep their stored values.
    pub fn from_sync_item(item: &CreateMealRequest) -> Self {
        Self {
            date: Some(item.date),
            meal_type: Some(item.meal_type.clone()),
            name: Some(item.name.clone()),
            calories: item.calories,
            protein_g: item.protein_g,
            carbs_g: item.carbs_g,
            fat_g: item.fat_g,
            ingredients: item.ingredients.clone(),
            eating_reasons: item.eating_reasons.clone(),
            notes: item.notes.clone(),
        }
    }
}

/// Allow-listed query filters; anything unparseable is ignored.
#[derive(Debug, Default, Deserialize)]
pub struct MealFilters {
    pub date: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub meal_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SyncMealsRequest {
    pub items: Vec<CreateMealRequest>,
    #[serde(default)]
    pub conflict_resolution: ConflictResolution,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> CreateMealRequest {
        serde_json::from_value(serde_json::json!({
            "date": "2024-01-01",
            "meal_type": "breakfast",
            "name": "Eggs",
            "calories": 200
        }))
        .unwrap()
    }

    #[test]
    fn valid_meal_passes() {
        assert!(base().check().is_ok());
    }

    #[test]
    fn unknown_meal_type_is_rejected() {
        let mut req = base();
        req.meal_type = "brunch".into();
        assert!(req.check().is_err());
    }

    #[test]
    fn calories_out_of_range_is_rejected() {
        let mut req = base();
        req.calories = Some(20000);
        assert!(req.check().is_err());
    }

    #[test]
    fn unparseable_date_fails_deserialization() {
        let result: Result<CreateMealRequest, _> = serde_json::from_value(serde_json::json!({
            "date": "01/01/2024",
            "meal_type": "lunch",
            "name": "Soup"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn ingredients_accept_arbitrary_json() {
        let req: CreateMealRequest = serde_json::from_value(serde_json::json!({
            "date": "2024-01-01",
            "meal_type": "dinner",
            "name": "Stew",
            "ingredients": [{"name": "carrot", "grams": 80}, "salt"]
        }))
        .unwrap();
        assert!(req.check().is_ok());
        assert!(req.ingredients.unwrap().is_array());
    }

    #[test]
    fn sync_item_update_leaves_absent_fields_untouched() {
        let update = UpdateMealRequest::from_sync_item(&base());
        assert_eq!(update.name.as_deref(), Some("Eggs"));
        assert_eq!(update.calories, Some(200));
        // absent fields stay None so the partial update keeps stored values
        assert!(update.protein_g.is_none());
        assert!(update.ingredients.is_none());
        assert!(update.notes.is_none());
    }
}
