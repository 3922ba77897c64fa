use serde::Deserialize;
use time::Date;
use validator::Validate;

use crate::error::ApiError;
use crate::sync::ConflictResolution;
use crate::validate::allow_listed_opt;

pub const MOODS: &[&str] = &["terrible", "bad", "okay", "good", "great"];

/// Create payload; also the per-item shape for /health-metrics/sync.
/// One record per user per day, so `date` alone is the natural key.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateHealthMetricRequest {
    #[serde(with = "crate::dates::date")]
    pub date: Date,
    #[validate(range(min = 20.0, max = 500.0, message = "must be between 20 and 500"))]
    pub weight_kg: Option<f64>,
    #[validate(range(min = 0.0, max = 24.0, message = "must be between 0 and 24"))]
    pub sleep_hours: Option<f64>,
    #[validate(range(min = 30, max = 220, message = "must be between 30 and 220"))]
    pub heart_rate: Option<i32>,
    #[validate(range(min = 0, message = "must not be negative"))]
    pub steps: Option<i32>,
    #[validate(range(min = 0, message = "must not be negative"))]
    pub water_ml: Option<i32>,
    pub mood: Option<String>,
    #[validate(range(min = 1, max = 10, message = "must be between 1 and 10"))]
    pub energy_level: Option<i32>,
    pub notes: Option<String>,
}

impl CreateHealthMetricRequest {
    pub fn check(&self) -> Result<(), ApiError> {
        self.validate()?;
        allow_listed_opt(self.mood.as_deref(), MOODS, "mood")
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateHealthMetricRequest {
    #[serde(default, with = "crate::dates::date_option")]
    pub date: Option<Date>,
    #[validate(range(min = 20.0, max = 500.0, message = "must be between 20 and 500"))]
    pub weight_kg: Option<f64>,
    #[validate(range(min = 0.0, max = 24.0, message = "must be between 0 and 24"))]
    pub sleep_hours: Option<f64>,
    #[validate(range(min = 30, max = 220, message = "must be between 30 and 220"))]
    pub heart_rate: Option<i32>,
    #[validate(range(min = 0, message = "must not be negative"))]
    pub steps: Option<i32>,
    #[validate(range(min = 0, message = "must not be negative"))]
    pub water_ml: Option<i32>,
    pub mood: Option<String>,
    #[validate(range(min = 1, max = 10, message = "must be between 1 and 10"))]
    pub energy_level: Option<i32>,
    pub notes: Option<String>,
}

impl UpdateHealthMetricRequest {
    pub fn check(&self) -> Result<(), ApiError> {
        self.validate()?;
        allow_listed_opt(self.mood.as_deref(), MOODS, "mood")
    }

    /// Sync items go through the same partial-update statement as PUT:
    /// fields absent from the item keep their stored values.
    pub fn from_sync_item(item: &CreateHealthMetricRequest) -> Self {
        Self {
            date: Some(item.date),
            weight_kg: item.weight_kg,
            sleep_hours: item.sleep_hours,
            heart_rate: item.heart_rate,
            steps: item.steps,
            water_ml: item.water_ml,
            mood: item.mood.clone(),
            energy_level: item.energy_level,
            notes: item.notes.clone(),
        }
    }
}

/// Date filters are lenient; unparseable values are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct HealthMetricFilters {
    pub date: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SyncHealthMetricsRequest {
    pub items: Vec<CreateHealthMetricRequest>,
    #[serde(default)]
    pub conflict_resolution: ConflictResolution,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> CreateHealthMetricRequest {
        serde_json::from_value(serde_json::json!({
            "date": "2024-01-01",
            "weight_kg": 72.5,
            "sleep_hours": 7.5,
            "mood": "good"
        }))
        .unwrap()
    }

    #[test]
    fn valid_metric_passes() {
        assert!(base().check().is_ok());
    }

    #[test]
    fn unknown_mood_is_rejected() {
        let mut req = base();
        req.mood = Some("ecstatic".into());
        assert!(req.check().is_err());
    }

    #[test]
    fn sleep_hours_above_24_is_rejected() {
        let mut req = base();
        req.sleep_hours = Some(25.0);
        assert!(req.check().is_err());
    }

    #[test]
    fn energy_level_bounds_are_inclusive() {
        let mut req = base();
        req.energy_level = Some(10);
        assert!(req.check().is_ok());
        req.energy_level = Some(11);
        assert!(req.check().is_err());
    }

    #[test]
    fn negative_steps_are_rejected() {
        let mut req = base();
        req.steps = Some(-1);
        assert!(req.check().is_err());
    }
}
