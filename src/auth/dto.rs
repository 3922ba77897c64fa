use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;
use validator::Validate;

use crate::auth::repo::User;
use crate::error::ApiError;
use crate::validate::allow_listed_opt;

pub const ACTIVITY_LEVELS: &[&str] =
    &["sedentary", "light", "moderate", "active", "very_active"];

/// Request body for user registration.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 8, message = "must be at least 8 characters"))]
    pub password: String,
    #[validate(length(max = 100, message = "must be at most 100 characters"))]
    pub name: Option<String>,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Request body for Google sign-in.
#[derive(Debug, Deserialize)]
pub struct GoogleVerifyRequest {
    pub id_token: String,
}

/// Request body for token refresh.
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Partial profile update; absent fields keep their value.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 100, message = "must be 1-100 characters"))]
    pub name: Option<String>,
    #[validate(range(min = 50.0, max = 300.0, message = "must be between 50 and 300"))]
    pub height_cm: Option<f64>,
    #[validate(range(min = 20.0, max = 500.0, message = "must be between 20 and 500"))]
    pub weight_kg: Option<f64>,
    pub activity_level: Option<String>,
}

impl UpdateProfileRequest {
    pub fn check(&self) -> Result<(), ApiError> {
        self.validate()?;
        allow_listed_opt(
            self.activity_level.as_deref(),
            ACTIVITY_LEVELS,
            "activity_level",
        )
    }
}

/// Response returned after login, register, google verify or refresh.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: PublicUser,
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub activity_level: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            email: u.email,
            name: u.name,
            height_cm: u.height_cm,
            weight_kg: u.weight_kg,
            activity_level: u.activity_level,
            created_at: u.created_at,
        }
    }
}
