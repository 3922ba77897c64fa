use std::collections::BTreeMap;

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::response::Envelope;

pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Application error taxonomy. Every handler returns `Result<_, ApiError>`
/// and the single `IntoResponse` impl below does the HTTP mapping.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("validation failed: {}", flatten(.0))]
    Validation(FieldErrors),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("rate limit exceeded")]
    RateLimited { retry_after: i64 },

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        ApiError::Unauthorized(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        ApiError::Conflict(msg.into())
    }

    /// Single-field validation failure.
    pub fn validation(field: &str, message: &str) -> Self {
        let mut map = FieldErrors::new();
        map.insert(field.to_string(), vec![message.to_string()]);
        ApiError::Validation(map)
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errs: validator::ValidationErrors) -> Self {
        let mut map = FieldErrors::new();
        for (field, errors) in errs.field_errors() {
            let messages = errors
                .iter()
                .map(|e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("invalid value ({})", e.code))
                })
                .collect();
            map.insert(field.to_string(), messages);
        }
        ApiError::Validation(map)
    }
}

fn flatten(map: &FieldErrors) -> String {
    map.iter()
        .map(|(field, msgs)| format!("{}: {}", field, msgs.join(", ")))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Postgres unique-violation code. Check-then-insert races (e.g. two
/// concurrent registrations) surface here instead of the existence check.
const UNIQUE_VIOLATION: &str = "23505";

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, errors) = match self {
            ApiError::Validation(map) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "Validation failed".to_string(),
                Some(map),
            ),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg, None),
            ApiError::NotFound(what) => {
                (StatusCode::NOT_FOUND, format!("{} not found", what), None)
            }
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg, None),
            ApiError::RateLimited { retry_after } => {
                let body = Json(Envelope::<()>::error("Too many requests".into(), None));
                let mut response = (StatusCode::TOO_MANY_REQUESTS, body).into_response();
                if let Ok(v) = retry_after.to_string().parse() {
                    response.headers_mut().insert(header::RETRY_AFTER, v);
                }
                return response;
            }
            ApiError::Database(ref e) => {
                if let sqlx::Error::Database(db_err) = e {
                    if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
                        return (
                            StatusCode::CONFLICT,
                            Json(Envelope::<()>::error("Resource already exists".into(), None)),
                        )
                            .into_response();
                    }
                }
                tracing::error!(error = %e, "database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    None,
                )
            }
            ApiError::Internal(ref e) => {
                tracing::error!(error = %e, "unexpected error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    None,
                )
            }
        };

        (status, Json(Envelope::<()>::error(message, errors))).into_response()
    }
}
