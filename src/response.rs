use axum::{http::StatusCode, Json};
use serde::Serialize;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use crate::error::FieldErrors;

/// Response envelope shared by every endpoint.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<FieldErrors>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PageMeta>,
    pub timestamp: String,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct PageMeta {
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}

impl<T: Serialize> Envelope<T> {
    pub fn error(message: String, errors: Option<FieldErrors>) -> Self {
        Self {
            success: false,
            message,
            data: None,
            errors,
            pagination: None,
            timestamp: now_rfc3339(),
        }
    }
}

pub fn ok<T: Serialize>(message: &str, data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        message: message.to_string(),
        data: Some(data),
        errors: None,
        pagination: None,
        timestamp: now_rfc3339(),
    })
}

pub fn created<T: Serialize>(message: &str, data: T) -> (StatusCode, Json<Envelope<T>>) {
    let Json(body) = ok(message, data);
    (StatusCode::CREATED, Json(body))
}

pub fn ok_empty(message: &str) -> Json<Envelope<()>> {
    Json(Envelope {
        success: true,
        message: message.to_string(),
        data: None,
        errors: None,
        pagination: None,
        timestamp: now_rfc3339(),
    })
}

pub fn page<T: Serialize>(
    message: &str,
    items: Vec<T>,
    meta: PageMeta,
) -> Json<Envelope<Vec<T>>> {
    Json(Envelope {
        success: true,
        message: message.to_string(),
        data: Some(items),
        errors: None,
        pagination: Some(meta),
        timestamp: now_rfc3339(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_skips_absent_fields() {
        let Json(body) = ok_empty("Deleted");
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["message"], "Deleted");
        assert!(json.get("data").is_none());
        assert!(json.get("errors").is_none());
        assert!(json.get("pagination").is_none());
        assert!(json["timestamp"].as_str().unwrap().contains('T'));
    }

    #[test]
    fn paginated_envelope_carries_meta() {
        let Json(body) = page(
            "Items",
            vec![1, 2, 3],
            PageMeta {
                total: 42,
                page: 2,
                limit: 3,
            },
        );
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["data"].as_array().unwrap().len(), 3);
        assert_eq!(json["pagination"]["total"], 42);
        assert_eq!(json["pagination"]["page"], 2);
    }
}
