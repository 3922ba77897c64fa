use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use tracing::instrument;
use uuid::Uuid;

use crate::auth::extractors::AuthUser;
use crate::error::ApiError;
use crate::health_metrics::dto::{
    CreateHealthMetricRequest, HealthMetricFilters, SyncHealthMetricsRequest,
    UpdateHealthMetricRequest,
};
use crate::health_metrics::repo::{self, HealthMetricSyncStore};
use crate::query::Pagination;
use crate::response::{self, PageMeta};
use crate::state::AppState;
use crate::sync;

#[instrument(skip(state))]
pub async fn list_health_metrics(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(page): Query<Pagination>,
    Query(filters): Query<HealthMetricFilters>,
) -> Result<impl IntoResponse, ApiError> {
    let (items, total) = repo::list(&state.db, user.id, &filters, page.limit(), page.offset()).await?;
    Ok(response::page(
        "Health metrics retrieved",
        items,
        PageMeta {
            total,
            page: page.page(),
            limit: page.limit(),
        },
    ))
}

#[instrument(skip(state))]
pub async fn get_health_metric(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let metric = repo::get(&state.db, user.id, id)
        .await?
        .ok_or(ApiError::NotFound("Health metric"))?;
    Ok(response::ok("Health metric retrieved", metric))
}

#[instrument(skip(state, payload))]
pub async fn create_health_metric(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(payload): Json<CreateHealthMetricRequest>,
) -> Result<impl IntoResponse, ApiError> {
    payload.check()?;
    if repo::find_by_natural_key(&state.db, user.id, payload.date)
        .await?
        .is_some()
    {
        return Err(ApiError::conflict("A record for this date already exists"));
    }
    let metric = repo::insert(&state.db, user.id, &payload).await?;
    Ok(response::created("Health metric created", metric))
}

#[instrument(skip(state, payload))]
pub async fn update_health_metric(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateHealthMetricRequest>,
) -> Result<impl IntoResponse, ApiError> {
    payload.check()?;
    let metric = repo::update(&state.db, user.id, id, &payload)
        .await?
        .ok_or(ApiError::NotFound("Health metric"))?;
    Ok(response::ok("Health metric updated", metric))
}

#[instrument(skip(state))]
pub async fn delete_health_metric(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    if !repo::soft_delete(&state.db, user.id, id).await? {
        return Err(ApiError::NotFound("Health metric"));
    }
    Ok(response::ok_empty("Health metric deleted"))
}

#[instrument(skip(state, payload), fields(items = payload.items.len()))]
pub async fn sync_health_metrics(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(payload): Json<SyncHealthMetricsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut store = HealthMetricSyncStore { db: &state.db };
    let outcome = sync::reconcile(
        &mut store,
        user.id,
        &payload.items,
        payload.conflict_resolution,
        |item| item.check().map_err(|e| e.to_string()),
    )
    .await;
    sync::touch_status_logged(&state.db, user.id, "health_metrics").await;
    Ok(sync::outcome_response("Health metrics", outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn second_record_for_a_day_maps_to_409() {
        let response =
            ApiError::conflict("A record for this date already exists").into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
