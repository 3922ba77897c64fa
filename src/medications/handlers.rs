use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use tracing::instrument;
use uuid::Uuid;

use crate::auth::extractors::AuthUser;
use crate::error::ApiError;
use crate::medications::dto::{
    CreateMedicationRequest, MedicationFilters, SyncMedicationsRequest, UpdateMedicationRequest,
};
use crate::medications::repo::{self, MedicationSyncStore};
use crate::query::Pagination;
use crate::response::{self, PageMeta};
use crate::state::AppState;
use crate::sync;

#[instrument(skip(state))]
pub async fn list_medications(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(page): Query<Pagination>,
    Query(filters): Query<MedicationFilters>,
) -> Result<impl IntoResponse, ApiError> {
    let (items, total) = repo::list(&state.db, user.id, &filters, page.limit(), page.offset()).await?;
    Ok(response::page(
        "Medications retrieved",
        items,
        PageMeta {
            total,
            page: page.page(),
            limit: page.limit(),
        },
    ))
}

#[instrument(skip(state))]
pub async fn get_medication(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let medication = repo::get(&state.db, user.id, id)
        .await?
        .ok_or(ApiError::NotFound("Medication"))?;
    Ok(response::ok("Medication retrieved", medication))
}

#[instrument(skip(state, payload))]
pub async fn create_medication(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(payload): Json<CreateMedicationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    payload.check()?;
    let medication = repo::insert(&state.db, user.id, &payload).await?;
    Ok(response::created("Medication created", medication))
}

#[instrument(skip(state, payload))]
pub async fn update_medication(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateMedicationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    payload.check()?;
    let medication = repo::update(&state.db, user.id, id, &payload)
        .await?
        .ok_or(ApiError::NotFound("Medication"))?;
    Ok(response::ok("Medication updated", medication))
}

#[instrument(skip(state))]
pub async fn delete_medication(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    if !repo::delete(&state.db, user.id, id).await? {
        return Err(ApiError::NotFound("Medication"));
    }
    Ok(response::ok_empty("Medication deleted"))
}

#[instrument(skip(state, payload), fields(items = payload.items.len()))]
pub async fn sync_medications(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(payload): Json<SyncMedicationsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut store = MedicationSyncStore { db: &state.db };
    let outcome = sync::reconcile(
        &mut store,
        user.id,
        &payload.items,
        payload.conflict_resolution,
        |item| item.check().map_err(|e| e.to_string()),
    )
    .await;
    sync::touch_status_logged(&state.db, user.id, "medications").await;
    Ok(sync::outcome_response("Medications", outcome))
}
