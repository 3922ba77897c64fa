use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use tracing::instrument;
use uuid::Uuid;

use crate::auth::extractors::AuthUser;
use crate::error::ApiError;
use crate::exercises::dto::{
    CreateExerciseRequest, ExerciseFilters, SyncExercisesRequest, UpdateExerciseRequest,
};
use crate::exercises::repo::{self, ExerciseSyncStore};
use crate::query::Pagination;
use crate::response::{self, PageMeta};
use crate::state::AppState;
use crate::sync;

#[instrument(skip(state))]
pub async fn list_exercises(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(page): Query<Pagination>,
    Query(filters): Query<ExerciseFilters>,
) -> Result<impl IntoResponse, ApiError> {
    let (items, total) = repo::list(&state.db, user.id, &filters, page.limit(), page.offset()).await?;
    Ok(response::page(
        "Exercises retrieved",
        items,
        PageMeta {
            total,
            page: page.page(),
            limit: page.limit(),
        },
    ))
}

#[instrument(skip(state))]
pub async fn get_exercise(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let exercise = repo::get(&state.db, user.id, id)
        .await?
        .ok_or(ApiError::NotFound("Exercise"))?;
    Ok(response::ok("Exercise retrieved", exercise))
}

#[instrument(skip(state, payload))]
pub async fn create_exercise(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(payload): Json<CreateExerciseRequest>,
) -> Result<impl IntoResponse, ApiError> {
    payload.check()?;
    let exercise = repo::insert(&state.db, user.id, &payload).await?;
    Ok(response::created("Exercise created", exercise))
}

#[instrument(skip(state, payload))]
pub async fn update_exercise(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateExerciseRequest>,
) -> Result<impl IntoResponse, ApiError> {
    payload.check()?;
    let exercise = repo::update(&state.db, user.id, id, &payload)
        .await?
        .ok_or(ApiError::NotFound("Exercise"))?;
    Ok(response::ok("Exercise updated", exercise))
}

#[instrument(skip(state))]
pub async fn delete_exercise(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    if !repo::delete(&state.db, user.id, id).await? {
        return Err(ApiError::NotFound("Exercise"));
    }
    Ok(response::ok_empty("Exercise deleted"))
}

#[instrument(skip(state, payload), fields(items = payload.items.len()))]
pub async fn sync_exercises(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(payload): Json<SyncExercisesRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut store = ExerciseSyncStore { db: &state.db };
    let outcome = sync::reconcile(
        &mut store,
        user.id,
        &payload.items,
        payload.conflict_resolution,
        |item| item.check().map_err(|e| e.to_string()),
    )
    .await;
    sync::touch_status_logged(&state.db, user.id, "exercises").await;
    Ok(sync::outcome_response("Exercises", outcome))
}
