use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use tracing::instrument;
use uuid::Uuid;

use crate::auth::extractors::AuthUser;
use crate::error::ApiError;
use crate::meals::dto::{CreateMealRequest, MealFilters, SyncMealsRequest, UpdateMealRequest};
use crate::meals::repo::{self, MealSyncStore};
use crate::query::Pagination;
use crate::response::{self, PageMeta};
use crate::state::AppState;
use crate::sync;

#[instrument(skip(state))]
pub async fn list_meals(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(page): Query<Pagination>,
    Query(filters): Query<MealFilters>,
) -> Result<impl IntoResponse, ApiError> {
    let (items, total) = repo::list(&state.db, user.id, &filters, page.limit(), page.offset()).await?;
    Ok(response::page(
        "Meals retrieved",
        items,
        PageMeta {
            total,
            page: page.page(),
            limit: page.limit(),
        },
    ))
}

#[instrument(skip(state))]
pub async fn get_meal(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let meal = repo::get(&state.db, user.id, id)
        .await?
        .ok_or(ApiError::NotFound("Meal"))?;
    Ok(response::ok("Meal retrieved", meal))
}

#[instrument(skip(state, payload))]
pub async fn create_meal(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(payload): Json<CreateMealRequest>,
) -> Result<impl IntoResponse, ApiError> {
    payload.check()?;
    let meal = repo::insert(&state.db, user.id, &payload).await?;
    Ok(response::created("Meal created", meal))
}

#[instrument(skip(state, payload))]
pub async fn update_meal(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateMealRequest>,
) -> Result<impl IntoResponse, ApiError> {
    payload.check()?;
    let meal = repo::update(&state.db, user.id, id, &payload)
        .await?
        .ok_or(ApiError::NotFound("Meal"))?;
    Ok(response::ok("Meal updated", meal))
}

#[instrument(skip(state))]
pub async fn delete_meal(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    if !repo::delete(&state.db, user.id, id).await? {
        return Err(ApiError::NotFound("Meal"));
    }
    Ok(response::ok_empty("Meal deleted"))
}

#[instrument(skip(state, payload), fields(items = payload.items.len()))]
pub async fn sync_meals(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(payload): Json<SyncMealsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut store = MealSyncStore { db: &state.db };
    let outcome = sync::reconcile(
        &mut store,
        user.id,
        &payload.items,
        payload.conflict_resolution,
        |item| item.check().map_err(|e| e.to_string()),
    )
    .await;
    sync::touch_status_logged(&state.db, user.id, "meals").await;
    Ok(sync::outcome_response("Meals", outcome))
}
