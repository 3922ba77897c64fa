use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use tracing::instrument;
use uuid::Uuid;

use crate::auth::extractors::AuthUser;
use crate::error::ApiError;
use crate::meal_plans::dto::{
    CreateMealPlanRequest, MealPlanFilters, SyncMealPlansRequest, UpdateMealPlanRequest,
};
use crate::meal_plans::repo::{self, MealPlanSyncStore};
use crate::query::Pagination;
use crate::response::{self, PageMeta};
use crate::state::AppState;
use crate::sync;

#[instrument(skip(state))]
pub async fn list_meal_plans(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(page): Query<Pagination>,
    Query(filters): Query<MealPlanFilters>,
) -> Result<impl IntoResponse, ApiError> {
    let (items, total) = repo::list(&state.db, user.id, &filters, page.limit(), page.offset()).await?;
    Ok(response::page(
        "Meal plans retrieved",
        items,
        PageMeta {
            total,
            page: page.page(),
            limit: page.limit(),
        },
    ))
}

#[instrument(skip(state))]
pub async fn get_meal_plan(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let plan = repo::get(&state.db, user.id, id)
        .await?
        .ok_or(ApiError::NotFound("Meal plan"))?;
    Ok(response::ok("Meal plan retrieved", plan))
}

#[instrument(skip(state, payload))]
pub async fn create_meal_plan(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(payload): Json<CreateMealPlanRequest>,
) -> Result<impl IntoResponse, ApiError> {
    payload.check()?;
    let plan = repo::insert(&state.db, user.id, &payload).await?;
    Ok(response::created("Meal plan created", plan))
}

#[instrument(skip(state, payload))]
pub async fn update_meal_plan(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateMealPlanRequest>,
) -> Result<impl IntoResponse, ApiError> {
    payload.check()?;
    let plan = repo::update(&state.db, user.id, id, &payload)
        .await?
        .ok_or(ApiError::NotFound("Meal plan"))?;
    Ok(response::ok("Meal plan updated", plan))
}

#[instrument(skip(state))]
pub async fn delete_meal_plan(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    if !repo::delete(&state.db, user.id, id).await? {
        return Err(ApiError::NotFound("Meal plan"));
    }
    Ok(response::ok_empty("Meal plan deleted"))
}

#[instrument(skip(state, payload), fields(items = payload.items.len()))]
pub async fn sync_meal_plans(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(payload): Json<SyncMealPlansRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut store = MealPlanSyncStore { db: &state.db };
    let outcome = sync::reconcile(
        &mut store,
        user.id,
        &payload.items,
        payload.conflict_resolution,
        |item| item.check().map_err(|e| e.to_string()),
    )
    .await;
    sync::touch_status_logged(&state.db, user.id, "meal_plans").await;
    Ok(sync::outcome_response("Meal plans", outcome))
}
