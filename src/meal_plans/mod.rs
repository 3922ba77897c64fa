use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub mod dto;
pub mod handlers;
pub mod repo;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/meal-plans",
            get(handlers::list_meal_plans).post(handlers::create_meal_plan),
        )
        .route(
            "/meal-plans/:id",
            get(handlers::get_meal_plan)
                .put(handlers::update_meal_plan)
                .delete(handlers::delete_meal_plan),
        )
        .route("/meal-plans/sync", post(handlers::sync_meal_plans))
}
