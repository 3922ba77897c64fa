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
            "/exercises",
            get(handlers::list_exercises).post(handlers::create_exercise),
        )
        .route(
            "/exercises/:id",
            get(handlers::get_exercise)
                .put(handlers::update_exercise)
                .delete(handlers::delete_exercise),
        )
        .route("/exercises/sync", post(handlers::sync_exercises))
}
