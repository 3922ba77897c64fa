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
            "/medications",
            get(handlers::list_medications).post(handlers::create_medication),
        )
        .route(
            "/medications/:id",
            get(handlers::get_medication)
                .put(handlers::update_medication)
                .delete(handlers::delete_medication),
        )
        .route("/medications/sync", post(handlers::sync_medications))
}
