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
            "/health-metrics",
            get(handlers::list_health_metrics).post(handlers::create_health_metric),
        )
        .route(
            "/health-metrics/:id",
            get(handlers::get_health_metric)
                .put(handlers::update_health_metric)
                .delete(handlers::delete_health_metric),
        )
        .route("/health-metrics/sync", post(handlers::sync_health_metrics))
}
