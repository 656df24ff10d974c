pub mod health;
pub mod jobs;

use axum::{routing::get, Router};

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/jobs", get(jobs::handle_get_jobs))
        .route("/jobs/refresh", get(jobs::handle_refresh_jobs))
        .route("/jobs/authenticated", get(jobs::handle_authenticated_jobs))
        .route("/jobs/rss", get(jobs::handle_rss_jobs))
        .with_state(state)
}
