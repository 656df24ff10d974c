use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::CacheError;
use crm_scraper::ScrapeError;
use serde_json::json;
use thiserror::Error;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
/// Messages go back to the caller as-is: this is an admin-facing refresh
/// tool, not a public API.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("Scrape failed: {0}")]
    Scrape(#[from] ScrapeError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            AppError::Scrape(e) => {
                tracing::error!("Scrape error: {e}");
                (StatusCode::INTERNAL_SERVER_ERROR, "SCRAPE_ERROR")
            }
            AppError::Cache(e) => {
                tracing::error!("Cache error: {e}");
                (StatusCode::INTERNAL_SERVER_ERROR, "CACHE_ERROR")
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": self.to_string()
            }
        }));

        (status, body).into_response()
    }
}
