use std::time::Duration;

use axum::{
    extract::{Query, State},
    Json,
};
use common::{CachedJobsDocument, JobsCache, ScrapeResult};
use crm_scraper::{rss, AuthOutcome};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::parse_flag;
use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct JobsQuery {
    pub url: Option<String>,
    pub page: Option<String>,
    pub force: Option<String>,
    pub refresh: Option<String>,
}

impl JobsQuery {
    /// The page named by `url` or `page`, if either is set.
    fn override_url(&self) -> Option<&str> {
        [self.url.as_deref(), self.page.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|u| !u.is_empty())
    }

    fn source_url(&self, default: &str) -> String {
        self.override_url().unwrap_or(default).to_string()
    }

    fn forced(&self) -> bool {
        [self.force.as_deref(), self.refresh.as_deref()]
            .into_iter()
            .flatten()
            .any(|v| parse_flag(v).unwrap_or(false))
    }
}

/// The cached document served past its freshness window because a live
/// refresh failed.
#[derive(Debug, Serialize)]
pub struct StaleJobsResponse {
    #[serde(flatten)]
    pub document: CachedJobsDocument,
    pub stale: bool,
    pub error: String,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum JobsResponse {
    Current(CachedJobsDocument),
    Stale(StaleJobsResponse),
}

async fn read_cache(cache: &JobsCache) -> Option<CachedJobsDocument> {
    let cache = cache.clone();
    match tokio::task::spawn_blocking(move || cache.read()).await {
        Ok(document) => document,
        Err(e) => {
            warn!(error = %e, "Jobs cache read task failed");
            None
        }
    }
}

/// Scrapes `source_url` and overwrites the cache with the result.
async fn refresh_cache(state: &AppState, source_url: &str) -> Result<CachedJobsDocument, AppError> {
    let result = state.scraper.scrape(source_url).await?;
    let cache = state.cache.clone();
    let source = source_url.to_string();
    let document = tokio::task::spawn_blocking(move || cache.write(result, Some(source)))
        .await
        .map_err(anyhow::Error::from)??;
    info!(
        total = document.total,
        with_application_link = document.with_application_link,
        "Jobs cache refreshed"
    );
    Ok(document)
}

/// A cached document answers a request when it is fresh and, if the
/// request names a page, was scraped from that page.
fn cache_answers(document: &CachedJobsDocument, params: &JobsQuery, max_age: Duration) -> bool {
    let same_source = params
        .override_url()
        .map_or(true, |url| document.source_url.as_deref() == Some(url));
    same_source && JobsCache::is_fresh(Some(document), max_age)
}

/// GET /jobs
///
/// On a failed refresh the previous document is served as stale even when
/// it came from a different page; its `sourceUrl` says which.
pub async fn handle_get_jobs(
    State(state): State<AppState>,
    Query(params): Query<JobsQuery>,
) -> Result<Json<JobsResponse>, AppError> {
    let cached = match read_cache(&state.cache).await {
        Some(document)
            if !params.forced() && cache_answers(&document, &params, state.config.cache_max_age) =>
        {
            debug!(last_updated = %document.last_updated, "Serving fresh jobs cache");
            return Ok(Json(JobsResponse::Current(document)));
        }
        other => other,
    };

    let source_url = params.source_url(&state.config.public_url);
    match refresh_cache(&state, &source_url).await {
        Ok(document) => Ok(Json(JobsResponse::Current(document))),
        Err(e) => match cached {
            Some(document) => {
                warn!(error = %e, last_updated = %document.last_updated, "Refresh failed, serving stale jobs cache");
                Ok(Json(JobsResponse::Stale(StaleJobsResponse {
                    document,
                    stale: true,
                    error: e.to_string(),
                })))
            }
            None => Err(e),
        },
    }
}

/// GET /jobs/refresh
pub async fn handle_refresh_jobs(
    State(state): State<AppState>,
    Query(params): Query<JobsQuery>,
) -> Result<Json<CachedJobsDocument>, AppError> {
    let source_url = params.source_url(&state.config.public_url);
    Ok(Json(refresh_cache(&state, &source_url).await?))
}

/// GET /jobs/authenticated
pub async fn handle_authenticated_jobs(
    State(state): State<AppState>,
) -> Result<Json<AuthOutcome>, AppError> {
    let credentials = state.config.crm_credentials.as_ref().ok_or_else(|| {
        AppError::Validation(
            "RECRUITCRM_EMAIL and RECRUITCRM_PASSWORD must be set to use the authenticated scraper"
                .to_string(),
        )
    })?;
    Ok(Json(state.auth_scraper.scrape(credentials).await?))
}

#[derive(Debug, Deserialize)]
pub struct RssQuery {
    pub url: Option<String>,
}

/// GET /jobs/rss
pub async fn handle_rss_jobs(
    State(state): State<AppState>,
    Query(params): Query<RssQuery>,
) -> Result<Json<ScrapeResult>, AppError> {
    let url = params
        .url
        .filter(|u| !u.trim().is_empty())
        .or_else(|| state.config.rss_url.clone())
        .ok_or_else(|| AppError::Validation("Missing required query parameter 'url'".to_string()))?;
    Ok(Json(rss::fetch_rss(&state.http, &url).await?))
}
