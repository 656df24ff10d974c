use std::sync::Arc;

use common::JobsCache;
use crm_scraper::{AuthenticatedScraper, JobScraper};

use crate::config::Config;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub cache: JobsCache,
    /// Public page scraper. A trait object so tests can swap in a fake.
    pub scraper: Arc<dyn JobScraper>,
    pub auth_scraper: Arc<AuthenticatedScraper>,
    pub http: reqwest::Client,
}
