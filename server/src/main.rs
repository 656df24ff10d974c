//! Job board API
//!
//! Serves the cached job list scraped from the recruitment CRM, refreshing
//! it when it goes stale.

mod config;
mod errors;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use common::JobsCache;
use crm_scraper::links::DEFAULT_JOB_PATH_PATTERN;
use crm_scraper::{
    AuthScrapeOptions, AuthenticatedScraper, HttpFetcher, LinkFilter, LocationRules,
    PublicPageScraper, PublicScrapeOptions,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "jobs_server={level},crm_scraper={level},common={level},tower_http={level}",
                level = config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting jobs server v{}", env!("CARGO_PKG_VERSION"));

    let links = LinkFilter::new(&config.vendor_domain, DEFAULT_JOB_PATH_PATTERN)?;
    let rules = match &config.location_rules_file {
        Some(path) => {
            info!(path = %path.display(), "Loading location rules");
            LocationRules::from_json_file(path)?
        }
        None => LocationRules::default(),
    };

    let scraper = PublicPageScraper::with_parts(
        PublicScrapeOptions {
            links: links.clone(),
            enrich: config.enrich_locations,
            enrich_concurrency: config.enrich_concurrency,
            ..PublicScrapeOptions::default()
        },
        Arc::new(HttpFetcher::new()?),
        Arc::new(rules),
    );
    let auth_scraper = AuthenticatedScraper::new(AuthScrapeOptions {
        login_url: config.login_url.clone(),
        jobs_api_url: config.jobs_api_url.clone(),
        jobs_page_url: config.jobs_page_url.clone(),
        links,
        ..AuthScrapeOptions::default()
    });

    let cache = JobsCache::new(&config.cache_path);
    match cache.read() {
        Some(doc) => info!(total = doc.total, last_updated = %doc.last_updated, "Found jobs cache"),
        None => info!(path = %cache.path().display(), "No jobs cache yet; first request will scrape"),
    }

    let state = AppState {
        config: Arc::new(config.clone()),
        cache,
        scraper: Arc::new(scraper),
        auth_scraper: Arc::new(auth_scraper),
        http: reqwest::Client::new(),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
