//! Scraper for the public job board page, which embeds the CRM's listing
//! widget in one or more iframes.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{Job, ScrapeResult};
use tracing::{debug, info};
use url::Url;

use crate::browser;
use crate::enrich::{enrich_locations, HttpFetcher, LocationRules, PageFetcher, DEFAULT_ENRICH_CONCURRENCY};
use crate::error::ScrapeError;
use crate::links::LinkFilter;
use crate::JobScraper;

pub const DEFAULT_PUBLIC_URL: &str = "https://recruitcrm.io/jobs/staffing";

#[derive(Debug, Clone)]
pub struct PublicScrapeOptions {
    pub links: LinkFilter,
    pub navigation_timeout: Duration,
    pub iframe_timeout: Duration,
    pub max_scroll_rounds: usize,
    pub enrich: bool,
    pub enrich_concurrency: usize,
}

impl Default for PublicScrapeOptions {
    fn default() -> Self {
        Self {
            links: LinkFilter::default(),
            navigation_timeout: Duration::from_secs(60),
            iframe_timeout: Duration::from_secs(15),
            max_scroll_rounds: 8,
            enrich: true,
            enrich_concurrency: DEFAULT_ENRICH_CONCURRENCY,
        }
    }
}

pub struct PublicPageScraper {
    options: PublicScrapeOptions,
    fetcher: Arc<dyn PageFetcher>,
    rules: Arc<LocationRules>,
}

impl PublicPageScraper {
    pub fn new(options: PublicScrapeOptions) -> Result<Self, ScrapeError> {
        Ok(Self::with_parts(
            options,
            Arc::new(HttpFetcher::new()?),
            Arc::new(LocationRules::default()),
        ))
    }

    pub fn with_parts(
        options: PublicScrapeOptions,
        fetcher: Arc<dyn PageFetcher>,
        rules: Arc<LocationRules>,
    ) -> Self {
        Self {
            options,
            fetcher,
            rules,
        }
    }

    pub fn options(&self) -> &PublicScrapeOptions {
        &self.options
    }
}

#[async_trait]
impl JobScraper for PublicPageScraper {
    async fn scrape(&self, url: &str) -> Result<ScrapeResult, ScrapeError> {
        let page_url = Url::parse(url).map_err(|e| ScrapeError::invalid_url(url, e))?;
        info!(url = %page_url, "Scraping public job page");

        let options = self.options.clone();
        let jobs = tokio::task::spawn_blocking(move || collect_job_links(&page_url, &options)).await??;
        info!(jobs = jobs.len(), "Collected job links");

        let jobs = if self.options.enrich {
            enrich_locations(
                jobs,
                Arc::clone(&self.fetcher),
                Arc::clone(&self.rules),
                self.options.enrich_concurrency,
            )
            .await
        } else {
            jobs
        };

        Ok(ScrapeResult::from_jobs(jobs))
    }
}

/// Browser part of the scrape. Blocking.
fn collect_job_links(page_url: &Url, options: &PublicScrapeOptions) -> Result<Vec<Job>, ScrapeError> {
    let browser = browser::launch(options.navigation_timeout * 2)?;
    let tab = browser::open_tab(&browser, options.navigation_timeout)?;
    browser::navigate(&tab, page_url.as_str())?;

    let current = Url::parse(&tab.get_url()).unwrap_or_else(|_| page_url.clone());
    let sources = browser::iframe_sources(&tab, options.iframe_timeout);
    let (vendor_frames, other_frames) = partition_frames(&current, &sources, &options.links);
    info!(
        vendor_frames = vendor_frames.len(),
        other_frames = other_frames.len(),
        "Discovered iframes"
    );

    let mut seen = HashSet::new();
    let mut jobs = Vec::new();

    if vendor_frames.is_empty() {
        let anchors = browser::scroll_until_stable(&tab, options.max_scroll_rounds);
        debug!(anchors, "Scraping main page");
        let html = tab.get_content()?;
        jobs.extend(options.links.extract_jobs_into(&html, &current, &mut seen));
    } else {
        for frame_url in &vendor_frames {
            // Cross-origin frames can't be scripted from the parent page,
            // so each one gets its own tab.
            let frame_tab = browser::open_tab(&browser, options.navigation_timeout)?;
            browser::navigate(&frame_tab, frame_url.as_str())?;
            let anchors = browser::scroll_until_stable(&frame_tab, options.max_scroll_rounds);
            debug!(frame = %frame_url, anchors, "Scraping vendor frame");

            let html = frame_tab.get_content()?;
            let base = Url::parse(&frame_tab.get_url()).unwrap_or_else(|_| frame_url.clone());
            jobs.extend(options.links.extract_jobs_into(&html, &base, &mut seen));
            if let Err(e) = frame_tab.close(true) {
                debug!(error = %e, "Failed to close frame tab");
            }
        }
    }

    Ok(jobs)
}

/// Splits iframe sources into vendor frames and everything else, resolving
/// relative sources against the page URL. Unparsable sources are dropped.
pub fn partition_frames(page_url: &Url, sources: &[String], links: &LinkFilter) -> (Vec<Url>, Vec<Url>) {
    let mut seen = HashSet::new();
    sources
        .iter()
        .filter_map(|src| page_url.join(src.trim()).ok())
        .filter(|u| matches!(u.scheme(), "http" | "https"))
        .filter(|u| seen.insert(u.to_string()))
        .partition(|u| links.is_vendor_host(u))
}
