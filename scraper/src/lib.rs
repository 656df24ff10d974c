//! Job ingestion from the recruitment CRM: the public job board (rendered
//! in a headless browser), the logged-in app, and RSS feeds.

pub mod authenticated;
pub mod browser;
pub mod enrich;
pub mod error;
pub mod links;
pub mod public;
pub mod rss;

use async_trait::async_trait;
use common::ScrapeResult;

pub use authenticated::{AuthOutcome, AuthScrapeOptions, AuthenticatedScraper, Credentials};
pub use enrich::{HttpFetcher, LocationRules, PageFetcher};
pub use error::ScrapeError;
pub use links::LinkFilter;
pub use public::{PublicPageScraper, PublicScrapeOptions};

/// Produces a fresh job list from a listing page.
#[async_trait]
pub trait JobScraper: Send + Sync {
    async fn scrape(&self, url: &str) -> Result<ScrapeResult, ScrapeError>;
}
