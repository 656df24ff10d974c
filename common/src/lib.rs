//! Shared job model and the on-disk job cache used by the scraper and the server.

pub mod cache;
pub mod job;

pub use cache::{CacheError, CachedJobsDocument, JobsCache, DEFAULT_CACHE_PATH};
pub use job::{Job, ScrapeResult};
