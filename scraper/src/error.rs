use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Anything `headless_chrome` reports: launch, navigation, evaluation.
    #[error("Browser automation failed: {0}")]
    Browser(#[from] anyhow::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} for {url}")]
    Status { status: u16, url: String },

    #[error("Invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Invalid feed: {0}")]
    Feed(String),

    #[error("Invalid pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Failed to read location rules: {0}")]
    Rules(String),

    #[error("Scrape task aborted: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl ScrapeError {
    pub(crate) fn invalid_url(url: &str, source: url::ParseError) -> Self {
        Self::InvalidUrl {
            url: url.to_string(),
            source,
        }
    }
}
