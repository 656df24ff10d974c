//! Location enrichment: fetch each job's apply page and pull a location out
//! of its text.
//!
//! The heuristics are vendor-specific and break whenever the vendor changes
//! its markup, so they live in [`LocationRules`] and can be replaced from a
//! JSON file without a rebuild.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use common::Job;
use regex::Regex;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::ScrapeError;

pub const DEFAULT_ENRICH_CONCURRENCY: usize = 4;

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const DEFAULT_LOCATION_PATTERNS: &[&str] = &[
    r"(?im)^\s*location\s*[:\-]\s*(.+)$",
    r"(?im)^\s*(?:job|work)\s+location\s*[:\-]?\s*(.+)$",
    r"(?im)^\s*city\s*[:\-]\s*(.+)$",
    r"(?m)\b([A-Z][A-Za-z.'\-]+(?: [A-Z][A-Za-z.'\-]+)*,\s*(?:[A-Z]{2}|[A-Z][a-z]+(?: [A-Z][a-z]+)*))\b",
    r"(?i)\b(remote|hybrid)\b",
];

const DEFAULT_NOISE_PATTERNS: &[&str] = &[
    r"[<>{}=]",
    r"(?i)https?://|www\.",
    r"(?i)\.(js|css|png|jpe?g|svg|gif|webp|woff2?)\b",
    r"(?i)\bfunction\b|\bvar\s|window\.|document\.",
];

const MIN_LOCATION_LEN: usize = 2;
const MAX_LOCATION_LEN: usize = 80;

/// Ordered location patterns plus patterns that mark a candidate as noise.
/// The first capture group of each location pattern is the candidate.
#[derive(Debug, Clone)]
pub struct LocationRules {
    patterns: Vec<Regex>,
    noise: Vec<Regex>,
}

#[derive(Debug, Deserialize)]
struct LocationRulesFile {
    patterns: Vec<String>,
    #[serde(default)]
    noise: Option<Vec<String>>,
}

impl Default for LocationRules {
    fn default() -> Self {
        Self::from_patterns(DEFAULT_LOCATION_PATTERNS, DEFAULT_NOISE_PATTERNS)
            .expect("built-in location patterns compile")
    }
}

impl LocationRules {
    pub fn from_patterns<S: AsRef<str>>(patterns: &[S], noise: &[S]) -> Result<Self, ScrapeError> {
        Ok(Self {
            patterns: compile_all(patterns)?,
            noise: compile_all(noise)?,
        })
    }

    /// Loads rules from `{"patterns": [...], "noise": [...]}`. Without a
    /// `noise` list the built-in one is used.
    pub fn from_json_file(path: &Path) -> Result<Self, ScrapeError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ScrapeError::Rules(format!("{}: {e}", path.display())))?;
        let file: LocationRulesFile = serde_json::from_str(&raw)
            .map_err(|e| ScrapeError::Rules(format!("{}: {e}", path.display())))?;

        let noise = match file.noise {
            Some(noise) => compile_all(&noise)?,
            None => compile_all(DEFAULT_NOISE_PATTERNS)?,
        };
        Ok(Self {
            patterns: compile_all(&file.patterns)?,
            noise,
        })
    }

    /// Applies the patterns in order to already-stripped page text.
    pub fn extract(&self, text: &str) -> Option<String> {
        for pattern in &self.patterns {
            for caps in pattern.captures_iter(text) {
                let Some(candidate) = caps.get(1).or_else(|| caps.get(0)) else {
                    continue;
                };
                let candidate = candidate
                    .as_str()
                    .trim()
                    .trim_end_matches(['.', ',', ';', '|', '-'])
                    .trim();
                if self.is_plausible(candidate) {
                    return Some(candidate.to_string());
                }
            }
        }
        None
    }

    fn is_plausible(&self, candidate: &str) -> bool {
        let len = candidate.chars().count();
        (MIN_LOCATION_LEN..=MAX_LOCATION_LEN).contains(&len)
            && !self.noise.iter().any(|n| n.is_match(candidate))
    }
}

fn compile_all<S: AsRef<str>>(patterns: &[S]) -> Result<Vec<Regex>, ScrapeError> {
    patterns
        .iter()
        .map(|p| {
            Regex::new(p.as_ref()).map_err(|source| ScrapeError::Pattern {
                pattern: p.as_ref().to_string(),
                source,
            })
        })
        .collect()
}

/// Drops scripts, styles and tags, decodes the common entities, and returns
/// the remaining text one trimmed block per line.
pub fn strip_markup(html: &str) -> String {
    static HIDDEN_BLOCKS: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?is)<(script|style|noscript|template)\b.*?</(script|style|noscript|template)\s*>")
            .expect("static pattern")
    });
    static COMMENTS: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("static pattern"));
    static TAGS: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("static pattern"));

    let without_blocks = HIDDEN_BLOCKS.replace_all(html, "\n");
    let without_comments = COMMENTS.replace_all(&without_blocks, "\n");
    let text = TAGS.replace_all(&without_comments, "\n");
    let text = decode_entities(&text);

    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&#160;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Fetches the HTML of a page.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, ScrapeError>;
}

/// [`PageFetcher`] over plain HTTP.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, ScrapeError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(20))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, ScrapeError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response.text().await?)
    }
}

/// Fills in `location` for every job that has a link and no location yet.
///
/// `concurrency` workers share one queue of job indices, so at most that
/// many pages are fetched at once. A failed fetch leaves the job untouched.
pub async fn enrich_locations(
    jobs: Vec<Job>,
    fetcher: Arc<dyn PageFetcher>,
    rules: Arc<LocationRules>,
    concurrency: usize,
) -> Vec<Job> {
    let queue: VecDeque<(usize, String)> = jobs
        .iter()
        .enumerate()
        .filter(|(_, job)| job.location.is_none())
        .filter_map(|(i, job)| job.link().map(|link| (i, link.to_string())))
        .collect();

    if queue.is_empty() {
        return jobs;
    }

    let workers = concurrency.max(1).min(queue.len());
    info!(pending = queue.len(), workers, "Enriching job locations");

    let queue = Arc::new(Mutex::new(queue));
    let mut handles = Vec::with_capacity(workers);

    for worker_id in 0..workers {
        let queue = Arc::clone(&queue);
        let fetcher = Arc::clone(&fetcher);
        let rules = Arc::clone(&rules);

        handles.push(tokio::spawn(async move {
            let mut found = Vec::new();
            loop {
                let next = queue.lock().await.pop_front();
                let Some((index, url)) = next else {
                    break;
                };

                match fetcher.fetch(&url).await {
                    Ok(html) => match rules.extract(&strip_markup(&html)) {
                        Some(location) => found.push((index, location)),
                        None => debug!(worker_id, url = %url, "No location on apply page"),
                    },
                    Err(e) => debug!(worker_id, url = %url, error = %e, "Apply page fetch failed"),
                }
            }
            found
        }));
    }

    let mut jobs = jobs;
    let mut enriched = 0usize;
    for handle in handles {
        match handle.await {
            Ok(found) => {
                for (index, location) in found {
                    if let Some(job) = jobs.get_mut(index) {
                        job.location = Some(location);
                        enriched += 1;
                    }
                }
            }
            Err(e) => debug!(error = %e, "Enrichment worker aborted"),
        }
    }

    info!(enriched, total = jobs.len(), "Location enrichment finished");
    jobs
}
