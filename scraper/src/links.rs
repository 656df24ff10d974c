//! Turning rendered HTML into job postings: which anchors count as jobs,
//! and how they are deduplicated.

use std::collections::HashSet;
use std::sync::LazyLock;

use common::Job;
use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

use crate::error::ScrapeError;

pub const DEFAULT_VENDOR_DOMAIN: &str = "recruitcrm.io";
pub const DEFAULT_JOB_PATH_PATTERN: &str = r"(?i)/(jobs?|apply)(/|$)";

static ANCHOR_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("static selector"));

/// Which links belong to the CRM vendor and look like job postings.
#[derive(Debug, Clone)]
pub struct LinkFilter {
    vendor_domain: String,
    job_path: Regex,
}

impl Default for LinkFilter {
    fn default() -> Self {
        Self {
            vendor_domain: DEFAULT_VENDOR_DOMAIN.to_string(),
            job_path: Regex::new(DEFAULT_JOB_PATH_PATTERN).expect("static pattern"),
        }
    }
}

impl LinkFilter {
    pub fn new(vendor_domain: &str, job_path_pattern: &str) -> Result<Self, ScrapeError> {
        let job_path = Regex::new(job_path_pattern).map_err(|source| ScrapeError::Pattern {
            pattern: job_path_pattern.to_string(),
            source,
        })?;
        Ok(Self {
            vendor_domain: vendor_domain.trim().trim_start_matches('.').to_lowercase(),
            job_path,
        })
    }

    pub fn vendor_domain(&self) -> &str {
        &self.vendor_domain
    }

    /// The host is the vendor domain itself or one of its subdomains.
    pub fn is_vendor_host(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        let host = host.to_lowercase();
        host == self.vendor_domain
            || host
                .strip_suffix(&self.vendor_domain)
                .is_some_and(|prefix| prefix.ends_with('.'))
    }

    pub fn is_job_link(&self, url: &Url) -> bool {
        matches!(url.scheme(), "http" | "https")
            && self.is_vendor_host(url)
            && self.job_path.is_match(url.path())
    }

    /// Extracts vendor job links from a document rendered at `base`.
    /// Relative links are resolved against `base`; duplicates (same absolute
    /// URL) keep their first occurrence.
    pub fn extract_jobs(&self, html: &str, base: &Url) -> Vec<Job> {
        let mut seen = HashSet::new();
        self.extract_jobs_into(html, base, &mut seen)
    }

    /// Like [`extract_jobs`](Self::extract_jobs) but shares the `seen` set
    /// across several documents (one per frame).
    pub fn extract_jobs_into(
        &self,
        html: &str,
        base: &Url,
        seen: &mut HashSet<String>,
    ) -> Vec<Job> {
        let document = Html::parse_document(html);
        let mut jobs = Vec::new();

        for anchor in document.select(&ANCHOR_SELECTOR) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            let Ok(mut absolute) = base.join(href.trim()) else {
                continue;
            };
            absolute.set_fragment(None);
            if !self.is_job_link(&absolute) {
                continue;
            }

            let key = absolute.to_string();
            if !seen.insert(key.clone()) {
                continue;
            }

            let text = collapse_whitespace(&anchor.text().collect::<String>());
            let name = if text.is_empty() {
                anchor.value().attr("title").map(collapse_whitespace)
            } else {
                Some(text)
            };

            jobs.push(Job {
                id: last_path_segment(&absolute),
                name: name.filter(|n| !n.is_empty()),
                application_url: Some(key.clone()),
                url: Some(key),
                source: Some("public".to_string()),
                ..Job::default()
            });
        }

        jobs
    }
}

pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn last_path_segment(url: &Url) -> Option<String> {
    static SLUG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[\w-]+$").expect("static pattern"));
    url.path_segments()?
        .filter(|s| !s.is_empty())
        .last()
        .filter(|s| SLUG.is_match(s))
        .map(str::to_string)
}
