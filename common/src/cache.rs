//! Single-document JSON cache of the last successful scrape.
//!
//! The file is overwritten wholesale on every write. There is no locking and
//! no temp-file-and-rename: one process writes, last writer wins.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::job::{Job, ScrapeResult};

pub const DEFAULT_CACHE_PATH: &str = "data/jobs-public.json";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Failed to write cache file '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize cache document: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// The document persisted at the cache path.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CachedJobsDocument {
    #[serde(default)]
    pub total: usize,
    #[serde(default, rename = "with_application_link")]
    pub with_application_link: usize,
    #[serde(default)]
    pub data: Vec<Job>,
    /// RFC 3339 timestamp. Kept as text so a hand-edited or corrupt value
    /// still loads; it just never counts as fresh.
    #[serde(default)]
    pub last_updated: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
}

impl CachedJobsDocument {
    pub fn last_updated_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.last_updated)
            .ok()
            .map(|ts| ts.with_timezone(&Utc))
    }
}

#[derive(Debug, Clone)]
pub struct JobsCache {
    path: PathBuf,
}

impl Default for JobsCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_PATH)
    }
}

impl JobsCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the cached document. Missing or unparsable files yield `None`.
    pub fn read(&self) -> Option<CachedJobsDocument> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "No readable jobs cache");
                return None;
            }
        };

        match serde_json::from_str(&content) {
            Ok(doc) => Some(doc),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring unparsable jobs cache");
                None
            }
        }
    }

    /// Stamps `lastUpdated` onto the snapshot and overwrites the cache file.
    pub fn write(
        &self,
        snapshot: ScrapeResult,
        source_url: Option<String>,
    ) -> Result<CachedJobsDocument, CacheError> {
        let doc = CachedJobsDocument {
            total: snapshot.total,
            with_application_link: snapshot.with_application_link,
            data: snapshot.data,
            last_updated: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            source_url,
        };

        let json = serde_json::to_string_pretty(&doc)?;

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|source| CacheError::Write {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        fs::write(&self.path, json).map_err(|source| CacheError::Write {
            path: self.path.clone(),
            source,
        })?;

        debug!(path = %self.path.display(), total = doc.total, "Wrote jobs cache");
        Ok(doc)
    }

    pub fn is_fresh(doc: Option<&CachedJobsDocument>, max_age: Duration) -> bool {
        Self::is_fresh_at(doc, max_age, Utc::now())
    }

    /// Fresh means `now - lastUpdated < max_age`. A timestamp from the
    /// future has age zero.
    pub fn is_fresh_at(
        doc: Option<&CachedJobsDocument>,
        max_age: Duration,
        now: DateTime<Utc>,
    ) -> bool {
        let Some(updated) = doc.and_then(CachedJobsDocument::last_updated_at) else {
            return false;
        };
        let max_age = TimeDelta::from_std(max_age).unwrap_or(TimeDelta::MAX);
        let age = (now - updated).max(TimeDelta::zero());
        age < max_age
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn doc_updated_at(ts: DateTime<Utc>) -> CachedJobsDocument {
        CachedJobsDocument {
            total: 0,
            with_application_link: 0,
            data: vec![],
            last_updated: ts.to_rfc3339(),
            source_url: None,
        }
    }

    fn sample_jobs() -> Vec<Job> {
        vec![
            Job {
                id: Some("101".into()),
                name: Some("Warehouse Associate".into()),
                application_url: Some("https://recruitcrm.io/apply/101".into()),
                ..Job::default()
            },
            Job {
                id: Some("102".into()),
                name: Some("Dispatcher".into()),
                ..Job::default()
            },
        ]
    }

    #[test]
    fn test_read_missing_file_is_none() {
        let dir = TempDir::new().unwrap();
        let cache = JobsCache::new(dir.path().join("nope.json"));
        assert!(cache.read().is_none());
    }

    #[test]
    fn test_read_garbage_is_none() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("jobs.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(JobsCache::new(path).read().is_none());
    }

    #[test]
    fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let cache = JobsCache::new(dir.path().join("data").join("jobs-public.json"));
        let before = Utc::now();

        let written = cache
            .write(
                ScrapeResult::from_jobs(sample_jobs()),
                Some("https://example.com/careers".into()),
            )
            .unwrap();
        let read = cache.read().unwrap();

        assert_eq!(read, written);
        assert_eq!(read.total, 2);
        assert_eq!(read.with_application_link, 1);
        assert_eq!(read.data, sample_jobs());
        assert_eq!(read.source_url.as_deref(), Some("https://example.com/careers"));

        let stamped = read.last_updated_at().unwrap();
        assert!(stamped >= before - TimeDelta::seconds(1));
        assert!(stamped <= Utc::now() + TimeDelta::seconds(1));
    }

    #[test]
    fn test_file_uses_camel_case_timestamp_keys() {
        let dir = TempDir::new().unwrap();
        let cache = JobsCache::new(dir.path().join("jobs.json"));
        cache.write(ScrapeResult::default(), None).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(cache.path()).unwrap()).unwrap();
        assert!(raw.get("lastUpdated").is_some());
        assert!(raw.get("with_application_link").is_some());
        assert!(raw.get("sourceUrl").is_none());
    }

    #[test]
    fn test_write_overwrites_previous_document() {
        let dir = TempDir::new().unwrap();
        let cache = JobsCache::new(dir.path().join("jobs.json"));
        cache.write(ScrapeResult::from_jobs(sample_jobs()), None).unwrap();
        cache.write(ScrapeResult::default(), None).unwrap();

        let read = cache.read().unwrap();
        assert_eq!(read.total, 0);
        assert!(read.data.is_empty());
    }

    #[test]
    fn test_is_fresh_none() {
        assert!(!JobsCache::is_fresh(None, Duration::from_secs(60)));
    }

    #[test]
    fn test_is_fresh_boundary() {
        let now = Utc::now();
        let max_age = Duration::from_secs(60);

        let just_inside = doc_updated_at(now - TimeDelta::seconds(59));
        let exactly = doc_updated_at(now - TimeDelta::seconds(60));
        let past = doc_updated_at(now - TimeDelta::seconds(61));

        assert!(JobsCache::is_fresh_at(Some(&just_inside), max_age, now));
        assert!(!JobsCache::is_fresh_at(Some(&exactly), max_age, now));
        assert!(!JobsCache::is_fresh_at(Some(&past), max_age, now));
    }

    #[test]
    fn test_is_fresh_bad_timestamp() {
        let mut doc = doc_updated_at(Utc::now());
        doc.last_updated = "yesterday-ish".into();
        assert!(!JobsCache::is_fresh(Some(&doc), Duration::from_secs(3600)));
    }

    #[test]
    fn test_future_timestamp_is_fresh() {
        let now = Utc::now();
        let doc = doc_updated_at(now + TimeDelta::seconds(30));
        assert!(JobsCache::is_fresh_at(Some(&doc), Duration::from_secs(1), now));
    }
}
