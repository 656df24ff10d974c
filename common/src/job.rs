use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A job posting as scraped from one of the sources.
///
/// Every field is optional: the public page, the authenticated API and RSS
/// feeds each fill a different subset. Fields we don't model are kept in
/// `extra` so they survive a trip through the cache file.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct Job {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Job {
    pub fn display_name(&self) -> Option<&str> {
        self.name
            .as_deref()
            .or(self.title.as_deref())
            .filter(|s| !s.trim().is_empty())
    }

    /// The best link to the posting, preferring the apply page.
    pub fn link(&self) -> Option<&str> {
        non_empty(self.application_url.as_deref()).or(non_empty(self.url.as_deref()))
    }

    pub fn has_application_link(&self) -> bool {
        non_empty(self.application_url.as_deref()).is_some()
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.trim().is_empty())
}

/// The output of one scrape: the jobs plus the two counters the site shows.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct ScrapeResult {
    pub total: usize,
    pub with_application_link: usize,
    pub data: Vec<Job>,
}

impl ScrapeResult {
    pub fn from_jobs(data: Vec<Job>) -> Self {
        let with_application_link = data.iter().filter(|j| j.has_application_link()).count();
        Self {
            total: data.len(),
            with_application_link,
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job_with_link(link: Option<&str>) -> Job {
        Job {
            application_url: link.map(str::to_string),
            ..Job::default()
        }
    }

    #[test]
    fn test_from_jobs_counts_application_links() {
        let result = ScrapeResult::from_jobs(vec![
            job_with_link(Some("https://recruitcrm.io/apply/1")),
            job_with_link(None),
            job_with_link(Some("  ")),
        ]);
        assert_eq!(result.total, 3);
        assert_eq!(result.with_application_link, 1);
        assert!(result.with_application_link <= result.total);
    }

    #[test]
    fn test_display_name_falls_back_to_title() {
        let job = Job {
            title: Some("Forklift Operator".into()),
            ..Job::default()
        };
        assert_eq!(job.display_name(), Some("Forklift Operator"));
    }

    #[test]
    fn test_link_prefers_application_url() {
        let job = Job {
            url: Some("https://example.com/feed/1".into()),
            application_url: Some("https://recruitcrm.io/apply/1".into()),
            ..Job::default()
        };
        assert_eq!(job.link(), Some("https://recruitcrm.io/apply/1"));
    }

    #[test]
    fn test_unknown_fields_are_preserved() {
        let raw = r#"{"id":"7","name":"Nurse","salary_raw":"$30/hr","remote":true}"#;
        let job: Job = serde_json::from_str(raw).unwrap();
        assert_eq!(job.extra.get("salary_raw"), Some(&Value::from("$30/hr")));

        let back = serde_json::to_value(&job).unwrap();
        assert_eq!(back["remote"], Value::Bool(true));
        assert!(back.get("location").is_none());
    }
}
