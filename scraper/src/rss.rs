//! RSS 2.0 / Atom job feeds.

use common::{Job, ScrapeResult};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde_json::Value;
use tracing::info;

use crate::error::ScrapeError;

pub async fn fetch_rss(client: &reqwest::Client, url: &str) -> Result<ScrapeResult, ScrapeError> {
    info!(url = %url, "Fetching job feed");
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(ScrapeError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }
    let body = response.text().await?;
    let jobs = parse_rss(&body)?;
    info!(url = %url, jobs = jobs.len(), "Parsed job feed");
    Ok(ScrapeResult::from_jobs(jobs))
}

/// Maps every `<item>` (RSS) or `<entry>` (Atom) to a job.
pub fn parse_rss(xml: &str) -> Result<Vec<Job>, ScrapeError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut saw_feed_root = false;
    let mut jobs = Vec::new();
    let mut current: Option<Job> = None;
    // Depth below the current item; fields are its direct children only.
    let mut depth = 0usize;
    let mut field: Option<String> = None;
    let mut text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = qualified_name(&e);
                if current.is_some() {
                    depth += 1;
                    if depth == 1 {
                        field = Some(name);
                        text.clear();
                    }
                } else if is_item(&name) {
                    current = Some(Job {
                        source: Some("rss".to_string()),
                        ..Job::default()
                    });
                    depth = 0;
                } else if matches!(name.as_str(), "rss" | "feed" | "rdf:RDF") {
                    saw_feed_root = true;
                }
            }
            Ok(Event::Empty(e)) => {
                if let Some(job) = current.as_mut().filter(|_| depth == 0) {
                    if qualified_name(&e) == "link" {
                        if let Some(href) = attribute(&e, b"href") {
                            job.url.get_or_insert_with(|| href.clone());
                            job.application_url.get_or_insert(href);
                        }
                    }
                }
            }
            Ok(Event::Text(e)) => {
                if field.is_some() {
                    let chunk = e
                        .unescape()
                        .map_err(|err| ScrapeError::Feed(err.to_string()))?;
                    text.push_str(&chunk);
                }
            }
            Ok(Event::CData(e)) => {
                if field.is_some() {
                    text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Ok(Event::End(_)) => {
                if current.is_none() {
                    continue;
                }
                if depth == 0 {
                    if let Some(job) = current.take() {
                        jobs.push(job);
                    }
                    continue;
                }
                if depth == 1 {
                    if let (Some(job), Some(name)) = (current.as_mut(), field.take()) {
                        assign_field(job, &name, text.trim());
                    }
                }
                depth -= 1;
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ScrapeError::Feed(format!(
                    "XML error at byte {}: {e}",
                    reader.buffer_position()
                )))
            }
            _ => {}
        }
    }

    if !saw_feed_root {
        return Err(ScrapeError::Feed("Not an RSS or Atom document".to_string()));
    }
    Ok(jobs)
}

fn is_item(name: &str) -> bool {
    matches!(name, "item" | "entry")
}

fn qualified_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

fn attribute(e: &BytesStart, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .and_then(|a| a.unescape_value().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn assign_field(job: &mut Job, name: &str, value: &str) {
    if value.is_empty() {
        return;
    }
    let value = value.to_string();
    match name {
        "title" => job.name = Some(value),
        "link" => {
            job.url = Some(value.clone());
            job.application_url = Some(value);
        }
        "guid" | "id" => job.id = Some(value),
        "description" | "summary" | "content" | "content:encoded" => {
            job.description.get_or_insert(value);
        }
        "pubDate" | "published" | "updated" | "dc:date" => {
            job.published_at.get_or_insert(value);
        }
        "author" | "dc:creator" | "company" => {
            job.company_name.get_or_insert(value);
        }
        "region" | "location" | "job_listing:location" => job.location = Some(value),
        "category" => {
            // Job boards put the location in the first category; an explicit
            // region or location element still wins.
            if job.location.is_none() {
                job.location = Some(value.clone());
            }
            let categories = job
                .extra
                .entry("categories")
                .or_insert_with(|| Value::Array(Vec::new()));
            if let Value::Array(list) = categories {
                list.push(Value::String(value));
            }
        }
        _ => {}
    }
}
