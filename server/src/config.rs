use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use crm_scraper::authenticated::{
    DEFAULT_JOBS_API_URL, DEFAULT_JOBS_PAGE_URL, DEFAULT_LOGIN_URL,
};
use crm_scraper::enrich::DEFAULT_ENRICH_CONCURRENCY;
use crm_scraper::links::DEFAULT_VENDOR_DOMAIN;
use crm_scraper::public::DEFAULT_PUBLIC_URL;
use crm_scraper::Credentials;

const DEFAULT_CACHE_MAX_AGE_SECS: u64 = 6 * 60 * 60;

/// Application configuration loaded from environment variables.
/// Everything has a default except the CRM login, which is optional.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    pub cache_path: PathBuf,
    pub public_url: String,
    pub cache_max_age: Duration,
    pub vendor_domain: String,
    pub enrich_locations: bool,
    pub enrich_concurrency: usize,
    pub location_rules_file: Option<PathBuf>,
    pub rss_url: Option<String>,
    pub crm_credentials: Option<Credentials>,
    pub login_url: String,
    pub jobs_api_url: String,
    pub jobs_page_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let or = |key: &str, default: &str| var(key).unwrap_or_else(|| default.to_string());

        let crm_credentials = match (var("RECRUITCRM_EMAIL"), var("RECRUITCRM_PASSWORD")) {
            (Some(email), Some(password)) => Some(Credentials { email, password }),
            _ => None,
        };

        let enrich_concurrency: usize = parse_or(
            var("JOBS_ENRICH_CONCURRENCY"),
            "JOBS_ENRICH_CONCURRENCY",
            DEFAULT_ENRICH_CONCURRENCY,
        )?;
        if enrich_concurrency == 0 {
            bail!("JOBS_ENRICH_CONCURRENCY must be at least 1");
        }

        Ok(Config {
            port: parse_or(var("PORT"), "PORT", 3000)?,
            rust_log: or("RUST_LOG", "info"),
            cache_path: PathBuf::from(or("JOBS_CACHE_PATH", common::DEFAULT_CACHE_PATH)),
            public_url: or("JOBS_PUBLIC_URL", DEFAULT_PUBLIC_URL),
            cache_max_age: Duration::from_secs(parse_or(
                var("JOBS_CACHE_MAX_AGE_SECS"),
                "JOBS_CACHE_MAX_AGE_SECS",
                DEFAULT_CACHE_MAX_AGE_SECS,
            )?),
            vendor_domain: or("JOBS_VENDOR_DOMAIN", DEFAULT_VENDOR_DOMAIN),
            enrich_locations: match var("JOBS_ENRICH_LOCATIONS") {
                Some(v) => parse_flag(&v)
                    .with_context(|| format!("JOBS_ENRICH_LOCATIONS must be true or false, got '{v}'"))?,
                None => true,
            },
            enrich_concurrency,
            location_rules_file: var("JOBS_LOCATION_RULES_FILE").map(PathBuf::from),
            rss_url: var("JOBS_RSS_URL"),
            crm_credentials,
            login_url: or("RECRUITCRM_LOGIN_URL", DEFAULT_LOGIN_URL),
            jobs_api_url: or("RECRUITCRM_JOBS_API_URL", DEFAULT_JOBS_API_URL),
            jobs_page_url: or("RECRUITCRM_JOBS_PAGE_URL", DEFAULT_JOBS_PAGE_URL),
        })
    }
}

fn parse_or<T>(value: Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match value {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value '{raw}'")),
        None => Ok(default),
    }
}

/// Accepts the usual spellings of a boolean switch.
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "" | "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.cache_path, PathBuf::from("data/jobs-public.json"));
        assert_eq!(config.cache_max_age, Duration::from_secs(21_600));
        assert_eq!(config.vendor_domain, "recruitcrm.io");
        assert!(config.enrich_locations);
        assert_eq!(config.enrich_concurrency, 4);
        assert!(config.crm_credentials.is_none());
        assert!(config.rss_url.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("PORT", "8088"),
            ("JOBS_CACHE_MAX_AGE_SECS", "60"),
            ("JOBS_ENRICH_LOCATIONS", "off"),
            ("RECRUITCRM_EMAIL", "ops@example.com"),
            ("RECRUITCRM_PASSWORD", "secret"),
            ("JOBS_RSS_URL", "  "),
        ])
        .unwrap();
        assert_eq!(config.port, 8088);
        assert_eq!(config.cache_max_age, Duration::from_secs(60));
        assert!(!config.enrich_locations);
        assert_eq!(
            config.crm_credentials.map(|c| c.email).as_deref(),
            Some("ops@example.com")
        );
        assert!(config.rss_url.is_none());
    }

    #[test]
    fn test_credentials_need_both_parts() {
        let config = config_from(&[("RECRUITCRM_EMAIL", "ops@example.com")]).unwrap();
        assert!(config.crm_credentials.is_none());
    }

    #[test]
    fn test_invalid_values_are_errors() {
        assert!(config_from(&[("PORT", "eighty")]).is_err());
        assert!(config_from(&[("JOBS_ENRICH_CONCURRENCY", "0")]).is_err());
        assert!(config_from(&[("JOBS_ENRICH_LOCATIONS", "maybe")]).is_err());
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag(""), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("sometimes"), None);
    }
}
