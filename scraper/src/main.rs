//! Recruit CRM job scraper
//!
//! Scrapes the public job board (or the logged-in app, or an RSS feed) and
//! saves the result to data/jobs-public.json.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use common::JobsCache;
use crm_scraper::enrich::DEFAULT_ENRICH_CONCURRENCY;
use crm_scraper::links::{DEFAULT_JOB_PATH_PATTERN, DEFAULT_VENDOR_DOMAIN};
use crm_scraper::{
    authenticated, rss, AuthScrapeOptions, AuthenticatedScraper, Credentials, HttpFetcher,
    JobScraper, LinkFilter, LocationRules, PublicPageScraper, PublicScrapeOptions,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "crm-scraper", about = "Pull job listings from the recruitment CRM")]
struct Cli {
    /// CRM domain whose links count as job postings
    #[arg(long, env = "JOBS_VENDOR_DOMAIN", default_value = DEFAULT_VENDOR_DOMAIN, global = true)]
    vendor_domain: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scrape the public job board and overwrite the cache file
    Public {
        #[arg(long, env = "JOBS_PUBLIC_URL", default_value = crm_scraper::public::DEFAULT_PUBLIC_URL)]
        url: String,

        #[arg(long, env = "JOBS_CACHE_PATH", default_value = common::DEFAULT_CACHE_PATH)]
        out: PathBuf,

        /// Skip fetching each apply page for a location
        #[arg(long)]
        no_enrich: bool,

        #[arg(long, env = "JOBS_ENRICH_CONCURRENCY", default_value_t = DEFAULT_ENRICH_CONCURRENCY)]
        concurrency: usize,

        /// JSON file with {"patterns": [...], "noise": [...]}
        #[arg(long, env = "JOBS_LOCATION_RULES_FILE")]
        location_rules: Option<PathBuf>,
    },
    /// Log into the CRM app and print what it returns
    Authenticated {
        #[arg(long, env = "RECRUITCRM_EMAIL")]
        email: String,

        #[arg(long, env = "RECRUITCRM_PASSWORD", hide_env_values = true)]
        password: String,

        #[arg(long, env = "RECRUITCRM_LOGIN_URL", default_value = authenticated::DEFAULT_LOGIN_URL)]
        login_url: String,

        #[arg(long, env = "RECRUITCRM_JOBS_API_URL", default_value = authenticated::DEFAULT_JOBS_API_URL)]
        api_url: String,

        #[arg(long, env = "RECRUITCRM_JOBS_PAGE_URL", default_value = authenticated::DEFAULT_JOBS_PAGE_URL)]
        jobs_page_url: String,
    },
    /// Read an RSS/Atom job feed and print the jobs
    Rss {
        #[arg(long, env = "JOBS_RSS_URL")]
        url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("crm_scraper=info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let links = LinkFilter::new(&cli.vendor_domain, DEFAULT_JOB_PATH_PATTERN)?;

    match cli.command {
        Command::Public {
            url,
            out,
            no_enrich,
            concurrency,
            location_rules,
        } => {
            if concurrency == 0 {
                bail!("--concurrency must be at least 1");
            }
            let rules = match location_rules {
                Some(path) => LocationRules::from_json_file(&path)?,
                None => LocationRules::default(),
            };
            let options = PublicScrapeOptions {
                links,
                enrich: !no_enrich,
                enrich_concurrency: concurrency,
                ..PublicScrapeOptions::default()
            };
            let scraper =
                PublicPageScraper::with_parts(options, Arc::new(HttpFetcher::new()?), Arc::new(rules));

            let result = scraper
                .scrape(&url)
                .await
                .with_context(|| format!("Scrape of {url} failed"))?;
            let doc = JobsCache::new(&out).write(result, Some(url))?;
            info!(
                total = doc.total,
                with_application_link = doc.with_application_link,
                path = %out.display(),
                "Saved jobs"
            );
        }
        Command::Authenticated {
            email,
            password,
            login_url,
            api_url,
            jobs_page_url,
        } => {
            let scraper = AuthenticatedScraper::new(AuthScrapeOptions {
                login_url,
                jobs_api_url: api_url,
                jobs_page_url,
                links,
                ..AuthScrapeOptions::default()
            });
            let outcome = scraper.scrape(&Credentials { email, password }).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Command::Rss { url } => {
            let client = reqwest::Client::new();
            let result = rss::fetch_rss(&client, &url).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }

    Ok(())
}
