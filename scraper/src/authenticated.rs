//! Scraper for the CRM's logged-in web app.
//!
//! Login is driven through the real form. Once in, data comes from the best
//! source that yields anything: the internal JSON API, then job anchors in
//! the DOM, then job IDs guessed from attributes and text. Vendor UI drift
//! during login produces a [`LoginDiagnostic`] instead of an error.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock};
use std::thread;
use std::time::{Duration, Instant};

use common::{Job, ScrapeResult};
use headless_chrome::Tab;
use regex::Regex;
use scraper::{Html, Selector};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use crate::browser;
use crate::enrich::strip_markup;
use crate::error::ScrapeError;
use crate::links::{collapse_whitespace, LinkFilter};

pub const DEFAULT_LOGIN_URL: &str = "https://app.recruitcrm.io/log-in";
pub const DEFAULT_JOBS_API_URL: &str = "https://app.recruitcrm.io/api/v1/jobs?page={page}&limit=100";
pub const DEFAULT_JOBS_PAGE_URL: &str = "https://app.recruitcrm.io/jobs";
pub const DEFAULT_PUBLIC_APPLY_URL: &str = "https://recruitcrm.io/apply/{id}";

const RESPONSE_HANDLER: &str = "login-watch";
const POLL_INTERVAL: Duration = Duration::from_millis(500);
const FORM_TIMEOUT: Duration = Duration::from_secs(15);
const MAX_DIAGNOSTIC_CONTROLS: usize = 20;
const MAX_DIAGNOSTIC_TEXT: usize = 2000;

const EMAIL_SELECTORS: &[&str] = &[
    "input[type='email']",
    "input[name='email']",
    "input[name='username']",
    "input[autocomplete='username']",
];
const PASSWORD_SELECTORS: &[&str] = &["input[type='password']", "input[name='password']"];
const SUBMIT_SELECTORS: &[&str] = &[
    "button[type='submit']",
    "input[type='submit']",
    "form button",
];

#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct AuthScrapeOptions {
    pub login_url: String,
    /// Jobs endpoint with a `{page}` placeholder.
    pub jobs_api_url: String,
    pub jobs_page_url: String,
    /// Public apply link with an `{id}` placeholder, used when the API or
    /// the ID heuristics give us an id but no link.
    pub public_apply_url: String,
    pub links: LinkFilter,
    pub navigation_timeout: Duration,
    pub login_timeout: Duration,
    pub max_api_pages: u32,
    pub max_scroll_rounds: usize,
}

impl Default for AuthScrapeOptions {
    fn default() -> Self {
        Self {
            login_url: DEFAULT_LOGIN_URL.to_string(),
            jobs_api_url: DEFAULT_JOBS_API_URL.to_string(),
            jobs_page_url: DEFAULT_JOBS_PAGE_URL.to_string(),
            public_apply_url: DEFAULT_PUBLIC_APPLY_URL.to_string(),
            links: LinkFilter::default(),
            navigation_timeout: Duration::from_secs(60),
            login_timeout: Duration::from_secs(30),
            max_api_pages: 20,
            max_scroll_rounds: 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginState {
    NotLoggedIn,
    LoginPending,
    LoggedIn,
}

impl LoginState {
    pub fn submit(self) -> Self {
        match self {
            LoginState::NotLoggedIn => LoginState::LoginPending,
            other => other,
        }
    }

    /// A pending login completes once the page has left the login screen
    /// or the vendor API has answered a request successfully.
    pub fn observe(self, current_url: &str, api_ok: bool, login_path: &str) -> Self {
        match self {
            LoginState::LoginPending if api_ok || left_login_page(current_url, login_path) => {
                LoginState::LoggedIn
            }
            other => other,
        }
    }
}

/// Whether the jobs API has answered with JSON since the login was
/// submitted. Responses recorded before [`arm`](Self::arm) are ignored, so
/// calls the login page makes while loading can't complete a login.
#[derive(Debug, Default)]
pub struct ApiSignal {
    armed: AtomicBool,
    seen: AtomicBool,
}

impl ApiSignal {
    pub fn arm(&self) {
        self.seen.store(false, Ordering::SeqCst);
        self.armed.store(true, Ordering::SeqCst);
    }

    pub fn record(&self, url: &str, status: u32, mime_type: &str, api_prefix: &str) {
        if self.armed.load(Ordering::SeqCst)
            && (200..300).contains(&status)
            && mime_type.contains("json")
            && !api_prefix.is_empty()
            && url.starts_with(api_prefix)
        {
            self.seen.store(true, Ordering::SeqCst);
        }
    }

    pub fn seen(&self) -> bool {
        self.seen.load(Ordering::SeqCst)
    }
}

/// The jobs endpoint without its query or `{page}` placeholder. Only
/// responses under it count as proof of a session; the login POST's own
/// response does not.
pub fn api_prefix(jobs_api_url: &str) -> String {
    jobs_api_url
        .split(['?', '{'])
        .next()
        .unwrap_or_default()
        .to_string()
}

fn left_login_page(current_url: &str, login_path: &str) -> bool {
    let Ok(url) = Url::parse(current_url) else {
        return false;
    };
    if !matches!(url.scheme(), "http" | "https") {
        return false;
    }
    let path = url.path().to_lowercase();
    let on_login = (!login_path.is_empty() && path.starts_with(&login_path.to_lowercase()))
        || ["login", "log-in", "signin", "sign-in"]
            .iter()
            .any(|marker| path.contains(marker));
    !on_login
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataTier {
    Api,
    Dom,
    InferredIds,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormControl {
    pub tag: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
}

/// What the login page looked like when login failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoginDiagnostic {
    pub current_url: String,
    pub inputs: Vec<FormControl>,
    pub buttons: Vec<String>,
    pub page_text: String,
}

impl LoginDiagnostic {
    pub fn from_html(current_url: &str, html: &str) -> Self {
        static INPUTS: LazyLock<Selector> =
            LazyLock::new(|| Selector::parse("input, textarea, select").expect("static selector"));
        static BUTTONS: LazyLock<Selector> = LazyLock::new(|| {
            Selector::parse("button, input[type='submit'], [role='button']").expect("static selector")
        });

        let document = Html::parse_document(html);
        let attr = |el: &scraper::ElementRef, name: &str| el.value().attr(name).map(str::to_string);

        let inputs = document
            .select(&INPUTS)
            .take(MAX_DIAGNOSTIC_CONTROLS)
            .map(|el| FormControl {
                tag: el.value().name().to_string(),
                kind: attr(&el, "type"),
                name: attr(&el, "name"),
                id: attr(&el, "id"),
                placeholder: attr(&el, "placeholder"),
            })
            .collect();

        let buttons = document
            .select(&BUTTONS)
            .map(|el| {
                let text = collapse_whitespace(&el.text().collect::<String>());
                if text.is_empty() {
                    attr(&el, "value").or_else(|| attr(&el, "aria-label")).unwrap_or_default()
                } else {
                    text
                }
            })
            .filter(|label| !label.is_empty())
            .take(MAX_DIAGNOSTIC_CONTROLS)
            .collect();

        let page_text = strip_markup(html).chars().take(MAX_DIAGNOSTIC_TEXT).collect();

        Self {
            current_url: current_url.to_string(),
            inputs,
            buttons,
            page_text,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AuthOutcome {
    LoginFailed {
        reason: String,
        diagnostic: LoginDiagnostic,
    },
    Jobs {
        tier: Option<DataTier>,
        #[serde(flatten)]
        result: ScrapeResult,
    },
}

pub struct AuthenticatedScraper {
    options: AuthScrapeOptions,
}

impl AuthenticatedScraper {
    pub fn new(options: AuthScrapeOptions) -> Self {
        Self { options }
    }

    pub async fn scrape(&self, credentials: &Credentials) -> Result<AuthOutcome, ScrapeError> {
        let options = self.options.clone();
        let credentials = credentials.clone();
        info!(login_url = %options.login_url, email = %credentials.email, "Starting authenticated scrape");
        tokio::task::spawn_blocking(move || run_authenticated(&credentials, &options)).await?
    }
}

fn run_authenticated(
    credentials: &Credentials,
    options: &AuthScrapeOptions,
) -> Result<AuthOutcome, ScrapeError> {
    let browser = browser::launch(options.navigation_timeout * 3)?;
    let tab = browser::open_tab(&browser, options.navigation_timeout)?;

    let signal = Arc::new(ApiSignal::default());
    let prefix = api_prefix(&options.jobs_api_url);
    let recorder = Arc::clone(&signal);
    tab.register_response_handling(
        RESPONSE_HANDLER,
        Box::new(move |event, _body| {
            let response = &event.response;
            recorder.record(
                &response.url,
                response.status as u32,
                &response.mime_type,
                &prefix,
            );
        }),
    )?;

    browser::navigate(&tab, &options.login_url)?;

    let mut state = LoginState::NotLoggedIn;
    if let Err(reason) = submit_login(&tab, credentials) {
        warn!(reason = %reason, "Login form not usable");
        return Ok(login_failed(&tab, reason));
    }
    signal.arm();
    state = state.submit();

    let login_path = Url::parse(&options.login_url)
        .map(|u| u.path().to_string())
        .unwrap_or_default();
    let deadline = Instant::now() + options.login_timeout;
    while state != LoginState::LoggedIn && Instant::now() < deadline {
        thread::sleep(POLL_INTERVAL);
        state = state.observe(&tab.get_url(), signal.seen(), &login_path);
    }
    if let Err(e) = tab.deregister_response_handling(RESPONSE_HANDLER) {
        debug!(error = %e, "Failed to remove response handler");
    }

    if state != LoginState::LoggedIn {
        let reason = format!(
            "Login did not complete within {}s",
            options.login_timeout.as_secs()
        );
        warn!(url = %tab.get_url(), "{reason}");
        return Ok(login_failed(&tab, reason));
    }
    info!(url = %tab.get_url(), "Logged in");

    let ctx = TierContext { tab: &tab, options };
    let tiers: [(DataTier, Tier<TierContext<'_>>); 3] = [
        (DataTier::Api, api_tier),
        (DataTier::Dom, dom_tier),
        (DataTier::InferredIds, inferred_ids_tier),
    ];
    Ok(first_nonempty(&tiers, &ctx))
}

type Tier<C> = fn(&C) -> Option<Vec<Job>>;

/// What a data tier needs once the session is logged in.
struct TierContext<'a> {
    tab: &'a Tab,
    options: &'a AuthScrapeOptions,
}

/// Runs the tiers in order and returns the first one that yields jobs.
/// A tier that fails (`None`) or finds nothing falls through to the next;
/// if every tier comes up empty the outcome has no tier and no jobs.
fn first_nonempty<C>(tiers: &[(DataTier, Tier<C>)], ctx: &C) -> AuthOutcome {
    for &(tier, run) in tiers {
        match run(ctx) {
            Some(jobs) if !jobs.is_empty() => {
                info!(?tier, jobs = jobs.len(), "Authenticated scrape produced jobs");
                return AuthOutcome::Jobs {
                    tier: Some(tier),
                    result: ScrapeResult::from_jobs(jobs),
                };
            }
            _ => info!(?tier, "No jobs from tier, falling back"),
        }
    }

    AuthOutcome::Jobs {
        tier: None,
        result: ScrapeResult::default(),
    }
}

fn submit_login(tab: &Tab, credentials: &Credentials) -> Result<(), String> {
    tab.wait_for_element_with_custom_timeout("input", FORM_TIMEOUT)
        .map_err(|e| format!("No form inputs on login page: {e}"))?;

    let email = find_first(tab, EMAIL_SELECTORS).ok_or("Email input not found")?;
    email
        .click()
        .and_then(|el| el.type_into(&credentials.email))
        .map_err(|e| format!("Could not fill email: {e}"))?;

    let password = find_first(tab, PASSWORD_SELECTORS).ok_or("Password input not found")?;
    password
        .click()
        .and_then(|el| el.type_into(&credentials.password))
        .map_err(|e| format!("Could not fill password: {e}"))?;

    match find_first(tab, SUBMIT_SELECTORS) {
        Some(button) => button
            .click()
            .map(|_| ())
            .map_err(|e| format!("Could not click submit: {e}")),
        None => tab
            .press_key("Enter")
            .map(|_| ())
            .map_err(|e| format!("Could not submit form: {e}")),
    }
}

fn find_first<'a>(tab: &'a Tab, selectors: &[&str]) -> Option<headless_chrome::Element<'a>> {
    selectors.iter().find_map(|sel| tab.find_element(sel).ok())
}

fn login_failed(tab: &Tab, reason: String) -> AuthOutcome {
    let html = tab.get_content().unwrap_or_default();
    AuthOutcome::LoginFailed {
        reason,
        diagnostic: LoginDiagnostic::from_html(&tab.get_url(), &html),
    }
}

fn api_tier(ctx: &TierContext<'_>) -> Option<Vec<Job>> {
    let (tab, options) = (ctx.tab, ctx.options);
    let mut jobs = Vec::new();
    let mut seen = HashSet::new();

    for page in 1..=options.max_api_pages {
        let url = options.jobs_api_url.replace("{page}", &page.to_string());
        let quoted = serde_json::to_string(&url).ok()?;
        let script = format!(
            "fetch({quoted}, {{credentials: 'include', headers: {{'Accept': 'application/json'}}}})\
             .then(r => r.ok ? r.text() : '').catch(() => '')"
        );

        let body = match browser::evaluate_string(tab, &script) {
            Ok(Some(body)) if !body.trim().is_empty() => body,
            Ok(_) => break,
            Err(e) => {
                warn!(page, error = %e, "Jobs API call failed");
                break;
            }
        };
        let value: Value = match serde_json::from_str(&body) {
            Ok(value) => value,
            Err(e) => {
                warn!(page, error = %e, "Jobs API returned non-JSON");
                break;
            }
        };

        let page_jobs = parse_api_page(&value, &options.public_apply_url);
        debug!(page, jobs = page_jobs.len(), "Fetched jobs API page");
        let last = page_jobs.is_empty() || is_last_page(&value, page);
        let added = push_unique(&mut jobs, &mut seen, page_jobs);
        // An endpoint that ignores `{page}` keeps returning the same rows.
        if last || added == 0 {
            break;
        }
    }

    Some(jobs)
}

fn dom_tier(ctx: &TierContext<'_>) -> Option<Vec<Job>> {
    let (tab, options) = (ctx.tab, ctx.options);
    if let Err(e) = browser::navigate(tab, &options.jobs_page_url) {
        warn!(error = %e, "Could not open jobs page");
        return None;
    }
    browser::scroll_until_stable(tab, options.max_scroll_rounds);

    let html = tab.get_content().ok()?;
    let base = Url::parse(&tab.get_url()).ok()?;
    let jobs = options
        .links
        .extract_jobs(&html, &base)
        .into_iter()
        .map(|job| Job {
            source: Some("dom".to_string()),
            ..job
        })
        .collect();
    Some(jobs)
}

fn inferred_ids_tier(ctx: &TierContext<'_>) -> Option<Vec<Job>> {
    let (tab, options) = (ctx.tab, ctx.options);
    let html = tab.get_content().ok()?;
    let jobs = infer_job_ids(&html)
        .into_iter()
        .map(|id| Job {
            application_url: Some(options.public_apply_url.replace("{id}", &id)),
            id: Some(id),
            source: Some("inferred".to_string()),
            ..Job::default()
        })
        .collect();
    Some(jobs)
}

/// Appends the jobs whose id (or link) hasn't been seen yet and returns how
/// many were added. Jobs with neither are always kept.
fn push_unique(jobs: &mut Vec<Job>, seen: &mut HashSet<String>, page: Vec<Job>) -> usize {
    let before = jobs.len();
    for job in page {
        let key = job.id.clone().or_else(|| job.link().map(str::to_string));
        if key.map_or(true, |key| seen.insert(key)) {
            jobs.push(job);
        }
    }
    jobs.len() - before
}

/// Reads one page of the jobs API. Accepts a bare array or an object with
/// the list under `data`, `jobs` or `results` (one level of nesting).
pub fn parse_api_page(value: &Value, public_apply_url: &str) -> Vec<Job> {
    job_items(value)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_object)
                .map(|item| api_item_to_job(item, public_apply_url))
                .collect()
        })
        .unwrap_or_default()
}

fn job_items(value: &Value) -> Option<&Vec<Value>> {
    if let Some(items) = value.as_array() {
        return Some(items);
    }
    ["data", "jobs", "results"].iter().find_map(|key| {
        let inner = value.get(key)?;
        inner.as_array().or_else(|| {
            ["data", "jobs", "results"]
                .iter()
                .find_map(|k| inner.get(k).and_then(Value::as_array))
        })
    })
}

fn api_item_to_job(item: &serde_json::Map<String, Value>, public_apply_url: &str) -> Job {
    let text = |keys: &[&str]| keys.iter().find_map(|k| value_text(item.get(*k)?));

    let id = text(&["id", "job_id", "slug"]);
    let company_name = text(&["company_name"]).or_else(|| {
        item.get("company").and_then(|c| match c {
            Value::Object(company) => company.get("name").and_then(value_text),
            other => value_text(other),
        })
    });
    let location = text(&["location", "job_location"]).or_else(|| {
        let parts: Vec<String> = ["city", "locality", "state", "country"]
            .iter()
            .filter_map(|k| item.get(*k).and_then(value_text))
            .collect();
        (!parts.is_empty()).then(|| parts.join(", "))
    });
    let application_url = text(&["application_url", "apply_url", "job_url"]).or_else(|| {
        text(&["slug", "id"]).map(|key| public_apply_url.replace("{id}", &key))
    });

    Job {
        id,
        name: text(&["name", "title", "job_title"]),
        company_name,
        location,
        application_url,
        source: Some("api".to_string()),
        ..Job::default()
    }
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn is_last_page(value: &Value, page: u32) -> bool {
    let meta = [value.get("meta"), value.get("pagination"), Some(value)];
    for scope in meta.into_iter().flatten() {
        if let Some(last) = scope.get("last_page").and_then(Value::as_u64) {
            return u64::from(page) >= last;
        }
        if let Some(Value::Null) = scope.get("next_page_url") {
            return true;
        }
    }
    false
}

/// Last-resort job IDs: numeric ids (5+ digits) in data attributes, job
/// paths or `job_id` text, in document order without duplicates.
pub fn infer_job_ids(html: &str) -> Vec<String> {
    static PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
        [
            r#"data-(?:job-)?id\s*=\s*["']?(\d{5,})"#,
            r"/jobs?/(\d{5,})\b",
            r#"(?i)job[_\s-]?id["'\s:=]+(\d{5,})"#,
        ]
        .iter()
        .map(|p| Regex::new(p).expect("static pattern"))
        .collect()
    });

    let mut found: Vec<(usize, String)> = PATTERNS
        .iter()
        .flat_map(|re| {
            re.captures_iter(html)
                .filter_map(|caps| caps.get(1))
                .map(|m| (m.start(), m.as_str().to_string()))
        })
        .collect();
    found.sort_by_key(|(pos, _)| *pos);

    let mut seen = HashSet::new();
    found
        .into_iter()
        .map(|(_, id)| id)
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_login_state_transitions() {
        let state = LoginState::NotLoggedIn;
        assert_eq!(
            state.observe("https://app.recruitcrm.io/dashboard", true, "/log-in"),
            LoginState::NotLoggedIn
        );

        let pending = state.submit();
        assert_eq!(pending, LoginState::LoginPending);
        assert_eq!(
            pending.observe("https://app.recruitcrm.io/log-in?error=1", false, "/log-in"),
            LoginState::LoginPending
        );
        assert_eq!(
            pending.observe("https://app.recruitcrm.io/dashboard", false, "/log-in"),
            LoginState::LoggedIn
        );
        assert_eq!(
            pending.observe("https://app.recruitcrm.io/log-in", true, "/log-in"),
            LoginState::LoggedIn
        );
        assert_eq!(pending.observe("about:blank", false, "/log-in"), LoginState::LoginPending);
        assert_eq!(LoginState::LoggedIn.submit(), LoginState::LoggedIn);
    }

    #[test]
    fn test_api_response_before_submit_does_not_log_in() {
        let prefix = api_prefix(DEFAULT_JOBS_API_URL);
        let signal = ApiSignal::default();

        // The login page fetches its own config from the jobs API while loading.
        signal.record(
            "https://app.recruitcrm.io/api/v1/jobs/settings",
            200,
            "application/json",
            &prefix,
        );
        signal.arm();
        assert!(!signal.seen());

        let pending = LoginState::NotLoggedIn.submit();
        assert_eq!(
            pending.observe("https://app.recruitcrm.io/log-in", signal.seen(), "/log-in"),
            LoginState::LoginPending
        );

        signal.record(
            "https://app.recruitcrm.io/api/v1/jobs?page=1",
            200,
            "application/json; charset=utf-8",
            &prefix,
        );
        assert_eq!(
            pending.observe("https://app.recruitcrm.io/log-in", signal.seen(), "/log-in"),
            LoginState::LoggedIn
        );
    }

    #[test]
    fn test_api_signal_ignores_other_endpoints() {
        let prefix = api_prefix(DEFAULT_JOBS_API_URL);
        assert_eq!(prefix, "https://app.recruitcrm.io/api/v1/jobs");

        let signal = ApiSignal::default();
        signal.arm();
        signal.record("https://app.recruitcrm.io/api/v1/login", 200, "application/json", &prefix);
        signal.record("https://app.recruitcrm.io/api/v1/jobs", 401, "application/json", &prefix);
        signal.record("https://app.recruitcrm.io/api/v1/jobs", 200, "text/html", &prefix);
        assert!(!signal.seen());

        let unarmed = ApiSignal::default();
        unarmed.record("https://app.recruitcrm.io/api/v1/jobs", 200, "application/json", "");
        assert!(!unarmed.seen());
    }

    type Calls = std::cell::RefCell<Vec<DataTier>>;

    fn api_fails(calls: &Calls) -> Option<Vec<Job>> {
        calls.borrow_mut().push(DataTier::Api);
        None
    }

    fn dom_empty(calls: &Calls) -> Option<Vec<Job>> {
        calls.borrow_mut().push(DataTier::Dom);
        Some(vec![])
    }

    fn dom_finds_one(calls: &Calls) -> Option<Vec<Job>> {
        calls.borrow_mut().push(DataTier::Dom);
        Some(vec![Job {
            id: Some("7".into()),
            ..Job::default()
        }])
    }

    fn ids_finds_two(calls: &Calls) -> Option<Vec<Job>> {
        calls.borrow_mut().push(DataTier::InferredIds);
        Some(vec![Job::default(), Job::default()])
    }

    fn ids_empty(calls: &Calls) -> Option<Vec<Job>> {
        calls.borrow_mut().push(DataTier::InferredIds);
        Some(vec![])
    }

    #[test]
    fn test_first_nonempty_tier_wins() {
        let calls = Calls::default();
        let tiers: [(DataTier, Tier<Calls>); 3] = [
            (DataTier::Api, api_fails),
            (DataTier::Dom, dom_finds_one),
            (DataTier::InferredIds, ids_finds_two),
        ];

        let value = serde_json::to_value(first_nonempty(&tiers, &calls)).unwrap();

        assert_eq!(value["tier"], "dom");
        assert_eq!(value["total"], 1);
        assert_eq!(*calls.borrow(), vec![DataTier::Api, DataTier::Dom]);
    }

    #[test]
    fn test_empty_tier_falls_through() {
        let calls = Calls::default();
        let tiers: [(DataTier, Tier<Calls>); 3] = [
            (DataTier::Api, api_fails),
            (DataTier::Dom, dom_empty),
            (DataTier::InferredIds, ids_finds_two),
        ];

        let value = serde_json::to_value(first_nonempty(&tiers, &calls)).unwrap();

        assert_eq!(value["tier"], "inferred_ids");
        assert_eq!(value["total"], 2);
        assert_eq!(
            *calls.borrow(),
            vec![DataTier::Api, DataTier::Dom, DataTier::InferredIds]
        );
    }

    #[test]
    fn test_all_tiers_empty_is_not_an_error() {
        let calls = Calls::default();
        let tiers: [(DataTier, Tier<Calls>); 3] = [
            (DataTier::Api, api_fails),
            (DataTier::Dom, dom_empty),
            (DataTier::InferredIds, ids_empty),
        ];

        match first_nonempty(&tiers, &calls) {
            AuthOutcome::Jobs { tier, result } => {
                assert_eq!(tier, None);
                assert_eq!(result.total, 0);
                assert!(result.data.is_empty());
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(calls.borrow().len(), 3);
    }

    #[test]
    fn test_repeated_api_pages_are_deduplicated() {
        let page = json!({"data": [{"id": "1", "name": "A"}, {"id": "2", "name": "B"}]});
        let mut jobs = Vec::new();
        let mut seen = HashSet::new();

        let first = push_unique(
            &mut jobs,
            &mut seen,
            parse_api_page(&page, DEFAULT_PUBLIC_APPLY_URL),
        );
        let second = push_unique(
            &mut jobs,
            &mut seen,
            parse_api_page(&page, DEFAULT_PUBLIC_APPLY_URL),
        );
        let keyless = push_unique(&mut jobs, &mut seen, vec![Job::default(), Job::default()]);

        assert_eq!((first, second, keyless), (2, 0, 2));
        assert_eq!(jobs.len(), 4);
    }

    #[test]
    fn test_generic_login_paths_count_as_login_page() {
        let pending = LoginState::LoginPending;
        assert_eq!(
            pending.observe("https://sso.example.com/signin", false, "/log-in"),
            LoginState::LoginPending
        );
    }

    #[test]
    fn test_diagnostic_from_login_page() {
        let html = r#"
            <html><body>
              <form>
                <input type="text" name="user" id="user" placeholder="Work email">
                <input type="password" name="pw">
                <button type="submit">  Sign
                   in </button>
                <input type="submit" value="Continue">
              </form>
              <script>window.boot()</script>
              <p>Invalid credentials</p>
            </body></html>
        "#;
        let diag = LoginDiagnostic::from_html("https://app.recruitcrm.io/log-in", html);

        assert_eq!(diag.current_url, "https://app.recruitcrm.io/log-in");
        assert_eq!(diag.inputs.len(), 3);
        assert_eq!(diag.inputs[0].placeholder.as_deref(), Some("Work email"));
        assert_eq!(diag.inputs[1].kind.as_deref(), Some("password"));
        assert_eq!(diag.buttons, vec!["Sign in", "Continue"]);
        assert!(diag.page_text.contains("Invalid credentials"));
        assert!(!diag.page_text.contains("boot"));
    }

    #[test]
    fn test_parse_api_page_paginated_envelope() {
        let page = json!({
            "current_page": 1,
            "last_page": 1,
            "data": [
                {"id": 123456, "name": "CNA", "company": {"name": "Acme Health"},
                 "city": "Tulsa", "state": "OK"},
                {"slug": "welder-2", "title": "Welder", "company_name": "Forge Co",
                 "location": "Remote", "job_url": "https://recruitcrm.io/apply/welder-2"},
                "not an object"
            ]
        });

        let jobs = parse_api_page(&page, DEFAULT_PUBLIC_APPLY_URL);
        assert_eq!(jobs.len(), 2);

        assert_eq!(jobs[0].id.as_deref(), Some("123456"));
        assert_eq!(jobs[0].company_name.as_deref(), Some("Acme Health"));
        assert_eq!(jobs[0].location.as_deref(), Some("Tulsa, OK"));
        assert_eq!(
            jobs[0].application_url.as_deref(),
            Some("https://recruitcrm.io/apply/123456")
        );

        assert_eq!(jobs[1].name.as_deref(), Some("Welder"));
        assert_eq!(jobs[1].company_name.as_deref(), Some("Forge Co"));
        assert_eq!(
            jobs[1].application_url.as_deref(),
            Some("https://recruitcrm.io/apply/welder-2")
        );
        assert!(is_last_page(&page, 1));
    }

    #[test]
    fn test_parse_api_page_shapes() {
        let bare = json!([{"id": "1", "name": "A"}]);
        let nested = json!({"data": {"jobs": [{"id": "2"}], "next_page_url": null}});
        let unknown = json!({"items": [{"id": "3"}]});

        assert_eq!(parse_api_page(&bare, DEFAULT_PUBLIC_APPLY_URL).len(), 1);
        assert_eq!(parse_api_page(&nested, DEFAULT_PUBLIC_APPLY_URL).len(), 1);
        assert!(parse_api_page(&unknown, DEFAULT_PUBLIC_APPLY_URL).is_empty());
    }

    #[test]
    fn test_is_last_page() {
        assert!(!is_last_page(&json!({"meta": {"last_page": 3}}), 2));
        assert!(is_last_page(&json!({"meta": {"last_page": 3}}), 3));
        assert!(is_last_page(&json!({"next_page_url": null}), 1));
        assert!(!is_last_page(&json!({"data": []}), 1));
    }

    #[test]
    fn test_infer_job_ids() {
        let html = r#"
            <tr data-job-id="4400123"><td>Driver</td></tr>
            <a href="/job/4400456">View</a>
            <span>job_id: 4400789</span>
            <div data-id="4400123"></div>
            <a href="/jobs/12">too short</a>
        "#;
        assert_eq!(infer_job_ids(html), vec!["4400123", "4400456", "4400789"]);
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = AuthOutcome::Jobs {
            tier: Some(DataTier::InferredIds),
            result: ScrapeResult::default(),
        };
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["status"], "jobs");
        assert_eq!(value["tier"], "inferred_ids");
        assert_eq!(value["total"], 0);
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let creds = Credentials {
            email: "ops@example.com".into(),
            password: "hunter2".into(),
        };
        assert!(!format!("{creds:?}").contains("hunter2"));
    }
}
