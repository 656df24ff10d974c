//! Thin helpers over `headless_chrome`. Everything here blocks, so callers
//! run it inside `tokio::task::spawn_blocking`.

use std::ffi::OsStr;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::anyhow;
use headless_chrome::{Browser, LaunchOptions, Tab};
use tracing::debug;

use crate::error::ScrapeError;

const SCROLL_PAUSE: Duration = Duration::from_millis(750);

/// Scrolls to the bottom and reports how many anchors the document has.
const SCROLL_AND_COUNT_JS: &str =
    "window.scrollTo(0, document.body ? document.body.scrollHeight : 0); document.querySelectorAll('a').length";

pub fn launch(idle_timeout: Duration) -> Result<Browser, ScrapeError> {
    let options = LaunchOptions::default_builder()
        .headless(true)
        .sandbox(false)
        .idle_browser_timeout(idle_timeout)
        .args(vec![
            OsStr::new("--disable-gpu"),
            OsStr::new("--disable-dev-shm-usage"),
        ])
        .build()
        .map_err(|e| anyhow!("Invalid launch options: {e}"))?;

    Ok(Browser::new(options)?)
}

pub fn open_tab(browser: &Browser, timeout: Duration) -> Result<Arc<Tab>, ScrapeError> {
    let tab = browser.new_tab()?;
    tab.set_default_timeout(timeout);
    Ok(tab)
}

/// Navigates and waits for the load to finish. Failure is a hard error.
pub fn navigate(tab: &Tab, url: &str) -> Result<(), ScrapeError> {
    tab.navigate_to(url)?;
    tab.wait_until_navigated()?;
    Ok(())
}

/// Waits up to `timeout` for an iframe to appear and returns the `src` of
/// every iframe on the page. Timing out just means there are none.
pub fn iframe_sources(tab: &Tab, timeout: Duration) -> Vec<String> {
    if let Err(e) = tab.wait_for_element_with_custom_timeout("iframe", timeout) {
        debug!(error = %e, "No iframe appeared");
        return Vec::new();
    }

    tab.find_elements("iframe")
        .map(|frames| {
            frames
                .iter()
                .filter_map(|frame| frame.get_attribute_value("src").ok().flatten())
                .filter(|src| !src.trim().is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Scrolls to the bottom up to `max_rounds` times so lazy lists render,
/// stopping as soon as a round adds no anchors. Returns the final count.
pub fn scroll_until_stable(tab: &Tab, max_rounds: usize) -> usize {
    let mut last_count = 0usize;
    for round in 0..max_rounds {
        let count = match tab.evaluate(SCROLL_AND_COUNT_JS, false) {
            Ok(result) => result
                .value
                .and_then(|v| v.as_u64())
                .map(|n| n as usize)
                .unwrap_or(0),
            Err(e) => {
                debug!(round, error = %e, "Scroll evaluation failed");
                break;
            }
        };
        debug!(round, anchors = count, "Scrolled");
        if round > 0 && count <= last_count {
            break;
        }
        last_count = count;
        thread::sleep(SCROLL_PAUSE);
    }
    last_count
}

/// Evaluates a JS expression that resolves to a string.
pub fn evaluate_string(tab: &Tab, expression: &str) -> Result<Option<String>, ScrapeError> {
    let result = tab.evaluate(expression, true)?;
    Ok(result.value.and_then(|v| v.as_str().map(str::to_string)))
}
