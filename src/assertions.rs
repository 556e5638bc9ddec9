//! Visibility assertions against the live page.
//!
//! The probe runs inside the page and reports whether the target is
//! currently visible; we poll it until it says yes or the deadline passes.

use std::fmt;
use std::time::{Duration, Instant};

use chromiumoxide::Page;
use tokio::time::sleep;
use tracing::debug;

use crate::browser::DriverError;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// What to look for on the page.
#[derive(Debug, Clone, PartialEq)]
pub enum Locator {
    /// An element matching a CSS selector.
    Css(String),
    /// Literal text rendered somewhere visible on the page.
    /// `innerText` already excludes hidden nodes, so presence there
    /// implies visibility.
    Text(String),
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(selector) => write!(f, "css `{}`", selector),
            Locator::Text(text) => write!(f, "text `{}`", text),
        }
    }
}

/// JS expression evaluating to `true` iff the locator is visible now.
pub fn probe_js(locator: &Locator) -> String {
    match locator {
        Locator::Css(selector) => format!(
            "(() => {{ \
               const el = document.querySelector({sel}); \
               if (!el) return false; \
               const r = el.getBoundingClientRect(); \
               const s = window.getComputedStyle(el); \
               return r.width > 0 && r.height > 0 \
                   && s.visibility !== 'hidden' && s.display !== 'none'; \
             }})()",
            sel = js_string(selector)
        ),
        Locator::Text(text) => format!(
            "(() => {{ \
               const body = document.body; \
               return !!body && body.innerText.includes({text}); \
             }})()",
            text = js_string(text)
        ),
    }
}

/// Quote a Rust string as a JS string literal. JSON string syntax is a
/// subset of JS, so serde_json gives us correct escaping for free.
fn js_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

/// Poll the page until the locator becomes visible. Evaluation errors
/// (e.g. mid-navigation) count as "not visible yet" and are retried
/// until the same deadline.
pub async fn expect_visible(
    page: &Page,
    locator: &Locator,
    timeout: Duration,
) -> Result<(), DriverError> {
    let js = probe_js(locator);
    let start = Instant::now();
    loop {
        let visible = page
            .evaluate(js.as_str())
            .await
            .ok()
            .and_then(|result| result.value().and_then(|v| v.as_bool()))
            .unwrap_or(false);

        if visible {
            debug!("{} became visible after {}ms", locator, start.elapsed().as_millis());
            return Ok(());
        }
        if start.elapsed() >= timeout {
            return Err(DriverError::AssertionTimeout {
                locator: locator.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            });
        }
        sleep(POLL_INTERVAL).await;
    }
}
