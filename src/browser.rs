use std::path::Path;
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::error::CdpError;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use thiserror::Error;
use tokio::task::{self, JoinHandle};
use tracing::{debug, info, warn};

use crate::assertions::{self, Locator};
use crate::routes::{RouteAction, RouteTable};

#[derive(Error, Debug)]
pub enum DriverError {
    #[error("Failed to launch browser: {0}")]
    Launch(String),
    #[error("Navigation to '{url}' failed: {source}")]
    Navigation { url: String, source: CdpError },
    #[error("Route pattern '{0}' is already registered; unroute it before re-registering")]
    RouteConflict(String),
    #[error("Invalid route pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
    #[error("Expected {locator} to become visible within {timeout_ms}ms")]
    AssertionTimeout { locator: String, timeout_ms: u64 },
    #[error("Invalid base URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("CDP command failed: {0}")]
    Cdp(#[from] CdpError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Owns the Chromium process, the single page the verification run drives,
/// and the route table intercepting its network requests.
pub struct BrowserDriver {
    browser: Browser,
    page: Page,
    routes: RouteTable,
    handler_task: JoinHandle<()>,
    intercept_task: JoinHandle<()>,
}

impl BrowserDriver {
    /// Launch a Chromium instance and open a blank page with request
    /// interception armed. Fatal if no browser binary is available.
    pub async fn launch(headless: bool) -> Result<Self, DriverError> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .window_size(1280, 720);
        if !headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(DriverError::Launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| DriverError::Launch(format!("Failed to launch chromium: {}", e)))?;

        // Spawn a background task to process CDP events.
        // Without this, the browser connection will stall.
        let handler_task = task::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| DriverError::Launch(format!("Failed to create initial page: {}", e)))?;

        let routes = RouteTable::new();
        let intercept_task = routes.attach(&page).await?;

        info!("Browser launched, interception armed");
        Ok(Self {
            browser,
            page,
            routes,
            handler_task,
            intercept_task,
        })
    }

    /// Navigate and block until the load completes. Navigation failures
    /// propagate and abort the run; there is no retry.
    pub async fn goto(&self, url: &str) -> Result<(), DriverError> {
        debug!("Navigating to {}", url);
        self.page
            .goto(url)
            .await
            .map_err(|e| DriverError::Navigation {
                url: url.to_string(),
                source: e,
            })?;
        self.page
            .wait_for_navigation()
            .await
            .map_err(|e| DriverError::Navigation {
                url: url.to_string(),
                source: e,
            })?;
        Ok(())
    }

    /// Register an interception handler for requests matching a URL glob.
    /// Errors if the pattern already has an active handler.
    pub async fn route(&self, pattern: &str, action: RouteAction) -> Result<(), DriverError> {
        self.routes.route(pattern, action).await
    }

    /// Remove the handler for a pattern. No-op if none is registered.
    pub async fn unroute(&self, pattern: &str) {
        self.routes.unroute(pattern).await;
    }

    /// Poll the rendered DOM until the locator is visible or the timeout
    /// elapses.
    pub async fn expect_visible(
        &self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<(), DriverError> {
        assertions::expect_visible(&self.page, locator, timeout).await
    }

    /// Capture the current frame as a full-page PNG, overwriting any
    /// existing file at `path`.
    pub async fn screenshot(&self, path: &Path) -> Result<(), DriverError> {
        let bytes = self
            .page
            .screenshot(
                ScreenshotParams::builder()
                    .format(CaptureScreenshotFormat::Png)
                    .full_page(true)
                    .build(),
            )
            .await?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(path, &bytes).await?;
        info!("Captured {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }

    /// Shut the browser down and reap the child process. Dropping the
    /// driver without calling this still terminates the process through
    /// chromiumoxide's own cleanup, so failure paths stay leak-free.
    pub async fn close(mut self) -> Result<(), DriverError> {
        self.intercept_task.abort();
        if let Err(e) = self.browser.close().await {
            warn!("Error closing browser: {}", e);
        }
        let _ = self.browser.wait().await;
        self.handler_task.abort();
        debug!("Browser shut down");
        Ok(())
    }
}
