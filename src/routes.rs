//! Network route interception over the CDP Fetch domain.
//!
//! Requests paused by the browser are matched against registered URL globs.
//! A match is either aborted (simulating a network/API failure) or
//! fulfilled with a crafted response; everything else continues untouched.

use std::collections::HashMap;
use std::sync::Arc;

use base64::Engine;
use chromiumoxide::cdp::browser_protocol::fetch::{
    ContinueRequestParams, EnableParams, EventRequestPaused, FailRequestParams,
    FulfillRequestParams, HeaderEntry, RequestPattern,
};
use chromiumoxide::cdp::browser_protocol::network::ErrorReason;
use chromiumoxide::error::CdpError;
use chromiumoxide::Page;
use futures::StreamExt;
use regex::Regex;
use tokio::sync::RwLock;
use tokio::task::{self, JoinHandle};
use tracing::{debug, info, warn};

use crate::browser::DriverError;

/// What to do with an intercepted request.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteAction {
    /// Fail the request at the network layer.
    Abort,
    /// Answer the request ourselves without hitting the server.
    Fulfill {
        status: i64,
        content_type: String,
        body: String,
    },
}

impl RouteAction {
    /// A 200 application/json fulfillment with the given payload.
    pub fn fulfill_json(payload: &serde_json::Value) -> Self {
        RouteAction::Fulfill {
            status: 200,
            content_type: "application/json".to_string(),
            body: payload.to_string(),
        }
    }
}

struct Route {
    regex: Regex,
    action: RouteAction,
}

/// Registry of URL-glob interception handlers, shared with the listener
/// task that answers paused requests. At most one handler per pattern.
#[derive(Clone)]
pub struct RouteTable {
    routes: Arc<RwLock<HashMap<String, Route>>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self {
            routes: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Enable Fetch-domain interception on the page and spawn the task
    /// that resolves paused requests against this table for the page's
    /// lifetime.
    pub async fn attach(&self, page: &Page) -> Result<JoinHandle<()>, DriverError> {
        let catch_all = RequestPattern {
            url_pattern: Some("*".to_string()),
            ..Default::default()
        };
        page.execute(EnableParams {
            patterns: Some(vec![catch_all]),
            ..Default::default()
        })
        .await?;

        let mut events = page.event_listener::<EventRequestPaused>().await?;
        let routes = self.routes.clone();
        let page = page.clone();
        Ok(task::spawn(async move {
            while let Some(event) = events.next().await {
                if let Err(e) = resolve(&page, &routes, event.as_ref()).await {
                    // The page may have navigated away while we were
                    // answering; the request is gone, nothing to do.
                    debug!("Could not resolve intercepted request: {}", e);
                }
            }
        }))
    }

    /// Register a handler. Re-registering a live pattern is rejected:
    /// the caller must `unroute` first.
    pub async fn route(&self, pattern: &str, action: RouteAction) -> Result<(), DriverError> {
        let regex = glob_to_regex(pattern)?;
        let mut table = self.routes.write().await;
        if table.contains_key(pattern) {
            return Err(DriverError::RouteConflict(pattern.to_string()));
        }
        info!("Mocking requests matching '{}' with {:?}", pattern, action);
        table.insert(pattern.to_string(), Route { regex, action });
        Ok(())
    }

    /// Drop the handler for `pattern`. No-op if none is registered.
    pub async fn unroute(&self, pattern: &str) {
        if self.routes.write().await.remove(pattern).is_none() {
            debug!("unroute('{}'): no handler was registered", pattern);
        }
    }

    /// The action for the first registered pattern matching `url`.
    pub async fn action_for(&self, url: &str) -> Option<RouteAction> {
        let table = self.routes.read().await;
        table
            .values()
            .find(|route| route.regex.is_match(url))
            .map(|route| route.action.clone())
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Answer one paused request: abort or fulfill on a pattern match,
/// continue everything else.
async fn resolve(
    page: &Page,
    routes: &Arc<RwLock<HashMap<String, Route>>>,
    event: &EventRequestPaused,
) -> Result<(), CdpError> {
    let url = event.request.url.as_str();
    let action = {
        let table = routes.read().await;
        table
            .values()
            .find(|route| route.regex.is_match(url))
            .map(|route| route.action.clone())
    };

    match action {
        Some(RouteAction::Abort) => {
            warn!("Aborting intercepted request to {}", url);
            page.execute(FailRequestParams::new(
                event.request_id.clone(),
                ErrorReason::Failed,
            ))
            .await?;
        }
        Some(RouteAction::Fulfill {
            status,
            content_type,
            body,
        }) => {
            info!("Fulfilling intercepted request to {} ({})", url, status);
            let mut params = FulfillRequestParams::new(event.request_id.clone(), status);
            params.response_headers = Some(vec![HeaderEntry::new("content-type", content_type)]);
            params.body = Some(base64::engine::general_purpose::STANDARD.encode(body.as_bytes()).into());
            page.execute(params).await?;
        }
        None => {
            page.execute(ContinueRequestParams::new(event.request_id.clone()))
                .await?;
        }
    }
    Ok(())
}

/// Compile a URL glob: `**` matches anything, `*`
/// matches anything except `/`, `?` matches a single character.
fn glob_to_regex(pattern: &str) -> Result<Regex, DriverError> {
    let mut re = String::with_capacity(pattern.len() + 8);
    re.push('^');
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    re.push_str(".*");
                } else {
                    re.push_str("[^/]*");
                }
            }
            '?' => re.push('.'),
            c if "\\.+()[]{}|^$".contains(c) => {
                re.push('\\');
                re.push(c);
            }
            c => re.push(c),
        }
    }
    re.push('$');
    Regex::new(&re).map_err(|e| DriverError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn matches(pattern: &str, url: &str) -> bool {
        glob_to_regex(pattern).unwrap().is_match(url)
    }

    #[test]
    fn double_star_crosses_path_segments() {
        assert!(matches("**/products", "http://localhost:5173/api/products"));
        assert!(matches("**/products", "https://example.com/v1/ong/products"));
        assert!(!matches("**/products", "http://localhost:5173/products/42"));
    }

    #[test]
    fn single_star_stops_at_slash() {
        assert!(matches("http://localhost:5173/*", "http://localhost:5173/about"));
        assert!(!matches("http://localhost:5173/*", "http://localhost:5173/ong/about"));
    }

    #[test]
    fn literal_dots_are_escaped() {
        assert!(matches("**/app.js", "http://localhost:5173/assets/app.js"));
        assert!(!matches("**/app.js", "http://localhost:5173/assets/appxjs"));
    }

    #[test]
    fn question_mark_matches_one_character() {
        assert!(matches("**/page?", "http://host/page1"));
        assert!(!matches("**/page?", "http://host/page12"));
    }

    #[tokio::test]
    async fn registering_twice_is_a_conflict() {
        let table = RouteTable::new();
        table.route("**/products", RouteAction::Abort).await.unwrap();
        let err = table
            .route("**/products", RouteAction::Abort)
            .await
            .unwrap_err();
        assert!(matches!(err, DriverError::RouteConflict(_)));
    }

    #[tokio::test]
    async fn unroute_allows_re_registration() {
        let table = RouteTable::new();
        table.route("**/products", RouteAction::Abort).await.unwrap();
        table.unroute("**/products").await;
        table
            .route("**/products", RouteAction::fulfill_json(&json!({"products": []})))
            .await
            .unwrap();

        let action = table
            .action_for("http://localhost:5173/api/products")
            .await
            .unwrap();
        assert_eq!(
            action,
            RouteAction::Fulfill {
                status: 200,
                content_type: "application/json".to_string(),
                body: "{\"products\":[]}".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn unroute_without_registration_is_a_noop() {
        let table = RouteTable::new();
        table.unroute("**/never-registered").await;
        assert!(table.action_for("http://host/anything").await.is_none());
    }

    #[tokio::test]
    async fn unmatched_urls_have_no_action() {
        let table = RouteTable::new();
        table.route("**/products", RouteAction::Abort).await.unwrap();
        assert!(table
            .action_for("http://localhost:5173/ong/about")
            .await
            .is_none());
    }
}
