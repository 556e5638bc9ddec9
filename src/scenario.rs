//! The fixed verification sequence: capture the products page in its
//! error state (API request aborted) and empty state (API fulfilled
//! with zero products), one screenshot each.

use std::path::PathBuf;
use std::time::Duration;

use serde_json::json;
use tracing::{error, info};

use crate::assertions::Locator;
use crate::browser::{BrowserDriver, DriverError};
use crate::config::VerifyConfig;
use crate::routes::RouteAction;

/// One mocked UI state to drive the page into and photograph.
#[derive(Debug, Clone)]
pub struct Phase {
    pub name: &'static str,
    pub mock: RouteAction,
    pub marker: Locator,
    pub evidence: &'static str,
}

/// The two states, in capture order.
pub fn phases() -> Vec<Phase> {
    vec![
        Phase {
            name: "error-state",
            mock: RouteAction::Abort,
            marker: Locator::Css(".alert-danger".to_string()),
            evidence: "01_error-state.png",
        },
        Phase {
            name: "empty-state",
            mock: RouteAction::fulfill_json(&json!({ "products": [] })),
            marker: Locator::Text("Nenhum produto encontrado.".to_string()),
            evidence: "02_empty-state.png",
        },
    ]
}

/// Evidence files written by a completed run.
#[derive(Debug)]
pub struct RunReport {
    pub evidence: Vec<PathBuf>,
}

/// Launch the browser, run both phases, and tear the browser down on
/// success and failure alike. Every failure is fatal; nothing retries.
pub async fn run(config: &VerifyConfig) -> Result<RunReport, DriverError> {
    config.validate()?;

    let driver = BrowserDriver::launch(config.headless).await?;
    let outcome = run_phases(&driver, config).await;
    if let Err(e) = &outcome {
        error!("Verification failed: {}", e);
    }
    // Close regardless of how the phases went.
    let closed = driver.close().await;
    let report = outcome?;
    closed?;
    Ok(report)
}

async fn run_phases(
    driver: &BrowserDriver,
    config: &VerifyConfig,
) -> Result<RunReport, DriverError> {
    let products = config.page_url(&config.products_path);
    let about = config.page_url(&config.about_path);
    let timeout = Duration::from_millis(config.timeout_ms);

    // First visit before any mock is installed. If the app is not
    // running this fails fast here instead of hanging later.
    info!("Visiting {} to establish the session", products);
    driver.goto(&products).await?;

    let mut evidence = Vec::new();
    for phase in phases() {
        info!("Phase '{}'", phase.name);
        driver.route(&config.api_pattern, phase.mock.clone()).await?;

        // Detour via the about page so the return to the products page
        // is a fresh navigation and the newly installed mock applies.
        driver.goto(&about).await?;
        driver.goto(&products).await?;

        driver.expect_visible(&phase.marker, timeout).await?;

        let path = config.output_dir.join(phase.evidence);
        driver.screenshot(&path).await?;
        evidence.push(path);

        driver.unroute(&config.api_pattern).await;
    }

    info!("Both states captured");
    Ok(RunReport { evidence })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_state_comes_before_empty_state() {
        let phases = phases();
        assert_eq!(phases.len(), 2);
        assert_eq!(phases[0].name, "error-state");
        assert_eq!(phases[1].name, "empty-state");
    }

    #[test]
    fn error_phase_aborts_and_watches_the_danger_alert() {
        let phase = &phases()[0];
        assert_eq!(phase.mock, RouteAction::Abort);
        assert_eq!(phase.marker, Locator::Css(".alert-danger".to_string()));
        assert_eq!(phase.evidence, "01_error-state.png");
    }

    #[test]
    fn empty_phase_fulfills_an_empty_product_list() {
        let phase = &phases()[1];
        match &phase.mock {
            RouteAction::Fulfill {
                status,
                content_type,
                body,
            } => {
                assert_eq!(*status, 200);
                assert_eq!(content_type, "application/json");
                let parsed: serde_json::Value = serde_json::from_str(body).unwrap();
                assert_eq!(parsed["products"].as_array().unwrap().len(), 0);
            }
            other => panic!("expected a fulfill mock, got {:?}", other),
        }
        assert_eq!(
            phase.marker,
            Locator::Text("Nenhum produto encontrado.".to_string())
        );
        assert_eq!(phase.evidence, "02_empty-state.png");
    }

    #[test]
    fn evidence_paths_land_in_the_output_dir() {
        let config = VerifyConfig::default();
        for phase in phases() {
            let path = config.output_dir.join(phase.evidence);
            assert!(path.starts_with("verification"));
            assert_eq!(path.extension().unwrap(), "png");
        }
    }
}
