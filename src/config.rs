use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

use url::Url;

use crate::browser::DriverError;

/// Run settings. The defaults reproduce the fixed URLs and paths the
/// verification was written against; a config file or CLI flags can
/// override them when the app is served elsewhere.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct VerifyConfig {
    /// Base URL of the running web application.
    pub base_url: String,
    /// Page under verification.
    pub products_path: String,
    /// Intermediate page visited to force a fresh navigation.
    pub about_path: String,
    /// URL glob for the API requests to mock.
    pub api_pattern: String,
    /// Directory the screenshot evidence is written to.
    pub output_dir: PathBuf,
    /// Visibility assertion timeout in milliseconds.
    pub timeout_ms: u64,
    pub headless: bool,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5173".to_string(),
            products_path: "/ong/products".to_string(),
            about_path: "/ong/about".to_string(),
            api_pattern: "**/products".to_string(),
            output_dir: PathBuf::from("verification"),
            timeout_ms: 5_000,
            headless: true,
        }
    }
}

impl VerifyConfig {
    pub fn load() -> Self {
        let paths = vec![
            PathBuf::from("config.toml"),
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("verify-states/config.toml"),
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".verify-states/config.toml"),
        ];

        for path in paths {
            if path.exists() {
                match fs::read_to_string(&path) {
                    Ok(content) => match toml::from_str(&content) {
                        Ok(config) => {
                            tracing::info!("Loaded config from {}", path.display());
                            return config;
                        }
                        Err(e) => {
                            tracing::warn!("Failed to parse config at {}: {}", path.display(), e);
                        }
                    },
                    Err(e) => {
                        tracing::warn!("Failed to read config at {}: {}", path.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Self::default()
    }

    pub fn validate(&self) -> Result<(), DriverError> {
        Url::parse(&self.base_url).map_err(|e| DriverError::InvalidUrl {
            url: self.base_url.clone(),
            reason: e.to_string(),
        })?;
        Ok(())
    }

    /// Absolute URL for a page path under the base URL.
    pub fn page_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}
