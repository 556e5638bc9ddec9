pub mod assertions;
pub mod browser;
pub mod config;
pub mod logging;
pub mod routes;
pub mod scenario;

pub use browser::{BrowserDriver, DriverError};
pub use config::VerifyConfig;
pub use scenario::RunReport;
