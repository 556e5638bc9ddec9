use std::path::PathBuf;

use clap::Parser;
use dotenvy::dotenv;
use tracing::{error, info};

use verify_states::config::VerifyConfig;
use verify_states::logging::{init_logging, LoggingConfig};
use verify_states::scenario;

/// Drives a headless browser through the products page's error and
/// empty states and saves a screenshot of each as evidence. Runs with
/// no flags against the local dev server.
#[derive(Parser, Debug)]
#[command(name = "verify-states", version, about)]
struct Cli {
    /// Base URL of the running web application.
    #[arg(long)]
    base_url: Option<String>,
    /// Directory to write the screenshot evidence to.
    #[arg(long)]
    output_dir: Option<PathBuf>,
    /// Visibility assertion timeout in milliseconds.
    #[arg(long)]
    timeout_ms: Option<u64>,
    /// Run the browser with a visible window.
    #[arg(long)]
    headed: bool,
}

#[tokio::main]
async fn main() {
    let _ = dotenv();
    let cli = Cli::parse();

    let _guard = match init_logging(LoggingConfig::default()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            None
        }
    };

    let mut config = VerifyConfig::load();
    if let Some(base_url) = cli.base_url {
        config.base_url = base_url;
    }
    if let Some(output_dir) = cli.output_dir {
        config.output_dir = output_dir;
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        config.timeout_ms = timeout_ms;
    }
    if cli.headed {
        config.headless = false;
    }

    match scenario::run(&config).await {
        Ok(report) => {
            for path in &report.evidence {
                info!("Evidence written: {}", path.display());
            }
        }
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    }
}
