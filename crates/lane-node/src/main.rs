//! Lane Tracking Node - Main Entry Point

use std::path::PathBuf;

use lane_node::{init_logging, install_metrics, load_config, run, CONFIG_PATH_ENV};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var(CONFIG_PATH_ENV).ok())
        .map(PathBuf::from);

    let config = load_config(config_path.as_deref())?;
    init_logging(&config.log_level);

    info!("=== Lane Tracking Node v{} ===", env!("CARGO_PKG_VERSION"));
    match &config_path {
        Some(path) => info!("Configuration: {}", path.display()),
        None => info!("Configuration: defaults and environment"),
    }

    if let Some(addr) = &config.metrics_addr {
        install_metrics(addr)?;
    }

    match run(config).await {
        Ok(summary) => {
            info!(
                "Published {} of {} frames ({} dropped)",
                summary.published, summary.frames_read, summary.frames_dropped
            );
            Ok(())
        }
        Err(e) => {
            error!("Lane node failed: {}", e);
            Err(e.into())
        }
    }
}
