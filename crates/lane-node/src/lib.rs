//! Lane Tracking Node
//!
//! Replays a camera frame sequence through the lane tracker, publishes the
//! annotated and bird's-eye images, and logs every detection for the planner.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use metrics_exporter_prometheus::PrometheusBuilder;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

mod fits;
mod pipeline;

pub use fits::{FitLog, FitRecord};
pub use pipeline::{run, run_pipeline, RunSummary};

use frame_io::FrameError;
use lane_tracker::{LaneConfig, LaneError};

/// Environment variable holding the config file path
pub const CONFIG_PATH_ENV: &str = "LANE_NODE_CONFIG";

/// Prefix for per-key environment overrides (`LANE_NODE__LANE__HISTORY_CAPACITY`)
pub const ENV_PREFIX: &str = "LANE_NODE";

/// Detections log written next to the output images
pub const FITS_FILE: &str = "fits.jsonl";

/// Metric names
pub mod metric_names {
    pub const FRAMES_TOTAL: &str = "lane_frames_total";
    pub const FRAMES_DROPPED: &str = "lane_frames_dropped_total";
    pub const DETECTIONS: &str = "lane_detections_total";
    pub const FRAMES_REJECTED: &str = "lane_frames_rejected_total";
    pub const TRACK_LOST: &str = "lane_track_lost_total";
}

/// Lane node errors
#[derive(Error, Debug)]
pub enum NodeError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Frame I/O error: {0}")]
    Frame(#[from] FrameError),

    #[error("Lane tracker error: {0}")]
    Lane(#[from] LaneError),

    #[error("Worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Metrics exporter error: {0}")]
    Metrics(String),
}

/// Node configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Directory of input frames (PNG/JPEG), replayed in file-name order
    pub input_dir: PathBuf,

    /// Directory for annotated/bird's-eye images and the fits log
    pub output_dir: PathBuf,

    /// Frame period of the replayed stream (ms)
    pub frame_interval_ms: u64,

    /// Maximum log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Prometheus listen address; metrics are only exported when set
    pub metrics_addr: Option<String>,

    /// Write `fits.jsonl`
    pub write_fits: bool,

    /// Lane tracker parameters
    pub lane: LaneConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("frames"),
            output_dir: PathBuf::from("output"),
            frame_interval_ms: 33,
            log_level: "info".to_string(),
            metrics_addr: None,
            write_fits: true,
            lane: LaneConfig::default(),
        }
    }
}

/// Load configuration: defaults, then the optional file, then environment overrides
pub fn load_config(path: Option<&Path>) -> Result<NodeConfig, NodeError> {
    build_config(path, environment())
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .try_parsing(true)
}

fn build_config(path: Option<&Path>, env: Environment) -> Result<NodeConfig, NodeError> {
    let mut builder = Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(File::from(path).required(true));
    }
    let config = builder.add_source(env).build()?;
    Ok(config.try_deserialize()?)
}

/// Initialize logging
pub fn init_logging(level: &str) {
    let level = level.parse::<Level>().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");
}

/// Install the Prometheus exporter on `addr`
pub fn install_metrics(addr: &str) -> Result<(), NodeError> {
    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| NodeError::Metrics(format!("invalid metrics_addr {:?}: {}", addr, e)))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| NodeError::Metrics(e.to_string()))?;

    info!("Prometheus metrics on http://{}/metrics", addr);
    Ok(())
}
