use anyhow::{Context, Result};
use clap::Parser;
use revload_core::{LoadProfile, RunConfig, Stage};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Ramp traffic against the pull request reviewer service and check it against its SLOs.
///
/// Exits 0 when every threshold passes, 99 when any fails, 1 on configuration or runtime errors
/// and 130 when interrupted.
#[derive(Parser, Debug)]
#[command(version = "0.1")]
pub(crate) struct RevloadCli {
    /// JSON run configuration. Flags override its fields.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Base URL of the service under test.
    #[arg(short, long, env = "BASE_URL")]
    pub base_url: Option<String>,

    /// A `<duration>:<target>` ramp stage, e.g. `20s:5`. Repeat for more stages.
    #[arg(short, long = "stage")]
    pub stages: Vec<Stage>,

    /// Upper bound for the 95th latency percentile, in milliseconds.
    #[arg(long)]
    pub p95_ms: Option<u64>,

    #[arg(long)]
    pub max_error_rate: Option<f64>,

    #[arg(long)]
    pub max_real_error_rate: Option<f64>,

    #[arg(long = "max-failed-no-404-rate")]
    pub max_failed_no_404_rate: Option<f64>,

    /// Pause after every iteration, e.g. `1s`.
    #[arg(long)]
    pub pause: Option<humantime::Duration>,

    /// How long in-flight iterations may finish once the profile ends.
    #[arg(long)]
    pub graceful_stop: Option<humantime::Duration>,

    #[arg(long)]
    pub max_vus: Option<usize>,

    /// Seed for reproducible scenario selection.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Serve Prometheus metrics on this address.
    #[arg(long)]
    pub metrics_addr: Option<SocketAddr>,

    /// Tracing filter, overriding `RUST_LOG`.
    #[arg(long)]
    pub log_filter: Option<String>,
}

impl RevloadCli {
    /// The file configuration (or defaults) with every given flag applied on top.
    pub fn run_config(&self) -> Result<RunConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                serde_json::from_str(&raw)
                    .with_context(|| format!("Failed to parse {}", path.display()))?
            }
            None => RunConfig::default(),
        };

        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.trim_end_matches('/').to_string();
        }
        if !self.stages.is_empty() {
            config.profile = LoadProfile::new(self.stages.clone());
        }
        if let Some(ms) = self.p95_ms {
            config.thresholds.p95_latency = Duration::from_millis(ms);
        }
        if let Some(rate) = self.max_error_rate {
            config.thresholds.max_error_rate = rate;
        }
        if let Some(rate) = self.max_real_error_rate {
            config.thresholds.max_real_error_rate = rate;
        }
        if let Some(rate) = self.max_failed_no_404_rate {
            config.thresholds.max_failed_no_404_rate = rate;
        }
        if let Some(pause) = self.pause {
            config.iteration_pause = pause.into();
        }
        if let Some(graceful_stop) = self.graceful_stop {
            config.graceful_stop = graceful_stop.into();
        }
        if let Some(max_vus) = self.max_vus {
            config.max_vus = max_vus;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }

        config.validate()?;
        Ok(config)
    }
}
