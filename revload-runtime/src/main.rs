mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::RevloadCli;
use metrics_exporter_prometheus::PrometheusBuilder;
use revload::{LoadTest, RunReport};
#[allow(unused)]
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const DEFAULT_LOG_FILTER: &str = "revload=info,revload_runtime=info";
const EXIT_ERROR: i32 = 1;
const EXIT_CANCELLED: i32 = 130;

#[tokio::main]
async fn main() {
    let cli = RevloadCli::parse();
    init_tracing(cli.log_filter.as_deref());

    let code = match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            error!("{err:#}");
            EXIT_ERROR
        }
    };
    std::process::exit(code);
}

fn init_tracing(filter: Option<&str>) {
    let filter = match filter {
        Some(filter) => EnvFilter::new(filter),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
    };

    FmtSubscriber::builder().with_env_filter(filter).init();
}

async fn run(cli: RevloadCli) -> Result<i32> {
    let config = cli.run_config()?;

    if let Some(addr) = cli.metrics_addr {
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("Failed to install the Prometheus exporter")?;
        info!("Serving metrics on {addr}");
    }

    info!("Target: {}", config.base_url);
    let test = LoadTest::from_config(config)?;
    let metrics = test.metrics();
    let thresholds = test.config().thresholds;

    tokio::select! {
        report = test => {
            println!("{}", report.summary());
            Ok(report.exit_code())
        }
        res = tokio::signal::ctrl_c() => {
            res.context("Failed to listen for Ctrl-C")?;
            warn!("Interrupted; summarizing what was collected so far.");
            let report = RunReport::from_metrics(&metrics, &thresholds);
            println!("{}", report.summary());
            Ok(EXIT_CANCELLED)
        }
    }
}
