use mock_service::MockConfig;
use std::net::SocketAddr;
use std::time::Duration;
use tracing_subscriber::FmtSubscriber;

const DEFAULT_ADDR: &str = "0.0.0.0:8080";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    FmtSubscriber::builder()
        .with_env_filter("mock_service=debug,tower_http=info")
        .init();

    let addr: SocketAddr = std::env::var("MOCK_ADDR")
        .unwrap_or_else(|_| DEFAULT_ADDR.to_string())
        .parse()?;

    let mut config = MockConfig::default();
    if let Ok(delay_ms) = std::env::var("MOCK_DELAY_MS") {
        config.delay = Duration::from_millis(delay_ms.parse()?);
    }
    if let Ok(error_rate) = std::env::var("MOCK_ERROR_RATE") {
        config.error_rate = mock_service::parse_error_rate(&error_rate)?;
    }
    if let Ok(max_rps) = std::env::var("MOCK_MAX_RPS") {
        config.max_rps = Some(max_rps.parse()?);
    }

    if let Ok(metrics_addr) = std::env::var("MOCK_METRICS_ADDR") {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(metrics_addr.parse::<SocketAddr>()?)
            .install()?;
    }

    mock_service::run(addr, config).await
}
