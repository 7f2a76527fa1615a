use metrics_exporter_prometheus::PrometheusBuilder;
use mock_service::MockConfig;
use revload::ReqwestClient;
use std::sync::OnceLock;
use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;

#[allow(unused)]
pub fn init() {
    static ONCE_LOCK: OnceLock<()> = OnceLock::new();

    ONCE_LOCK.get_or_init(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            default_panic(info);
            error!("Panic occurred: {info:?}");
        }));

        let _ = FmtSubscriber::builder()
            .with_max_level(Level::DEBUG)
            .with_env_filter("revload=debug,mock_service=info,axum::rejection=trace")
            .try_init();

        let _ = PrometheusBuilder::new().install_recorder();
    });
}

/// Start a fresh mock service and return its base URL.
#[allow(unused)]
pub async fn mock(config: MockConfig) -> String {
    init();
    let addr = mock_service::spawn(config).await.unwrap();
    format!("http://{addr}")
}

#[allow(unused)]
pub async fn client(config: MockConfig) -> (ReqwestClient, String) {
    let base_url = mock(config).await;
    (ReqwestClient::new(&base_url).unwrap(), base_url)
}
