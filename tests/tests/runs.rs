mod utils;
#[allow(unused)]
use utils::*;

use mock_service::MockConfig;
use revload::{LoadTest, ReqwestClient};
use revload_core::{LoadProfile, RunConfig, Stage};
use std::time::Duration;

fn short_run(base_url: &str) -> RunConfig {
    let mut config = RunConfig::new(base_url);
    config.profile = LoadProfile::new(vec![
        Stage::new(Duration::from_secs(1), 10.),
        Stage::new(Duration::from_secs(2), 10.),
    ]);
    config.iteration_pause = Duration::from_millis(100);
    config.graceful_stop = Duration::from_secs(1);
    config.seed = Some(0);
    config
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(20_000)]
async fn short_run_passes() {
    let base_url = mock(MockConfig::default()).await;
    let config = short_run(&base_url);
    let report = LoadTest::new(ReqwestClient::new(&base_url).unwrap(), config)
        .unwrap()
        .await;

    assert!(report.snapshot.requests() > 0);
    assert_eq!(report.snapshot.real_errors.hits, 0);
    assert!(report.passed(), "{}", report.summary());
    assert_eq!(report.exit_code(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(20_000)]
async fn failing_service_breaks_thresholds() {
    let base_url = mock(MockConfig {
        error_rate: 1.,
        ..Default::default()
    })
    .await;
    let report = LoadTest::new(ReqwestClient::new(&base_url).unwrap(), short_run(&base_url))
        .unwrap()
        .await;

    assert!(report.snapshot.requests() > 0);
    assert!(!report.passed());
    assert_eq!(report.exit_code(), 99);
    assert!(report
        .verdict
        .failures()
        .any(|r| r.metric == "real_errors"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(20_000)]
async fn slow_service_breaks_latency_threshold() {
    let base_url = mock(MockConfig {
        delay: Duration::from_millis(80),
        ..Default::default()
    })
    .await;
    let mut config = short_run(&base_url);
    config.thresholds.p95_latency = Duration::from_millis(50);
    let report = LoadTest::new(ReqwestClient::new(&base_url).unwrap(), config)
        .unwrap()
        .await;

    assert!(!report.passed());
    assert!(report.verdict.failures().any(|r| r.name == "p(95)"));
}

#[cfg(feature = "integration")]
mod integration {
    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    #[ntest::timeout(150_000)]
    async fn default_profile_passes() {
        let base_url = mock(MockConfig {
            delay: Duration::from_millis(5),
            ..Default::default()
        })
        .await;
        let report = LoadTest::from_config(RunConfig::new(&base_url)).unwrap().await;

        assert!(report.passed(), "{}", report.summary());
        assert!(report.snapshot.iteration_rate() > 3.);
    }
}
