//! The top-level load test future.
use crate::client::{HttpClient, ReqwestClient};
use crate::error::RunError;
use crate::lifecycle::{self, Summary};
use crate::scenario::ScenarioContext;
use crate::scheduler::Scheduler;
use crate::sink::RunMetrics;
use crate::tracker::ResourceTracker;
use revload_core::{
    default_teams, MetricsSnapshot, RunConfig, Team, Thresholds, Verdict, EXIT_THRESHOLDS_FAILED,
};
use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};
#[allow(unused_imports)]
use tracing::{debug, error, info, instrument, warn};

/// Outcome of a finished (or cancelled) run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub snapshot: MetricsSnapshot,
    pub verdict: Verdict,
}

impl RunReport {
    /// Evaluate whatever `metrics` holds right now.
    pub fn from_metrics(metrics: &RunMetrics, thresholds: &Thresholds) -> Self {
        let snapshot = metrics.snapshot();
        let verdict = thresholds.evaluate(&snapshot);
        Self { snapshot, verdict }
    }

    pub fn passed(&self) -> bool {
        self.verdict.passed
    }

    pub fn summary(&self) -> Summary<'_> {
        lifecycle::teardown(&self.snapshot, &self.verdict)
    }

    /// 0 when every threshold passed, 99 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.passed() {
            0
        } else {
            EXIT_THRESHOLDS_FAILED
        }
    }
}

/// A configured load test. Runs when awaited.
///
/// # Example
/// ```no_run
/// use revload::LoadTest;
/// use revload_core::RunConfig;
///
/// #[tokio::main]
/// async fn main() -> Result<(), revload::RunError> {
///     let report = LoadTest::from_config(RunConfig::new("http://localhost:8080"))?.await;
///     println!("{}", report.summary());
///     std::process::exit(report.exit_code());
/// }
/// ```
#[pin_project::pin_project]
pub struct LoadTest<C> {
    client: Option<C>,
    config: RunConfig,
    teams: Vec<Team>,
    tracker: Arc<ResourceTracker>,
    metrics: Arc<RunMetrics>,
    runner_fut: Option<Pin<Box<dyn Future<Output = RunReport> + Send>>>,
}

impl LoadTest<ReqwestClient> {
    pub fn from_config(config: RunConfig) -> Result<Self, RunError> {
        let client = ReqwestClient::new(&config.base_url)?;
        Self::new(client, config)
    }
}

impl<C> LoadTest<C>
where
    C: HttpClient + Send + Sync + 'static,
{
    pub fn new(client: C, config: RunConfig) -> Result<Self, RunError> {
        config.validate()?;
        Ok(Self {
            client: Some(client),
            config,
            teams: default_teams(),
            tracker: Arc::new(ResourceTracker::new()),
            metrics: Arc::new(RunMetrics::new()),
            runner_fut: None,
        })
    }

    /// Seed teams to create during setup and draw users from.
    pub fn teams(mut self, teams: Vec<Team>) -> Self {
        self.teams = teams;
        self
    }

    /// Live metrics of the run, readable while it is in flight or after it was dropped.
    pub fn metrics(&self) -> Arc<RunMetrics> {
        self.metrics.clone()
    }

    pub fn tracker(&self) -> Arc<ResourceTracker> {
        self.tracker.clone()
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }
}

impl<C> Future for LoadTest<C>
where
    C: HttpClient + Send + Sync + 'static,
{
    type Output = RunReport;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        if this.runner_fut.is_none() {
            if let Some(client) = this.client.take() {
                *this.runner_fut = Some(Box::pin(run_load_test(
                    client,
                    this.config.clone(),
                    std::mem::take(this.teams),
                    this.tracker.clone(),
                    this.metrics.clone(),
                )));
            }
        }

        match this.runner_fut {
            Some(runner) => runner.as_mut().poll(cx),
            None => unreachable!(),
        }
    }
}

#[instrument(name = "load_test", skip_all, fields(base_url = %config.base_url))]
async fn run_load_test<C>(
    client: C,
    config: RunConfig,
    teams: Vec<Team>,
    tracker: Arc<ResourceTracker>,
    metrics: Arc<RunMetrics>,
) -> RunReport
where
    C: HttpClient + Send + Sync + 'static,
{
    info!(
        "Starting load test, peak target {} iterations/s",
        config.profile.peak_target()
    );

    let teams = lifecycle::setup(&client, teams).await;
    let ctx = ScenarioContext::new(client, teams, tracker, metrics.clone())
        .with_latency_budget(config.thresholds.p95_latency);

    let mut scheduler = Scheduler::new(Arc::new(ctx), &config);
    metrics.mark_started();
    scheduler.run().await;

    let report = RunReport::from_metrics(&metrics, &config.thresholds);
    if report.passed() {
        info!("All thresholds passed.");
    } else {
        for failure in report.verdict.failures() {
            warn!("Threshold failed: {failure}");
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::tests::{respond, ScriptedClient};
    use revload_core::{ConfigError, LoadProfile, Stage};
    use std::time::Duration;

    fn config(stages: Vec<Stage>) -> RunConfig {
        RunConfig {
            profile: LoadProfile::new(stages),
            iteration_pause: Duration::from_millis(20),
            graceful_stop: Duration::from_secs(1),
            seed: Some(1),
            ..RunConfig::default()
        }
    }

    /// Answers like a healthy service: every request gets its scenario's success status.
    fn healthy() -> ScriptedClient {
        ScriptedClient::new(|req| {
            Ok(match req.path {
                "/api/v1/pullRequests/create" | "/api/v1/team/add" => respond(201, "{}"),
                "/api/v1/statistics" => respond(
                    200,
                    r#"{"assignments_by_user":{},"pull_requests":{"total_prs":0}}"#,
                ),
                _ => respond(200, "{}"),
            })
        })
    }

    #[test]
    fn invalid_config_is_rejected() {
        let res = LoadTest::new(ScriptedClient::status(200), config(vec![]));
        assert!(matches!(
            res,
            Err(RunError::Config(ConfigError::EmptyProfile))
        ));
    }

    #[test]
    fn relative_base_url_is_rejected() {
        let res = LoadTest::from_config(RunConfig::new("localhost"));
        assert!(matches!(res, Err(RunError::Transport(_))));
    }

    #[tokio::test]
    #[ntest::timeout(10_000)]
    async fn elapsed_excludes_time_before_the_run() {
        let test = LoadTest::new(
            healthy(),
            config(vec![Stage::new(Duration::from_secs(1), 5.)]),
        )
        .unwrap();
        tokio::time::sleep(Duration::from_millis(1_500)).await;

        let report = test.await;

        let elapsed = report.snapshot.elapsed;
        assert!(elapsed >= Duration::from_secs(1), "elapsed={elapsed:?}");
        assert!(elapsed < Duration::from_secs(2), "elapsed={elapsed:?}");
    }

    #[tracing_test::traced_test]
    #[tokio::test]
    #[ntest::timeout(10_000)]
    async fn healthy_service_passes() {
        let test = LoadTest::new(
            healthy(),
            config(vec![Stage::new(Duration::from_secs(2), 10.)]),
        )
        .unwrap();
        let metrics = test.metrics();

        let report = test.await;

        assert!(report.passed(), "{}", report.summary());
        assert_eq!(report.exit_code(), 0);
        assert!(report.snapshot.iterations > 0);
        assert_eq!(report.snapshot.iterations, metrics.snapshot().iterations);
        assert_eq!(report.snapshot.real_errors.hits, 0);
        assert!(logs_contain("Created team backend: 201"));
    }

    #[tokio::test]
    #[ntest::timeout(10_000)]
    async fn failing_service_fails_thresholds() {
        let test = LoadTest::new(
            ScriptedClient::status(500),
            config(vec![Stage::new(Duration::from_secs(2), 10.)]),
        )
        .unwrap();
        let tracker = test.tracker();

        let report = test.await;

        assert!(!report.passed());
        assert_eq!(report.exit_code(), EXIT_THRESHOLDS_FAILED);
        assert_eq!(report.snapshot.real_errors.rate(), 1.);
        assert!(tracker.is_empty());
    }

    #[tokio::test]
    #[ntest::timeout(10_000)]
    async fn cancelled_run_still_reports() {
        let test = LoadTest::new(
            healthy(),
            config(vec![Stage::new(Duration::from_secs(60), 10.)]),
        )
        .unwrap();
        let metrics = test.metrics();
        let thresholds = test.config().thresholds;

        let res = tokio::time::timeout(Duration::from_millis(2_500), test).await;
        assert!(res.is_err());

        let report = RunReport::from_metrics(&metrics, &thresholds);
        assert!(report.snapshot.iterations > 0);
        assert!(report.passed());
    }
}
