mod utils;
use utils::*;

use mock_service::MockConfig;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use revload::lifecycle::setup;
use revload::scenario::{ScenarioContext, ScenarioKind};
use revload::{ResourceTracker, RunMetrics};
use revload_core::{default_teams, Thresholds};
use std::sync::Arc;

async fn context() -> (ScenarioContext<revload::ReqwestClient>, Arc<RunMetrics>) {
    let (client, _) = client(MockConfig::default()).await;
    let teams = setup(&client, default_teams()).await;
    let metrics = Arc::new(RunMetrics::new());
    let ctx = ScenarioContext::new(
        client,
        teams,
        Arc::new(ResourceTracker::new()),
        metrics.clone(),
    );
    (ctx, metrics)
}

#[tokio::test]
#[ntest::timeout(10_000)]
async fn created_pull_requests_are_merged_and_forgotten() {
    let (ctx, metrics) = context().await;
    let mut rng = SmallRng::seed_from_u64(7);

    ScenarioKind::CreatePullRequest.run(&ctx, &mut rng).await;
    assert_eq!(ctx.tracker().len(), 1);

    // One in ten merges targets a synthetic id; keep going until the tracked one is hit.
    for _ in 0..50 {
        ScenarioKind::MergePullRequest.run(&ctx, &mut rng).await;
        if ctx.tracker().is_empty() {
            break;
        }
    }
    assert!(ctx.tracker().is_empty());

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.real_errors.hits, 0);
    assert_eq!(snapshot.errors.hits, 0);
}

#[tokio::test]
#[ntest::timeout(10_000)]
async fn every_scenario_is_clean_against_a_healthy_service() {
    let (ctx, metrics) = context().await;
    let mut rng = SmallRng::seed_from_u64(42);

    for _ in 0..5 {
        for scenario in ScenarioKind::ALL {
            scenario.run(&ctx, &mut rng).await;
        }
    }

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.requests(), 35);
    assert_eq!(snapshot.transport_failures, 0);
    assert_eq!(snapshot.real_errors.hits, 0);
    assert!(snapshot
        .checks
        .iter()
        .any(|c| c.name == "has data" && c.fails == 0 && c.passes == 5));
    assert!(Thresholds::default().evaluate(&snapshot).passed);
}

#[tokio::test]
#[ntest::timeout(10_000)]
async fn statistics_has_both_sections() {
    let (_, base_url) = client(MockConfig::default()).await;
    let body: serde_json::Value = reqwest::get(format!("{base_url}/api/v1/statistics"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert!(body.get("assignments_by_user").is_some());
    assert!(body.get("pull_requests").is_some());
}
