use super::{generate_pull_request_id, pick_pr_target, ScenarioContext, ScenarioKind};
use crate::client::{ApiRequest, HttpClient};
use crate::transaction::{exchange, Checks};
use rand::Rng;
use revload_core::{CreatePullRequest, MergePullRequest, ReassignReviewer};
#[allow(unused)]
use tracing::{debug, trace};

const CREATE_EXPECTED: &[u16] = &[201];
const MERGE_EXPECTED: &[u16] = &[200, 404, 400];
const REASSIGN_EXPECTED: &[u16] = &[200, 404, 400, 409];

pub(super) async fn create<C, R>(ctx: &ScenarioContext<C>, rng: &mut R)
where
    C: HttpClient + Sync,
    R: Rng + Send,
{
    let Some((_, author)) = ctx.random_member(rng) else {
        return;
    };
    let pull_request_id = generate_pull_request_id(rng);
    let body = CreatePullRequest {
        pull_request_name: format!("Test PR {pull_request_id}"),
        pull_request_id: pull_request_id.clone(),
        author_id: author.user_id.clone(),
    };

    let res = exchange(
        ctx,
        ScenarioKind::CreatePullRequest,
        ApiRequest::post("/api/v1/pullRequests/create", body),
        CREATE_EXPECTED,
    )
    .await;

    let checks = Checks::new(ctx.sink())
        .check("PR created", res.status_is(201))
        .check(ctx.latency_check(), ctx.within_budget(res.elapsed));

    if res.status_is(201) {
        ctx.tracker().record(pull_request_id);
    }

    res.report(ctx.sink(), checks.passed());
}

pub(super) async fn merge<C, R>(ctx: &ScenarioContext<C>, rng: &mut R)
where
    C: HttpClient + Sync,
    R: Rng + Send,
{
    let target = pick_pr_target(ctx.tracker(), rng);
    let body = MergePullRequest {
        pull_request_id: target.id().to_string(),
    };

    let res = exchange(
        ctx,
        ScenarioKind::MergePullRequest,
        ApiRequest::post("/api/v1/pullRequests/merge", body),
        MERGE_EXPECTED,
    )
    .await;

    let checks = Checks::new(ctx.sink())
        .check("PR merge attempted", res.status_in(MERGE_EXPECTED))
        .check(ctx.latency_check(), ctx.within_budget(res.elapsed));

    // NOTE: A concurrent merge may have removed it already.
    if res.status_is(200) && target.is_tracked() && ctx.tracker().remove(target.id()) {
        trace!("Merged {}", target.id());
    }

    res.report(ctx.sink(), checks.passed());
}

pub(super) async fn reassign<C, R>(ctx: &ScenarioContext<C>, rng: &mut R)
where
    C: HttpClient + Sync,
    R: Rng + Send,
{
    let Some((_, old_reviewer)) = ctx.random_member(rng) else {
        return;
    };
    let old_user_id = old_reviewer.user_id.clone();
    let target = pick_pr_target(ctx.tracker(), rng);
    let body = ReassignReviewer {
        pull_request_id: target.id().to_string(),
        old_user_id,
    };

    let res = exchange(
        ctx,
        ScenarioKind::ReassignReviewer,
        ApiRequest::post("/api/v1/pullRequests/reassign", body),
        REASSIGN_EXPECTED,
    )
    .await;

    let checks = Checks::new(ctx.sink())
        .check("reassign attempted", res.status_in(REASSIGN_EXPECTED))
        .check(ctx.latency_check(), ctx.within_budget(res.elapsed));

    res.report(ctx.sink(), checks.passed());
}
