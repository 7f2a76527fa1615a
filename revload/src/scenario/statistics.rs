use super::{ScenarioContext, ScenarioKind};
use crate::client::{ApiRequest, HttpClient};
use crate::transaction::{exchange, Checks};

pub(super) async fn get_statistics<C>(ctx: &ScenarioContext<C>)
where
    C: HttpClient + Sync,
{
    let res = exchange(
        ctx,
        ScenarioKind::GetStatistics,
        ApiRequest::get("/api/v1/statistics"),
        &[200],
    )
    .await;

    let checks = Checks::new(ctx.sink())
        .check("statistics retrieved", res.status_is(200))
        .check(ctx.latency_check(), ctx.within_budget(res.elapsed))
        .check("has data", has_data(&res.body));

    res.report(ctx.sink(), checks.passed());
}

/// The body parses as a JSON object carrying both statistics sections.
fn has_data(body: &[u8]) -> bool {
    match serde_json::from_slice::<serde_json::Value>(body) {
        Ok(serde_json::Value::Object(stats)) => {
            stats.contains_key("assignments_by_user") && stats.contains_key("pull_requests")
        }
        _ => false,
    }
}
