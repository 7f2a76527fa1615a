use super::{ScenarioContext, ScenarioKind};
use crate::client::{ApiRequest, HttpClient};
use crate::transaction::{exchange, Checks};
use rand::Rng;
use revload_core::SetIsActive;

const SET_ACTIVE_EXPECTED: &[u16] = &[200, 404];

pub(super) async fn set_is_active<C, R>(ctx: &ScenarioContext<C>, rng: &mut R)
where
    C: HttpClient + Sync,
    R: Rng + Send,
{
    let Some((_, member)) = ctx.random_member(rng) else {
        return;
    };
    let body = SetIsActive {
        user_id: member.user_id.clone(),
        is_active: rng.gen_bool(0.5),
    };

    let res = exchange(
        ctx,
        ScenarioKind::SetUserActive,
        ApiRequest::post("/api/v1/users/setIsActive", body),
        SET_ACTIVE_EXPECTED,
    )
    .await;

    let checks = Checks::new(ctx.sink())
        .check("user updated", res.status_in(SET_ACTIVE_EXPECTED))
        .check(ctx.latency_check(), ctx.within_budget(res.elapsed));

    res.report(ctx.sink(), checks.passed());
}

pub(super) async fn get_reviews<C, R>(ctx: &ScenarioContext<C>, rng: &mut R)
where
    C: HttpClient + Sync,
    R: Rng + Send,
{
    let Some((_, member)) = ctx.random_member(rng) else {
        return;
    };
    let request =
        ApiRequest::get("/api/v1/users/getReview").query("user_id", member.user_id.as_str());

    let res = exchange(ctx, ScenarioKind::GetUserReviews, request, &[200]).await;

    let checks = Checks::new(ctx.sink())
        .check("reviews retrieved", res.status_is(200))
        .check(ctx.latency_check(), ctx.within_budget(res.elapsed));

    res.report(ctx.sink(), checks.passed());
}
