use super::{ScenarioContext, ScenarioKind};
use crate::client::{ApiRequest, HttpClient};
use crate::transaction::{exchange, Checks};
use rand::seq::SliceRandom;
use rand::Rng;

pub(super) async fn get_team<C, R>(ctx: &ScenarioContext<C>, rng: &mut R)
where
    C: HttpClient + Sync,
    R: Rng + Send,
{
    let Some(team) = ctx.teams().choose(rng) else {
        return;
    };
    let request = ApiRequest::get("/api/v1/team/get").query("team_name", team.team_name.as_str());

    let res = exchange(ctx, ScenarioKind::GetTeam, request, &[200]).await;

    let checks = Checks::new(ctx.sink())
        .check("team retrieved", res.status_is(200))
        .check(ctx.latency_check(), ctx.within_budget(res.elapsed));

    res.report(ctx.sink(), checks.passed());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::tests::ScriptedClient;
    use crate::client::Method;
    use crate::scenario::tests::context;
    use crate::sink::{Counter, Rate};
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[tokio::test]
    async fn queries_a_known_team() {
        let (ctx, sink) = context(ScriptedClient::status(200));
        let mut rng = SmallRng::seed_from_u64(2);

        get_team(&ctx, &mut rng).await;

        let seen = ctx.client.seen();
        assert_eq!(seen[0].method, Method::Get);
        assert_eq!(seen[0].path, "/api/v1/team/get");
        assert_eq!(seen[0].query[0].0, "team_name");
        assert!(ctx.teams().iter().any(|t| t.team_name == seen[0].query[0].1));
        assert_eq!(sink.check("team retrieved"), Some(true));
    }

    #[tokio::test]
    async fn unexpected_404_is_tolerated_but_fails_the_check() {
        let (ctx, sink) = context(ScriptedClient::status(404));
        let mut rng = SmallRng::seed_from_u64(2);

        get_team(&ctx, &mut rng).await;

        assert_eq!(sink.count(Counter::Expected404s), 1);
        assert_eq!(sink.rate_samples(Rate::RealErrors), vec![false]);
        assert_eq!(sink.rate_samples(Rate::FailedNo404), vec![false]);
        assert_eq!(sink.check("team retrieved"), Some(false));
        assert_eq!(sink.rate_samples(Rate::Errors), vec![true]);
    }
}
