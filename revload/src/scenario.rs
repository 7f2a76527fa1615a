//! The scenario library: one request shape per operation of the target service.
mod pull_requests;
mod statistics;
mod teams;
mod users;

use crate::client::HttpClient;
use crate::sink::MetricsSink;
use crate::tracker::ResourceTracker;
use rand::seq::SliceRandom;
use rand::Rng;
use revload_core::{Member, Team, DEFAULT_LATENCY_BUDGET, TRACKED_TARGET_PROBABILITY};
use std::sync::Arc;
use std::time::Duration;
#[allow(unused)]
use tracing::{debug, trace, warn};

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const SUFFIX_LEN: usize = 9;

/// Every scenario a virtual user can run.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ScenarioKind {
    CreatePullRequest,
    GetTeam,
    SetUserActive,
    GetUserReviews,
    MergePullRequest,
    ReassignReviewer,
    GetStatistics,
}

impl ScenarioKind {
    pub const ALL: [ScenarioKind; 7] = [
        ScenarioKind::CreatePullRequest,
        ScenarioKind::GetTeam,
        ScenarioKind::SetUserActive,
        ScenarioKind::GetUserReviews,
        ScenarioKind::MergePullRequest,
        ScenarioKind::ReassignReviewer,
        ScenarioKind::GetStatistics,
    ];

    /// Name used to tag latency samples.
    pub fn name(self) -> &'static str {
        match self {
            ScenarioKind::CreatePullRequest => "CreatePR",
            ScenarioKind::GetTeam => "GetTeam",
            ScenarioKind::SetUserActive => "SetUserActive",
            ScenarioKind::GetUserReviews => "GetUserReviews",
            ScenarioKind::MergePullRequest => "MergePR",
            ScenarioKind::ReassignReviewer => "ReassignReviewer",
            ScenarioKind::GetStatistics => "GetStatistics",
        }
    }

    /// Issue this scenario's request once and report everything it observed.
    ///
    /// Never fails; every outcome is folded into the metrics sink.
    pub async fn run<C, R>(self, ctx: &ScenarioContext<C>, rng: &mut R)
    where
        C: HttpClient + Sync,
        R: Rng + Send,
    {
        trace!("Running {}", self.name());
        match self {
            ScenarioKind::CreatePullRequest => pull_requests::create(ctx, rng).await,
            ScenarioKind::GetTeam => teams::get_team(ctx, rng).await,
            ScenarioKind::SetUserActive => users::set_is_active(ctx, rng).await,
            ScenarioKind::GetUserReviews => users::get_reviews(ctx, rng).await,
            ScenarioKind::MergePullRequest => pull_requests::merge(ctx, rng).await,
            ScenarioKind::ReassignReviewer => pull_requests::reassign(ctx, rng).await,
            ScenarioKind::GetStatistics => statistics::get_statistics(ctx).await,
        }
    }
}

impl std::fmt::Display for ScenarioKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Uniform choice among the seven scenarios.
pub fn select_scenario<R: Rng>(rng: &mut R) -> ScenarioKind {
    ScenarioKind::ALL[rng.gen_range(0..ScenarioKind::ALL.len())]
}

/// Pull request a merge or reassign should target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrTarget {
    /// An id previously created during this run.
    Tracked(String),
    /// A synthetic id the service has never seen.
    Synthetic(String),
}

impl PrTarget {
    pub fn id(&self) -> &str {
        match self {
            PrTarget::Tracked(id) | PrTarget::Synthetic(id) => id,
        }
    }

    pub fn is_tracked(&self) -> bool {
        matches!(self, PrTarget::Tracked(_))
    }
}

/// With a non-empty tracker, a tracked id 90% of the time. Otherwise a synthetic id that should
/// produce a 404.
pub fn pick_pr_target<R: Rng>(tracker: &ResourceTracker, rng: &mut R) -> PrTarget {
    if rng.gen_bool(TRACKED_TARGET_PROBABILITY) {
        if let Some(id) = tracker.sample_random(rng) {
            return PrTarget::Tracked(id);
        }
    }

    PrTarget::Synthetic(format!("pr_nonexistent_{}", base36_suffix(rng)))
}

/// `pr_<unix millis>_<9 base-36 chars>`.
pub fn generate_pull_request_id<R: Rng>(rng: &mut R) -> String {
    let millis = time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    format!("pr_{millis}_{}", base36_suffix(rng))
}

fn base36_suffix<R: Rng>(rng: &mut R) -> String {
    (0..SUFFIX_LEN)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect()
}

/// Everything a scenario needs, shared by every virtual user of a run.
pub struct ScenarioContext<C> {
    pub(crate) client: C,
    teams: Vec<Team>,
    tracker: Arc<ResourceTracker>,
    sink: Arc<dyn MetricsSink>,
    latency_budget: Duration,
    latency_check: String,
}

impl<C> ScenarioContext<C> {
    pub fn new(
        client: C,
        teams: Vec<Team>,
        tracker: Arc<ResourceTracker>,
        sink: Arc<dyn MetricsSink>,
    ) -> Self {
        if teams.iter().all(|t| t.members.is_empty()) {
            warn!("No team members to run scenarios with; member scenarios will be skipped.");
        }

        let mut ctx = Self {
            client,
            teams,
            tracker,
            sink,
            latency_budget: DEFAULT_LATENCY_BUDGET,
            latency_check: String::new(),
        };
        ctx.set_latency_budget(DEFAULT_LATENCY_BUDGET);
        ctx
    }

    /// Builder-style override of the per-request latency check.
    pub fn with_latency_budget(mut self, budget: Duration) -> Self {
        self.set_latency_budget(budget);
        self
    }

    fn set_latency_budget(&mut self, budget: Duration) {
        self.latency_budget = budget;
        self.latency_check = format!("response time < {}", humantime::format_duration(budget));
    }

    pub fn tracker(&self) -> &ResourceTracker {
        &self.tracker
    }

    pub fn teams(&self) -> &[Team] {
        &self.teams
    }

    pub(crate) fn sink(&self) -> &dyn MetricsSink {
        self.sink.as_ref()
    }

    /// Name of the latency check, e.g. `response time < 300ms`.
    pub(crate) fn latency_check(&self) -> &str {
        &self.latency_check
    }

    pub(crate) fn within_budget(&self, elapsed: Duration) -> bool {
        elapsed < self.latency_budget
    }

    /// A random team, then a random member of it.
    pub(crate) fn random_member<R: Rng>(&self, rng: &mut R) -> Option<(&Team, &Member)> {
        let team = self.teams.choose(rng)?;
        let member = team.members.choose(rng)?;
        Some((team, member))
    }
}
