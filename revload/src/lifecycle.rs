//! What happens once before and once after the load phase.
use crate::client::{ApiRequest, HttpClient};
use revload_core::{MetricsSnapshot, Team, Verdict};
use std::fmt;
#[allow(unused)]
use tracing::{info, instrument, warn};

/// Create every seed team. Any status is accepted since the teams may already exist.
#[instrument(name = "setup", skip_all)]
pub async fn setup<C: HttpClient + Sync>(client: &C, teams: Vec<Team>) -> Vec<Team> {
    for team in &teams {
        match client
            .send(ApiRequest::post("/api/v1/team/add", team))
            .await
        {
            Ok(res) => info!("Created team {}: {}", team.team_name, res.status),
            Err(error) => warn!("Created team {}: {error}", team.team_name),
        }
    }
    teams
}

/// Human-readable report printed after a run.
pub struct Summary<'a> {
    snapshot: &'a MetricsSnapshot,
    verdict: &'a Verdict,
}

/// Build the end-of-run summary.
pub fn teardown<'a>(snapshot: &'a MetricsSnapshot, verdict: &'a Verdict) -> Summary<'a> {
    Summary { snapshot, verdict }
}

const RULE: &str = "=====================================";

impl fmt::Display for Summary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.snapshot;
        writeln!(f, "Load test completed!")?;
        writeln!(f, "{RULE}")?;
        writeln!(f, "Error Statistics Summary:")?;
        writeln!(
            f,
            "- 404 errors are counted separately (see \"expected_404s\" metric)"
        )?;
        writeln!(f, "- http_req_failed_no_404: errors excluding 404 responses")?;
        writeln!(
            f,
            "- Real errors include: 5xx responses and unexpected 4xx codes"
        )?;
        writeln!(f, "{RULE}")?;

        writeln!(
            f,
            "iterations.................: {} ({:.2}/s over {})",
            s.iterations,
            s.iteration_rate(),
            humantime::format_duration(round_to_millis(s.elapsed))
        )?;
        writeln!(f, "http_reqs..................: {}", s.requests())?;
        writeln!(f, "http_req_duration..........: {}", s.latency)?;
        writeln!(f, "errors.....................: {}", s.errors)?;
        writeln!(f, "real_errors................: {}", s.real_errors)?;
        writeln!(f, "http_req_failed_no_404.....: {}", s.failed_no_404)?;
        writeln!(f, "expected_404s..............: {}", s.expected_404s)?;
        writeln!(f, "unexpected_4xx.............: {}", s.unexpected_4xx)?;
        writeln!(f, "transport_failures.........: {}", s.transport_failures)?;

        if !s.checks.is_empty() {
            writeln!(f, "checks:")?;
            for check in &s.checks {
                let mark = if check.fails == 0 { '✓' } else { '✗' };
                writeln!(
                    f,
                    "  {mark} {}: {:.2}% ({} passed, {} failed)",
                    check.name,
                    check.pass_rate() * 100.,
                    check.passes,
                    check.fails
                )?;
            }
        }

        writeln!(f, "scenarios:")?;
        for scenario in &s.scenarios {
            writeln!(
                f,
                "  {}: {} requests, p95={:?}",
                scenario.name, scenario.latency.count, scenario.latency.p95
            )?;
        }

        writeln!(f, "thresholds:")?;
        for result in &self.verdict.results {
            writeln!(f, "  {result}")?;
        }
        write!(
            f,
            "{}",
            if self.verdict.passed {
                "All thresholds passed."
            } else {
                "Some thresholds have failed."
            }
        )
    }
}

fn round_to_millis(d: std::time::Duration) -> std::time::Duration {
    std::time::Duration::from_millis(d.as_millis() as u64)
}
