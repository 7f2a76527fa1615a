use std::fmt;
use std::time::Duration;

/// Rate metric: proportion of samples that were non-zero.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RateStat {
    pub hits: u64,
    pub total: u64,
}

impl RateStat {
    pub fn new(hits: u64, total: u64) -> Self {
        Self { hits, total }
    }

    /// A rate with no samples is 0.
    pub fn rate(&self) -> f64 {
        if self.total == 0 {
            0.
        } else {
            self.hits as f64 / self.total as f64
        }
    }
}

impl fmt::Display for RateStat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.2}% ({} of {})",
            self.rate() * 100.,
            self.hits,
            self.total
        )
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct LatencySummary {
    pub count: u64,
    pub mean: Duration,
    pub p50: Duration,
    pub p90: Duration,
    pub p95: Duration,
    pub p99: Duration,
    pub max: Duration,
}

impl fmt::Display for LatencySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "avg={:?}, p50={:?}, p90={:?}, p95={:?}, p99={:?}, max={:?}",
            self.mean, self.p50, self.p90, self.p95, self.p99, self.max,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckStat {
    pub name: String,
    pub passes: u64,
    pub fails: u64,
}

impl CheckStat {
    pub fn pass_rate(&self) -> f64 {
        RateStat::new(self.passes, self.passes + self.fails).rate()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioStat {
    pub name: &'static str,
    pub latency: LatencySummary,
}

/// Finalized metrics of a run, the input to threshold evaluation and the summary.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MetricsSnapshot {
    pub elapsed: Duration,
    pub iterations: u64,
    pub transport_failures: u64,
    pub errors: RateStat,
    pub real_errors: RateStat,
    pub failed_no_404: RateStat,
    pub expected_404s: u64,
    pub unexpected_4xx: u64,
    pub latency: LatencySummary,
    pub checks: Vec<CheckStat>,
    pub scenarios: Vec<ScenarioStat>,
}

impl MetricsSnapshot {
    pub fn requests(&self) -> u64 {
        self.latency.count
    }

    pub fn iteration_rate(&self) -> f64 {
        if self.elapsed.is_zero() {
            0.
        } else {
            self.iterations as f64 / self.elapsed.as_secs_f64()
        }
    }
}
