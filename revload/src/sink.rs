//! Metrics sink shared by every virtual user.
use crate::scenario::ScenarioKind;
use metrics_util::AtomicBucket;
use pdatastructs::tdigest::{TDigest, K1};
use revload_core::{CheckStat, LatencySummary, MetricsSnapshot, RateStat, ScenarioStat};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{error, warn};

const TDIGEST_BACKLOG_SIZE: usize = 100;
const TDIGEST_COMPRESSION: f64 = 100.;

/// Rate metrics: the proportion of non-zero samples.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Rate {
    /// Business-level failures: real errors or any failed check.
    Errors,
    /// 5xx, unexpected 4xx and transport failures.
    RealErrors,
    /// Like `RealErrors`, but sampled for every response including tolerated 404s.
    FailedNo404,
}

impl Rate {
    pub fn name(self) -> &'static str {
        match self {
            Rate::Errors => "errors",
            Rate::RealErrors => "real_errors",
            Rate::FailedNo404 => "http_req_failed_no_404",
        }
    }

    #[cfg(feature = "metrics")]
    fn labels(self) -> RateLabels {
        match self {
            Rate::Errors => RateLabels {
                hits: "revload_errors_hits",
                total: "revload_errors_total",
            },
            Rate::RealErrors => RateLabels {
                hits: "revload_real_errors_hits",
                total: "revload_real_errors_total",
            },
            Rate::FailedNo404 => RateLabels {
                hits: "revload_http_req_failed_no_404_hits",
                total: "revload_http_req_failed_no_404_total",
            },
        }
    }
}

#[cfg(feature = "metrics")]
#[derive(Copy, Clone)]
struct RateLabels {
    hits: &'static str,
    total: &'static str,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Counter {
    Expected404s,
    Unexpected4xx,
    TransportFailures,
    Iterations,
}

impl Counter {
    pub fn name(self) -> &'static str {
        match self {
            Counter::Expected404s => "expected_404s",
            Counter::Unexpected4xx => "unexpected_4xx",
            Counter::TransportFailures => "transport_failures",
            Counter::Iterations => "iterations",
        }
    }

    #[cfg(feature = "metrics")]
    fn label(self) -> &'static str {
        match self {
            Counter::Expected404s => "revload_expected_404s",
            Counter::Unexpected4xx => "revload_unexpected_4xx",
            Counter::TransportFailures => "revload_transport_failures",
            Counter::Iterations => "revload_iterations",
        }
    }
}

/// Where scenarios report what they observed.
///
/// Implementations must tolerate concurrent calls from every virtual user without losing
/// updates.
pub trait MetricsSink: Send + Sync {
    fn add_rate(&self, rate: Rate, hit: bool);
    fn add_count(&self, counter: Counter, n: u64);
    fn observe_latency(&self, scenario: &'static str, latency: Duration);
    fn record_check(&self, name: &str, passed: bool);
}

#[derive(Default)]
struct RateCell {
    hits: AtomicU64,
    total: AtomicU64,
}

impl RateCell {
    fn add(&self, hit: bool) {
        self.total.fetch_add(1, Ordering::Relaxed);
        if hit {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn stat(&self) -> RateStat {
        RateStat::new(
            self.hits.load(Ordering::Relaxed),
            self.total.load(Ordering::Relaxed),
        )
    }
}

/// In-process sink accumulating every metric for the duration of a run.
pub struct RunMetrics {
    started: Mutex<Instant>,
    errors: RateCell,
    real_errors: RateCell,
    failed_no_404: RateCell,
    expected_404s: AtomicU64,
    unexpected_4xx: AtomicU64,
    transport_failures: AtomicU64,
    iterations: AtomicU64,
    latency: AtomicBucket<Duration>,
    scenario_latency: Vec<(&'static str, AtomicBucket<Duration>)>,
    checks: Mutex<Vec<CheckStat>>,
}

impl Default for RunMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl RunMetrics {
    pub fn new() -> Self {
        Self {
            started: Mutex::new(Instant::now()),
            errors: RateCell::default(),
            real_errors: RateCell::default(),
            failed_no_404: RateCell::default(),
            expected_404s: AtomicU64::new(0),
            unexpected_4xx: AtomicU64::new(0),
            transport_failures: AtomicU64::new(0),
            iterations: AtomicU64::new(0),
            latency: AtomicBucket::new(),
            scenario_latency: ScenarioKind::ALL
                .iter()
                .map(|kind| (kind.name(), AtomicBucket::new()))
                .collect(),
            checks: Mutex::new(vec![]),
        }
    }

    /// Restart the clock `elapsed` and the iteration rate are measured against.
    pub fn mark_started(&self) {
        *self.started.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    fn counter(&self, counter: Counter) -> &AtomicU64 {
        match counter {
            Counter::Expected404s => &self.expected_404s,
            Counter::Unexpected4xx => &self.unexpected_4xx,
            Counter::TransportFailures => &self.transport_failures,
            Counter::Iterations => &self.iterations,
        }
    }

    fn rate(&self, rate: Rate) -> &RateCell {
        match rate {
            Rate::Errors => &self.errors,
            Rate::RealErrors => &self.real_errors,
            Rate::FailedNo404 => &self.failed_no_404,
        }
    }

    /// Finalized view of everything recorded so far. Does not reset anything.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let checks = self
            .checks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        MetricsSnapshot {
            elapsed: self
                .started
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .elapsed(),
            iterations: self.iterations.load(Ordering::Relaxed),
            transport_failures: self.transport_failures.load(Ordering::Relaxed),
            errors: self.errors.stat(),
            real_errors: self.real_errors.stat(),
            failed_no_404: self.failed_no_404.stat(),
            expected_404s: self.expected_404s.load(Ordering::Relaxed),
            unexpected_4xx: self.unexpected_4xx.load(Ordering::Relaxed),
            latency: summarize(&self.latency.data()),
            checks,
            scenarios: self
                .scenario_latency
                .iter()
                .map(|(name, bucket)| ScenarioStat {
                    name: *name,
                    latency: summarize(&bucket.data()),
                })
                .collect(),
        }
    }
}

impl MetricsSink for RunMetrics {
    fn add_rate(&self, rate: Rate, hit: bool) {
        self.rate(rate).add(hit);

        #[cfg(feature = "metrics")]
        {
            let labels = rate.labels();
            metrics::counter!(labels.total).increment(1);
            if hit {
                metrics::counter!(labels.hits).increment(1);
            }
        }
    }

    fn add_count(&self, counter: Counter, n: u64) {
        self.counter(counter).fetch_add(n, Ordering::Relaxed);

        #[cfg(feature = "metrics")]
        metrics::counter!(counter.label()).increment(n);
    }

    fn observe_latency(&self, scenario: &'static str, latency: Duration) {
        self.latency.push(latency);
        match self.scenario_latency.iter().find(|(name, _)| *name == scenario) {
            Some((_, bucket)) => bucket.push(latency),
            None => warn!("Latency observed for unknown scenario {scenario}."),
        }

        #[cfg(feature = "metrics")]
        metrics::histogram!("revload_http_req_duration", "scenario" => scenario)
            .record(latency.as_secs_f64());
    }

    fn record_check(&self, name: &str, passed: bool) {
        let mut checks = self.checks.lock().unwrap_or_else(PoisonError::into_inner);
        let idx = match checks.iter().position(|c| c.name == name) {
            Some(idx) => idx,
            None => {
                checks.push(CheckStat {
                    name: name.to_string(),
                    passes: 0,
                    fails: 0,
                });
                checks.len() - 1
            }
        };

        if passed {
            checks[idx].passes += 1;
        } else {
            checks[idx].fails += 1;
        }
    }
}

fn summarize(samples: &[Duration]) -> LatencySummary {
    if samples.is_empty() {
        return LatencySummary::default();
    }

    let mut digest = TDigest::new(K1::new(TDIGEST_COMPRESSION), TDIGEST_BACKLOG_SIZE);
    let mut total = Duration::ZERO;
    let mut max = Duration::ZERO;
    for latency in samples {
        digest.insert(latency.as_secs_f64());
        total += *latency;
        max = max.max(*latency);
    }

    let quantile = |q: f64| {
        let secs = digest.quantile(q);
        // NOTE: TDigest can yield NaN on degenerate inputs.
        if secs.is_finite() {
            Duration::from_secs_f64(secs.max(0.)).min(max)
        } else {
            error!("NaN latency quantile for q={q}.");
            Duration::ZERO
        }
    };

    LatencySummary {
        count: samples.len() as u64,
        mean: total / samples.len() as u32,
        p50: quantile(0.5),
        p90: quantile(0.9),
        p95: quantile(0.95),
        p99: quantile(0.99),
        max,
    }
}
