use crate::config::Thresholds;
use crate::stats::MetricsSnapshot;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ThresholdValue {
    Latency(Duration),
    Rate(f64),
}

impl fmt::Display for ThresholdValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThresholdValue::Latency(d) => write!(f, "{:.2}ms", d.as_secs_f64() * 1_000.),
            ThresholdValue::Rate(r) => write!(f, "{:.4}", r),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdResult {
    /// The aggregation checked, `p(95)` or `rate`.
    pub name: &'static str,
    pub metric: &'static str,
    pub observed: ThresholdValue,
    pub limit: ThresholdValue,
    pub passed: bool,
}

impl fmt::Display for ThresholdResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = if self.passed { '✓' } else { '✗' };
        write!(
            f,
            "{mark} {}: {} < {} (observed {})",
            self.metric, self.name, self.limit, self.observed
        )
    }
}

/// Outcome of evaluating every threshold against a finished run.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub results: Vec<ThresholdResult>,
    pub passed: bool,
}

impl Verdict {
    pub fn failures(&self) -> impl Iterator<Item = &ThresholdResult> {
        self.results.iter().filter(|r| !r.passed)
    }
}

impl Thresholds {
    pub fn evaluate(&self, snapshot: &MetricsSnapshot) -> Verdict {
        let rate = |metric, observed: f64, limit: f64| ThresholdResult {
            name: "rate",
            metric,
            observed: ThresholdValue::Rate(observed),
            limit: ThresholdValue::Rate(limit),
            passed: observed < limit,
        };

        let results = vec![
            ThresholdResult {
                name: "p(95)",
                metric: "http_req_duration",
                observed: ThresholdValue::Latency(snapshot.latency.p95),
                limit: ThresholdValue::Latency(self.p95_latency),
                passed: snapshot.latency.p95 < self.p95_latency,
            },
            rate(
                "http_req_failed_no_404",
                snapshot.failed_no_404.rate(),
                self.max_failed_no_404_rate,
            ),
            rate(
                "real_errors",
                snapshot.real_errors.rate(),
                self.max_real_error_rate,
            ),
            rate("errors", snapshot.errors.rate(), self.max_error_rate),
        ];

        let passed = results.iter().all(|r| r.passed);
        Verdict { results, passed }
    }
}
