use std::time::Duration;

/// Maximum number of pull request ids kept in the working set.
pub const TRACKER_CAPACITY: usize = 100;

/// Chance that merge/reassign targets a tracked pull request instead of a synthetic one.
pub const TRACKED_TARGET_PROBABILITY: f64 = 0.9;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Pause between two iterations of the same virtual user.
pub const DEFAULT_ITERATION_PAUSE: Duration = Duration::from_secs(1);

/// Per-request latency budget, used both by the per-request check and the p95 threshold.
pub const DEFAULT_LATENCY_BUDGET: Duration = Duration::from_millis(300);

/// The default error rate bound for every rate threshold.
pub const DEFAULT_MAX_RATE: f64 = 0.01;

pub const DEFAULT_GRACEFUL_STOP: Duration = Duration::from_secs(5);

pub const DEFAULT_MAX_VUS: usize = 200;

/// Supervisor tick.
pub const SCHEDULER_INTERVAL: Duration = Duration::from_secs(1);

/// Exit code for a run that completed but crossed a threshold.
pub const EXIT_THRESHOLDS_FAILED: i32 = 99;
