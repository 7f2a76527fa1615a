use arc_swap::ArcSwap;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use metrics_util::AtomicBucket;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
#[allow(unused)]
use tracing::{debug, trace};

/// Slowest rate the limiter is configured for. Lower targets only run at zero concurrency.
const MIN_RATE: f64 = 0.1;
/// Relative rate change below which the limiter is left in place.
const RATE_TOLERANCE: f64 = 0.02;

/// State shared between the scheduler and every virtual user.
pub(crate) struct TaskAtomics {
    limiter: Arc<ArcSwap<DefaultDirectRateLimiter>>,
    rate: f64,
    iterations: Arc<AtomicU64>,
    iteration_time: Arc<AtomicBucket<Duration>>,
}

/// The handles a single virtual user reports through.
#[derive(Clone)]
pub(crate) struct IterationData {
    pub limiter: Arc<ArcSwap<DefaultDirectRateLimiter>>,
    pub iterations: Arc<AtomicU64>,
    pub iteration_time: Arc<AtomicBucket<Duration>>,
}

/// Iterations completed between two scheduler ticks.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct IterationSample {
    pub count: u64,
    pub mean_iteration: Option<Duration>,
    pub elapsed: Duration,
}

impl IterationSample {
    pub fn rate(&self) -> f64 {
        if self.elapsed.is_zero() {
            0.
        } else {
            self.count as f64 / self.elapsed.as_secs_f64()
        }
    }
}

impl TaskAtomics {
    pub fn new(rate: f64) -> Self {
        let rate = rate.max(MIN_RATE);
        Self {
            limiter: Arc::new(ArcSwap::new(Arc::new(rate_limiter(rate)))),
            rate,
            iterations: Arc::new(AtomicU64::new(0)),
            iteration_time: Arc::new(AtomicBucket::new()),
        }
    }

    /// Swap the shared limiter when the rate moved by more than the tolerance.
    pub fn set_rate(&mut self, rate: f64) -> bool {
        let rate = rate.max(MIN_RATE);
        if ((rate - self.rate) / self.rate).abs() > RATE_TOLERANCE {
            trace!("Limiter rate {:.2} -> {:.2}", self.rate, rate);
            self.rate = rate;
            self.limiter.store(Arc::new(rate_limiter(rate)));
            true
        } else {
            false
        }
    }

    #[cfg(test)]
    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn clone_to_iteration_data(&self) -> IterationData {
        IterationData {
            limiter: self.limiter.clone(),
            iterations: self.iterations.clone(),
            iteration_time: self.iteration_time.clone(),
        }
    }

    /// Drain everything recorded since the previous call.
    pub fn collect(&self, elapsed: Duration) -> IterationSample {
        let count = self.iterations.swap(0, Ordering::Relaxed);
        let mut total = Duration::ZERO;
        let mut timed = 0u32;
        self.iteration_time.clear_with(|block| {
            for dur in block {
                total += *dur;
                timed += 1;
            }
        });

        IterationSample {
            count,
            mean_iteration: (timed > 0).then(|| total / timed),
            elapsed,
        }
    }
}

fn rate_limiter(rate: f64) -> DefaultDirectRateLimiter {
    let quota = Quota::with_period(Duration::from_secs_f64(1. / rate))
        .unwrap_or_else(|| Quota::per_second(NonZeroU32::MAX));
    RateLimiter::direct(quota.allow_burst(NonZeroU32::MIN))
}
