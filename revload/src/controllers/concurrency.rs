use crate::scheduler::IterationSample;
use std::time::Duration;
#[allow(unused)]
use tracing::{debug, error, trace, warn};

/// Extra virtual users over the computed need, to absorb latency jitter.
const HEADROOM: f64 = 1.2;
/// Added to the pause when estimating an iteration before any has completed.
const INITIAL_REQUEST_ESTIMATE: Duration = Duration::from_millis(100);

/// Sizes the virtual user pool so the target iteration rate is reachable.
#[derive(Debug)]
pub(crate) struct ConcurrencyController {
    concurrency: usize,
    max_vus: usize,
    iteration_estimate: Duration,
}

impl ConcurrencyController {
    pub fn new(iteration_pause: Duration, max_vus: usize) -> Self {
        Self {
            concurrency: 0,
            max_vus: max_vus.max(1),
            iteration_estimate: iteration_pause + INITIAL_REQUEST_ESTIMATE,
        }
    }

    #[cfg(test)]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    #[cfg(test)]
    pub fn iteration_estimate(&self) -> Duration {
        self.iteration_estimate
    }

    pub fn analyze(&mut self, target: f64, sample: &IterationSample) -> CCOutcome {
        if let Some(mean) = sample.mean_iteration {
            self.iteration_estimate = mean;
        }

        debug!(
            "Target rate: {:.2}, measured: {:.2} at {} concurrency ({:?}/iteration)",
            target,
            sample.rate(),
            self.concurrency,
            self.iteration_estimate
        );

        let needed = required_concurrency(target, self.iteration_estimate);
        let (new_concurrency, outcome) = if needed > self.max_vus {
            (self.max_vus, CCOutcome::Underpowered(self.max_vus))
        } else {
            (needed, CCOutcome::AlterConcurrency(needed))
        };

        if new_concurrency == self.concurrency {
            if matches!(outcome, CCOutcome::Underpowered(_)) {
                outcome
            } else {
                CCOutcome::Stable
            }
        } else {
            trace!("Concurrency {} -> {}", self.concurrency, new_concurrency);
            self.concurrency = new_concurrency;
            outcome
        }
    }
}

/// `ceil(target * iteration_secs * headroom)`, at least one virtual user for any non-zero target.
fn required_concurrency(target: f64, iteration: Duration) -> usize {
    if target <= 0. || !target.is_finite() {
        return 0;
    }

    let needed = (target * iteration.as_secs_f64() * HEADROOM).ceil();
    if needed.is_finite() {
        (needed as usize).max(1)
    } else {
        error!("Non-finite concurrency for target {target}.");
        1
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum CCOutcome {
    Stable,
    /// The pool should hold exactly this many virtual users.
    AlterConcurrency(usize),
    /// The target needs more than the maximum; the pool is pinned there.
    Underpowered(usize),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_distr::{Distribution, Normal};

    fn sample(mean_iteration: Option<Duration>) -> IterationSample {
        IterationSample {
            count: 0,
            mean_iteration,
            elapsed: Duration::from_secs(1),
        }
    }

    #[test]
    fn zero_target_needs_nobody() {
        let mut controller = ConcurrencyController::new(Duration::from_secs(1), 200);
        assert_eq!(controller.analyze(0., &sample(None)), CCOutcome::Stable);
        assert_eq!(controller.concurrency(), 0);
    }

    #[test]
    fn initial_estimate_uses_pause() {
        let mut controller = ConcurrencyController::new(Duration::from_secs(1), 200);
        // 5/s * 1.1s * 1.2 = 6.6
        assert_eq!(
            controller.analyze(5., &sample(None)),
            CCOutcome::AlterConcurrency(7)
        );
        assert_eq!(controller.analyze(5., &sample(None)), CCOutcome::Stable);
    }

    #[test]
    fn scales_with_iteration_time() {
        let mut controller = ConcurrencyController::new(Duration::from_secs(1), 200);
        controller.analyze(10., &sample(Some(Duration::from_secs(1))));
        let fast = controller.concurrency();
        controller.analyze(10., &sample(Some(Duration::from_secs(2))));
        let slow = controller.concurrency();

        assert_eq!(fast, 12);
        assert_eq!(slow, 24);
    }

    #[test]
    fn keeps_last_estimate_without_samples() {
        let mut controller = ConcurrencyController::new(Duration::from_secs(1), 200);
        controller.analyze(1., &sample(Some(Duration::from_secs(3))));
        controller.analyze(1., &sample(None));
        assert_eq!(controller.iteration_estimate(), Duration::from_secs(3));
    }

    #[tracing_test::traced_test]
    #[test]
    fn underpowered() {
        let mut controller = ConcurrencyController::new(Duration::from_secs(1), 10);
        assert_eq!(
            controller.analyze(100., &sample(None)),
            CCOutcome::Underpowered(10)
        );
        assert_eq!(
            controller.analyze(100., &sample(None)),
            CCOutcome::Underpowered(10)
        );
        assert_eq!(controller.concurrency(), 10);
    }

    #[tracing_test::traced_test]
    #[test]
    fn noisy_iteration_times_stay_bounded() {
        let mut controller = ConcurrencyController::new(Duration::from_secs(1), 200);
        let normal = Normal::new(1.1, 0.05).unwrap();
        let mut rng = rand::thread_rng();
        for _ in 0..50 {
            let secs: f64 = normal.sample(&mut rng);
            controller.analyze(10., &sample(Some(Duration::from_secs_f64(secs.max(0.9)))));
            assert!((11..=17).contains(&controller.concurrency()));
        }
    }
}
