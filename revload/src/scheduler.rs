//! Ramp supervisor: follows the load profile, sizing the virtual user pool and pacing it.
mod task_atomics;
mod timer;

pub(crate) use task_atomics::{IterationData, IterationSample, TaskAtomics};

use crate::client::HttpClient;
use crate::controllers::{CCOutcome, ConcurrencyController};
use crate::dispatcher::{virtual_user, ITERATION_HOOK};
use crate::scenario::ScenarioContext;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use revload_core::{LoadProfile, RunConfig, SCHEDULER_INTERVAL};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use timer::Timer;
use tokio::task::JoinHandle;
use tokio::time::Instant;
#[allow(unused)]
use tracing::{debug, error, info, instrument, trace, warn};

struct Worker {
    retire: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl Worker {
    fn retire(&self) {
        self.retire.store(true, Ordering::Relaxed);
    }
}

pub(crate) struct Scheduler<C> {
    ctx: Arc<ScenarioContext<C>>,
    profile: LoadProfile,
    iteration_pause: Duration,
    graceful_stop: Duration,
    seed: Option<u64>,
    interval: Duration,
    task_atomics: TaskAtomics,
    controller: ConcurrencyController,
    workers: Vec<Worker>,
    retiring: Vec<Worker>,
    spawned: u64,
}

impl<C> Scheduler<C>
where
    C: HttpClient + Send + Sync + 'static,
{
    pub fn new(ctx: Arc<ScenarioContext<C>>, config: &RunConfig) -> Self {
        Self {
            ctx,
            profile: config.profile.clone(),
            iteration_pause: config.iteration_pause,
            graceful_stop: config.graceful_stop,
            seed: config.seed,
            interval: SCHEDULER_INTERVAL,
            task_atomics: TaskAtomics::new(0.),
            controller: ConcurrencyController::new(config.iteration_pause, config.max_vus),
            workers: vec![],
            retiring: vec![],
            spawned: 0,
        }
    }

    #[cfg(test)]
    fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Drive the profile to completion, then stop every virtual user.
    #[instrument(name = "scheduler", skip_all)]
    pub async fn run(&mut self) {
        let start = Instant::now();
        let mut timer = Timer::new(self.interval).await;
        let mut stage = None;
        info!(
            "Running {} stage(s) over {} (ticking every {timer})",
            self.profile.stages.len(),
            humantime::format_duration(self.profile.total_duration())
        );

        let mut tick_elapsed = Duration::ZERO;
        loop {
            let elapsed = start.elapsed();
            let Some(target) = self.profile.target_at(elapsed) else {
                break;
            };

            let current_stage = self.profile.stage_at(elapsed);
            if current_stage != stage {
                if let Some(idx) = current_stage {
                    let s = &self.profile.stages[idx];
                    info!(
                        "Stage {}: {} towards {} iterations/s",
                        idx + 1,
                        humantime::format_duration(s.duration),
                        s.target
                    );
                }
                stage = current_stage;
            }

            self.adjust(target, tick_elapsed);
            tick_elapsed = timer.tick().await;
        }

        info!("Profile complete, stopping {} virtual user(s)", self.workers.len());
        self.shutdown().await;
    }

    fn adjust(&mut self, target: f64, tick_elapsed: Duration) {
        self.task_atomics.set_rate(target);
        let sample = self.task_atomics.collect(tick_elapsed);

        match self.controller.analyze(target, &sample) {
            CCOutcome::Stable => {}
            CCOutcome::AlterConcurrency(concurrency) => self.set_concurrency(concurrency),
            CCOutcome::Underpowered(concurrency) => {
                warn!(
                    "Target rate {target:.2}/s needs more than {concurrency} virtual users; running underpowered."
                );
                self.set_concurrency(concurrency);
            }
        }

        self.retiring.retain(|w| !w.handle.is_finished());

        #[cfg(feature = "metrics")]
        {
            metrics::gauge!("revload_target_rate").set(target);
            metrics::gauge!("revload_virtual_users").set(self.workers.len() as f64);
        }
    }

    fn set_concurrency(&mut self, concurrency: usize) {
        if self.workers.len() > concurrency {
            debug!("Retiring {} virtual user(s)", self.workers.len() - concurrency);
            for worker in self.workers.drain(concurrency..) {
                worker.retire();
                self.retiring.push(worker);
            }
        } else {
            while self.workers.len() < concurrency {
                let worker = self.spawn_worker();
                self.workers.push(worker);
            }
        }
    }

    fn spawn_worker(&mut self) -> Worker {
        let rng = match self.seed {
            Some(seed) => SmallRng::seed_from_u64(seed.wrapping_add(self.spawned)),
            None => SmallRng::from_entropy(),
        };
        self.spawned += 1;

        let retire = Arc::new(AtomicBool::new(false));
        let handle = tokio::spawn(ITERATION_HOOK.scope(
            self.task_atomics.clone_to_iteration_data(),
            virtual_user(self.ctx.clone(), self.iteration_pause, retire.clone(), rng),
        ));

        Worker { retire, handle }
    }

    #[cfg(test)]
    fn concurrency(&self) -> usize {
        self.workers.len()
    }

    /// Retire everyone, wait up to the graceful-stop window, abort stragglers.
    async fn shutdown(&mut self) {
        let mut workers: Vec<_> = self.workers.drain(..).collect();
        workers.append(&mut self.retiring);
        for worker in &workers {
            worker.retire();
        }

        let deadline = Instant::now() + self.graceful_stop;
        let mut aborted = 0;
        for mut worker in workers {
            if tokio::time::timeout_at(deadline, &mut worker.handle)
                .await
                .is_err()
            {
                worker.handle.abort();
                aborted += 1;
            }
        }

        if aborted > 0 {
            warn!("Aborted {aborted} virtual user(s) after the graceful stop window.");
        }
    }
}

impl<C> Drop for Scheduler<C> {
    fn drop(&mut self) {
        for worker in self.workers.iter().chain(self.retiring.iter()) {
            worker.handle.abort();
        }
    }
}
