//! The virtual user loop: wait for the limiter, run one random scenario, pause.
use crate::client::HttpClient;
use crate::scenario::{select_scenario, ScenarioContext};
use crate::scheduler::IterationData;
use crate::sink::Counter;
use rand::rngs::SmallRng;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
#[allow(unused)]
use tracing::{debug, error, trace, warn};

tokio::task_local! {
    pub(crate) static ITERATION_HOOK: IterationData;
}

/// Run `func` as one paced iteration: wait on the shared limiter first, then time it.
///
/// Returns `None` without running `func` when no hook is installed or when `retire` was set
/// while waiting on the limiter. Skipped iterations are not recorded.
pub(crate) async fn iteration_hook<F: Future>(
    retire: &AtomicBool,
    func: F,
) -> Option<F::Output> {
    let Ok(hook) = ITERATION_HOOK.try_with(|v| v.clone()) else {
        error!("No iteration hook available.");
        return None;
    };

    {
        let limiter = hook.limiter.load_full();
        limiter.until_ready().await;
    }

    if retire.load(Ordering::Relaxed) {
        trace!("Retired while waiting on the limiter.");
        return None;
    }

    let start = Instant::now();
    let res = func.await;
    hook.iteration_time.push(start.elapsed());
    hook.iterations.fetch_add(1, Ordering::Relaxed);
    Some(res)
}

/// One virtual user. Runs until `retire` is set, finishing the iteration in progress.
pub(crate) async fn virtual_user<C>(
    ctx: Arc<ScenarioContext<C>>,
    pause: Duration,
    retire: Arc<AtomicBool>,
    mut rng: SmallRng,
) where
    C: HttpClient + Sync + Send + 'static,
{
    while !retire.load(Ordering::Relaxed) {
        let ran = iteration_hook(&retire, async {
            let kind = select_scenario(&mut rng);
            kind.run(&ctx, &mut rng).await;
            ctx.sink().add_count(Counter::Iterations, 1);
            tokio::time::sleep(pause).await;
        })
        .await;

        if ran.is_none() {
            break;
        }
    }
    trace!("Virtual user retired.");
}
