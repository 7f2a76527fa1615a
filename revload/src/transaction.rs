//! One timed, classified exchange with the target service.
use crate::client::{ApiRequest, HttpClient};
use crate::scenario::{ScenarioContext, ScenarioKind};
use crate::sink::{Counter, MetricsSink, Rate};
use revload_core::{classify, Classification, ResponseKind};
use serde::Serialize;
use std::time::{Duration, Instant};
#[allow(unused)]
use tracing::{debug, trace, warn};

/// What came back from one request, already classified and recorded.
#[derive(Debug, Clone)]
pub(crate) struct Exchange {
    pub status: Option<u16>,
    pub elapsed: Duration,
    pub body: Vec<u8>,
    pub classification: Classification,
}

impl Exchange {
    pub fn status_is(&self, status: u16) -> bool {
        self.status == Some(status)
    }

    pub fn status_in(&self, statuses: &[u16]) -> bool {
        self.status.is_some_and(|s| statuses.contains(&s))
    }

    /// Fold the invocation into the business error rate: a real error always counts, otherwise
    /// any failed check does.
    pub fn report(&self, sink: &dyn MetricsSink, checks_passed: bool) {
        sink.add_rate(
            Rate::Errors,
            self.classification.is_real_error || !checks_passed,
        );
    }
}

/// Send `request`, record its latency and classification against `expected`.
///
/// Never fails: a transport error becomes an exchange without a status.
pub(crate) async fn exchange<C, B>(
    ctx: &ScenarioContext<C>,
    scenario: ScenarioKind,
    request: ApiRequest<B>,
    expected: &[u16],
) -> Exchange
where
    C: HttpClient + Sync,
    B: Serialize + Send + Sync,
{
    let start = Instant::now();
    let exchange = match ctx.client.send(request).await {
        Ok(res) => Exchange {
            status: Some(res.status),
            elapsed: res.elapsed,
            body: res.body,
            classification: classify(res.status, expected),
        },
        Err(error) => {
            warn!("{} transport failure: {error}", scenario.name());
            Exchange {
                status: None,
                elapsed: start.elapsed(),
                body: vec![],
                classification: Classification::transport_failure(),
            }
        }
    };

    trace!(
        "{} -> {:?} in {:?}",
        scenario.name(),
        exchange.status,
        exchange.elapsed
    );

    let sink = ctx.sink();
    sink.observe_latency(scenario.name(), exchange.elapsed);
    record_classification(sink, &exchange.classification);
    exchange
}

/// Fold one classification into the status-level metrics.
pub fn record_classification(sink: &dyn MetricsSink, classification: &Classification) {
    match classification.kind {
        ResponseKind::Expected | ResponseKind::Other => {}
        ResponseKind::NotFound => sink.add_count(Counter::Expected404s, 1),
        ResponseKind::UnexpectedClientError => sink.add_count(Counter::Unexpected4xx, 1),
        ResponseKind::ServerError => {}
        ResponseKind::TransportFailure => sink.add_count(Counter::TransportFailures, 1),
    }

    sink.add_rate(Rate::RealErrors, classification.is_real_error);
    sink.add_rate(Rate::FailedNo404, classification.is_real_error);
}

/// Named pass/fail assertions on one exchange, each reported to the sink.
pub(crate) struct Checks<'a> {
    sink: &'a dyn MetricsSink,
    passed: bool,
}

impl<'a> Checks<'a> {
    pub fn new(sink: &'a dyn MetricsSink) -> Self {
        Self { sink, passed: true }
    }

    pub fn check(mut self, name: &str, passed: bool) -> Self {
        self.sink.record_check(name, passed);
        self.passed &= passed;
        self
    }

    pub fn passed(&self) -> bool {
        self.passed
    }
}
