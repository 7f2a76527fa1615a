/// Which classification rule a status code matched.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ResponseKind {
    /// The status is in the caller's expected set.
    Expected,
    /// A 404 the caller did not list. Tolerated, counted separately.
    NotFound,
    /// Any other 4xx.
    UnexpectedClientError,
    /// Any 5xx.
    ServerError,
    /// Anything else (1xx, 3xx, unlisted 2xx).
    Other,
    /// No response at all: connection refused, timeout, reset.
    TransportFailure,
}

/// Result of classifying a single HTTP response.
///
/// `is_error` is the business-level bit, `is_real_error` the infrastructure-level bit. Callers
/// decide which one feeds which metric.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Classification {
    pub is_error: bool,
    pub is_real_error: bool,
    pub is_404: bool,
    pub kind: ResponseKind,
}

impl Classification {
    const fn new(kind: ResponseKind) -> Self {
        let (is_error, is_real_error, is_404) = match kind {
            ResponseKind::Expected | ResponseKind::Other => (false, false, false),
            ResponseKind::NotFound => (false, false, true),
            ResponseKind::UnexpectedClientError
            | ResponseKind::ServerError
            | ResponseKind::TransportFailure => (true, true, false),
        };

        Self {
            is_error,
            is_real_error,
            is_404,
            kind,
        }
    }
}

impl Classification {
    /// A request that never produced a status counts as a real error.
    pub const fn transport_failure() -> Self {
        Self::new(ResponseKind::TransportFailure)
    }
}

/// Classify `status` against the set of statuses the caller expects.
///
/// Rules are applied in order and the first match wins. An expected 404 therefore counts as a
/// plain success and never as a tolerated 404.
pub fn classify(status: u16, expected: &[u16]) -> Classification {
    let kind = match status {
        s if expected.contains(&s) => ResponseKind::Expected,
        404 => ResponseKind::NotFound,
        400..=499 => ResponseKind::UnexpectedClientError,
        s if s >= 500 => ResponseKind::ServerError,
        _ => ResponseKind::Other,
    };
    Classification::new(kind)
}
