mod concurrency;

pub(crate) use concurrency::{CCOutcome, ConcurrencyController};
