#![doc = include_str!("../README.md")]

pub mod client;
pub mod lifecycle;
pub mod scenario;
pub mod sink;
pub mod tracker;

pub(crate) mod controllers;
pub(crate) mod dispatcher;
pub(crate) mod scheduler;
#[doc(hidden)]
pub mod transaction;

mod error;
mod load_test;

pub use client::{HttpClient, ReqwestClient, TransportError};
pub use error::RunError;
pub use load_test::{LoadTest, RunReport};
pub use sink::{MetricsSink, RunMetrics};
pub use tracker::ResourceTracker;

pub mod prelude {
    pub use crate::load_test::{LoadTest, RunReport};
    pub use revload_core::{LoadProfile, RunConfig, Stage, Thresholds};
}
