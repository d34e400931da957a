//! Rate- and concurrency-driven load generation over suite Main tests.
//!
//! Throughput mode fires executions at a target arrival rate (uniform or
//! exponential inter-arrival gaps, optionally ramped); concurrency mode
//! keeps a fixed number in flight. Both draw from an infinite
//! round-robin interleave across the suites' Main tests and funnel every
//! completion through a single result channel.

mod pacer;
mod runner;
mod source;


pub use pacer::Pacer;
pub use runner::{LoadRecord, LoadReport, run_load};
pub use source::TestSource;

use std::time::Duration;

use crate::test::Status;

/// Load-test parameters.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Target arrival rate, requests per second (throughput mode).
    pub rate: f64,
    /// Wall-clock cap for dispatching new executions.
    pub duration: Duration,
    /// Linear ramp-up of the rate from zero over this period.
    pub ramp: Duration,
    /// Uniform inter-arrival gaps instead of the default exponential.
    pub uniform: bool,
    /// Hard cap on dispatched executions.
    pub count: u64,
    /// Abort when (fail+error+bogus)/executed exceeds this; 0 disables.
    pub max_error_rate: f64,
    /// Concurrency mode: keep exactly this many executions in flight.
    pub concurrency: Option<usize>,
    /// Keep full results at or above this severity for reporting.
    pub collect_from: Status,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            rate: 10.0,
            duration: Duration::from_secs(30),
            ramp: Duration::ZERO,
            uniform: false,
            count: u64::MAX,
            max_error_rate: 0.0,
            concurrency: None,
            collect_from: Status::Fail,
        }
    }
}
