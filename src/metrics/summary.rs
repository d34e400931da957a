use std::time::Duration;

use serde::Serialize;

use crate::test::Status;

use super::LogHist;

/// Per-status tallies across many test executions.
#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct StatusCounts {
    pub not_run: u64,
    pub skipped: u64,
    pub pass: u64,
    pub fail: u64,
    pub error: u64,
    pub bogus: u64,
}

impl StatusCounts {
    pub fn record(&mut self, status: Status) {
        let slot = match status {
            Status::NotRun => &mut self.not_run,
            Status::Skipped => &mut self.skipped,
            Status::Pass => &mut self.pass,
            Status::Fail => &mut self.fail,
            Status::Error => &mut self.error,
            Status::Bogus => &mut self.bogus,
        };
        *slot = slot.saturating_add(1);
    }

    #[must_use]
    pub const fn total(&self) -> u64 {
        self.not_run
            .saturating_add(self.skipped)
            .saturating_add(self.pass)
            .saturating_add(self.fail)
            .saturating_add(self.error)
            .saturating_add(self.bogus)
    }

    /// Executions that actually ran a request.
    #[must_use]
    pub const fn executed(&self) -> u64 {
        self.pass
            .saturating_add(self.fail)
            .saturating_add(self.error)
            .saturating_add(self.bogus)
    }

    #[must_use]
    pub const fn failed(&self) -> u64 {
        self.fail.saturating_add(self.error).saturating_add(self.bogus)
    }

    /// Fraction of executed requests that did not pass.
    #[must_use]
    #[expect(clippy::float_arithmetic, reason = "rate over observed counts")]
    pub fn error_rate(&self) -> f64 {
        let executed = self.executed();
        if executed == 0 {
            return 0.0;
        }
        self.failed() as f64 / executed as f64
    }

    /// Worst severity observed, for exit-code mapping.
    #[must_use]
    pub const fn worst(&self) -> Status {
        if self.bogus > 0 {
            Status::Bogus
        } else if self.error > 0 {
            Status::Error
        } else if self.fail > 0 {
            Status::Fail
        } else if self.pass > 0 {
            Status::Pass
        } else if self.skipped > 0 {
            Status::Skipped
        } else {
            Status::NotRun
        }
    }
}

/// Reconstructed latency figures for one population.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct LatencyStats {
    pub count: u64,
    pub min_ms: u64,
    pub max_ms: u64,
    pub avg_ms: u64,
    pub p50_ms: u64,
    pub p90_ms: u64,
    pub p99_ms: u64,
}

impl LatencyStats {
    #[must_use]
    pub fn from_hist(hist: &LogHist) -> Self {
        Self {
            count: hist.count(),
            min_ms: hist.min(),
            max_ms: hist.max(),
            avg_ms: hist.average(),
            p50_ms: hist.percentile(0.5),
            p90_ms: hist.percentile(0.9),
            p99_ms: hist.percentile(0.99),
        }
    }
}

/// Streaming aggregation of test results: status tallies plus latency
/// histograms kept separately for the passing and non-passing
/// populations. Deterministic for a given multiset of results.
#[derive(Debug, Default)]
pub struct Aggregate {
    counts: StatusCounts,
    all: LogHist,
    passed: LogHist,
    failed: LogHist,
}

impl Aggregate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, status: Status, latency_ms: u64) {
        self.counts.record(status);
        match status {
            Status::Pass => {
                self.all.add(latency_ms);
                self.passed.add(latency_ms);
            }
            Status::Fail | Status::Error | Status::Bogus => {
                self.all.add(latency_ms);
                self.failed.add(latency_ms);
            }
            Status::NotRun | Status::Skipped => {}
        }
    }

    pub fn merge(&mut self, other: &Aggregate) {
        self.counts.not_run = self.counts.not_run.saturating_add(other.counts.not_run);
        self.counts.skipped = self.counts.skipped.saturating_add(other.counts.skipped);
        self.counts.pass = self.counts.pass.saturating_add(other.counts.pass);
        self.counts.fail = self.counts.fail.saturating_add(other.counts.fail);
        self.counts.error = self.counts.error.saturating_add(other.counts.error);
        self.counts.bogus = self.counts.bogus.saturating_add(other.counts.bogus);
        self.all.merge(&other.all);
        self.passed.merge(&other.passed);
        self.failed.merge(&other.failed);
    }

    #[must_use]
    pub const fn counts(&self) -> StatusCounts {
        self.counts
    }

    #[must_use]
    pub fn error_rate(&self) -> f64 {
        self.counts.error_rate()
    }

    #[must_use]
    pub fn summary(&self, duration: Duration) -> RunSummary {
        let duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        let throughput_rps_x100 = self
            .counts
            .executed()
            .saturating_mul(100_000)
            .checked_div(duration_ms.max(1))
            .unwrap_or(0);
        RunSummary {
            duration_ms,
            counts: self.counts,
            latency: LatencyStats::from_hist(&self.all),
            latency_pass: LatencyStats::from_hist(&self.passed),
            latency_fail: LatencyStats::from_hist(&self.failed),
            throughput_rps_x100,
        }
    }
}

/// Serializable view of one aggregated run, written by the JSON sink.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RunSummary {
    pub duration_ms: u64,
    pub counts: StatusCounts,
    pub latency: LatencyStats,
    pub latency_pass: LatencyStats,
    pub latency_fail: LatencyStats,
    /// Average requests per second, fixed-point with two decimals.
    pub throughput_rps_x100: u64,
}
