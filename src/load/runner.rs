//! The dispatch loop: fires test executions per the arrival plan,
//! funnels completions through one channel, aggregates online, and
//! trips the error-rate circuit breaker.
//!
//! Drain policy at duration/count exhaustion (and on abort): dispatch
//! stops, in-flight executions are awaited and their results recorded.

use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::{AppError, AppResult, LoadError};
use crate::metrics::Aggregate;
use crate::shutdown::ShutdownReceiver;
use crate::sinks::LiveLog;
use crate::suite::{Session, Suite, run_test};
use crate::test::{Status, Test, TestResult};

use super::{LoadOptions, Pacer, TestSource};

/// One completed load execution, as streamed to the live log.
#[derive(Debug, Clone, Serialize)]
pub struct LoadRecord {
    pub id: u64,
    /// Dispatch time, milliseconds since the run started.
    pub started_ms: u64,
    /// Round-trip time of the final attempt.
    pub duration_ms: u64,
    /// Full test duration including retries.
    pub full_ms: u64,
    pub status: Status,
    /// Executions in flight when this one was dispatched.
    pub conc_tot: u64,
    /// In-flight executions of the same test when this one was
    /// dispatched.
    pub conc_own: u64,
    pub error: Option<String>,
}

/// Aggregated outcome of a load run.
#[derive(Debug)]
pub struct LoadReport {
    pub dispatched: u64,
    pub elapsed: Duration,
    pub aggregate: Aggregate,
    /// Full results retained at or above the configured severity.
    pub collected: Vec<TestResult>,
    /// Set when the error-rate circuit breaker tripped.
    pub aborted: Option<String>,
}

impl LoadReport {
    /// Worst severity for exit-code mapping; an abort counts as Error.
    #[must_use]
    pub fn status(&self) -> Status {
        let worst = self.aggregate.counts().worst();
        if self.aborted.is_some() {
            worst.max(Status::Error)
        } else {
            worst
        }
    }
}

struct Completion {
    id: u64,
    started_ms: u64,
    entry: (usize, usize),
    conc_tot: u64,
    conc_own: u64,
    result: TestResult,
}

/// Book-keeping of executions currently in flight, total and per test.
#[derive(Default)]
struct InFlight {
    total: u64,
    per_entry: std::collections::BTreeMap<(usize, usize), u64>,
}

impl InFlight {
    /// Returns the (total, own) gauges after adding the new execution.
    fn started(&mut self, entry: (usize, usize)) -> (u64, u64) {
        self.total = self.total.saturating_add(1);
        let own = self.per_entry.entry(entry).or_insert(0);
        *own = own.saturating_add(1);
        (self.total, *own)
    }

    fn finished(&mut self, entry: (usize, usize)) {
        self.total = self.total.saturating_sub(1);
        if let Some(own) = self.per_entry.get_mut(&entry) {
            *own = own.saturating_sub(1);
        }
    }
}

struct Collector<'log> {
    aggregate: Aggregate,
    collected: Vec<TestResult>,
    collect_from: Status,
    max_error_rate: f64,
    live_log: Option<&'log mut LiveLog>,
}

impl<'log> Collector<'log> {
    fn new(options: &LoadOptions, live_log: Option<&'log mut LiveLog>) -> Self {
        Self {
            aggregate: Aggregate::new(),
            collected: Vec::new(),
            collect_from: options.collect_from,
            max_error_rate: options.max_error_rate,
            live_log,
        }
    }

    fn record(&mut self, completion: Completion) -> AppResult<()> {
        let latency_ms =
            u64::try_from(completion.result.duration.as_millis()).unwrap_or(u64::MAX);
        self.aggregate.record(completion.result.status, latency_ms);
        if let Some(log) = self.live_log.as_deref_mut() {
            log.write(&LoadRecord {
                id: completion.id,
                started_ms: completion.started_ms,
                duration_ms: latency_ms,
                full_ms: u64::try_from(completion.result.full_duration.as_millis())
                    .unwrap_or(u64::MAX),
                status: completion.result.status,
                conc_tot: completion.conc_tot,
                conc_own: completion.conc_own,
                error: completion.result.error.clone(),
            })?;
        }
        if completion.result.status >= self.collect_from {
            self.collected.push(completion.result);
        }
        Ok(())
    }

    /// Observed error rate when it exceeds the configured limit.
    fn breaker_tripped(&self) -> Option<String> {
        if self.max_error_rate <= 0.0 {
            return None;
        }
        let observed = self.aggregate.error_rate();
        if observed > self.max_error_rate {
            Some(
                LoadError::ErrorRateExceeded {
                    observed,
                    limit: self.max_error_rate,
                    total: self.aggregate.counts().total(),
                }
                .to_string(),
            )
        } else {
            None
        }
    }
}

/// Execute the load plan against `suites`; `sessions` correspond
/// one-to-one with them.
///
/// # Errors
///
/// An empty candidate source, non-positive rate or concurrency level,
/// and live-log I/O failures. Tripping the error-rate breaker is not an
/// `Err`: the report carries the abort reason.
pub async fn run_load(
    suites: &[Suite],
    sessions: &[Arc<Session>],
    options: &LoadOptions,
    live_log: Option<&mut LiveLog>,
    shutdown: Option<ShutdownReceiver>,
) -> AppResult<LoadReport> {
    let source =
        TestSource::new(suites).ok_or_else(|| AppError::load(LoadError::NoEnabledTests))?;
    if let Some(level) = options.concurrency {
        if level == 0 {
            return Err(AppError::load(LoadError::InvalidConcurrency));
        }
        run_concurrency(suites, sessions, options, source, level, live_log, shutdown).await
    } else {
        if options.rate <= 0.0 {
            return Err(AppError::load(LoadError::InvalidRate));
        }
        run_throughput(suites, sessions, options, source, live_log, shutdown).await
    }
}

fn candidate(suites: &[Suite], suite_index: usize, test_index: usize) -> Option<Test> {
    let suite = suites.get(suite_index)?;
    let declared = suite.main.get(test_index)?;
    let mut test = declared.clone();
    if suite.omit_checks {
        test.checks.clear();
    }
    Some(test)
}

struct Dispatch {
    id: u64,
    started_ms: u64,
    entry: (usize, usize),
    conc_tot: u64,
    conc_own: u64,
}

async fn execute_one(session: Arc<Session>, test: Test, dispatch: Dispatch) -> Completion {
    let result = run_test(&session, &test).await;
    Completion {
        id: dispatch.id,
        started_ms: dispatch.started_ms,
        entry: dispatch.entry,
        conc_tot: dispatch.conc_tot,
        conc_own: dispatch.conc_own,
        result,
    }
}

async fn recv_shutdown(shutdown: &mut Option<ShutdownReceiver>) {
    match shutdown {
        Some(receiver) => {
            drop(receiver.recv().await);
        }
        None => std::future::pending::<()>().await,
    }
}

async fn run_throughput(
    suites: &[Suite],
    sessions: &[Arc<Session>],
    options: &LoadOptions,
    mut source: TestSource,
    live_log: Option<&mut LiveLog>,
    mut shutdown: Option<ShutdownReceiver>,
) -> AppResult<LoadReport> {
    let mut pacer = Pacer::new(options.rate, options.uniform, options.ramp);
    let mut collector = Collector::new(options, live_log);
    let mut in_flight = InFlight::default();
    let (tx, mut rx) = mpsc::unbounded_channel::<Completion>();

    let started = Instant::now();
    let deadline = started.checked_add(options.duration);
    let mut dispatched = 0u64;
    let mut aborted: Option<String> = None;
    let mut next_fire = started
        .checked_add(pacer.next_wait(Duration::ZERO))
        .unwrap_or(started);

    loop {
        if dispatched >= options.count {
            debug!("request count cap reached after {} dispatches", dispatched);
            break;
        }
        if let Some(deadline) = deadline
            && Instant::now() >= deadline
        {
            debug!("duration cap reached after {} dispatches", dispatched);
            break;
        }
        if aborted.is_none() {
            aborted = collector.breaker_tripped();
        }
        if aborted.is_some() {
            break;
        }

        tokio::select! {
            () = tokio::time::sleep_until(next_fire) => {
                let entry = source.next_entry();
                let (suite_index, test_index) = entry;
                if let (Some(test), Some(session)) =
                    (candidate(suites, suite_index, test_index), sessions.get(suite_index))
                {
                    dispatched = dispatched.saturating_add(1);
                    let (conc_tot, conc_own) = in_flight.started(entry);
                    let dispatch = Dispatch {
                        id: dispatched,
                        started_ms:
                            u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                        entry,
                        conc_tot,
                        conc_own,
                    };
                    let tx = tx.clone();
                    let session = Arc::clone(session);
                    tokio::spawn(async move {
                        drop(tx.send(execute_one(session, test, dispatch).await));
                    });
                }
                next_fire = Instant::now()
                    .checked_add(pacer.next_wait(started.elapsed()))
                    .unwrap_or_else(Instant::now);
            }
            maybe = rx.recv() => {
                if let Some(completion) = maybe {
                    in_flight.finished(completion.entry);
                    collector.record(completion)?;
                }
            }
            () = recv_shutdown(&mut shutdown) => {
                info!("shutdown requested, stopping dispatch");
                break;
            }
        }
    }

    // graceful drain: the channel closes once every spawned execution
    // has reported
    drop(tx);
    while let Some(completion) = rx.recv().await {
        in_flight.finished(completion.entry);
        collector.record(completion)?;
        if aborted.is_none() {
            aborted = collector.breaker_tripped();
        }
    }

    Ok(LoadReport {
        dispatched,
        elapsed: started.elapsed(),
        aggregate: collector.aggregate,
        collected: collector.collected,
        aborted,
    })
}

async fn run_concurrency(
    suites: &[Suite],
    sessions: &[Arc<Session>],
    options: &LoadOptions,
    mut source: TestSource,
    level: usize,
    live_log: Option<&mut LiveLog>,
    mut shutdown: Option<ShutdownReceiver>,
) -> AppResult<LoadReport> {
    let mut collector = Collector::new(options, live_log);
    let mut gauges = InFlight::default();
    let started = Instant::now();
    let deadline = started.checked_add(options.duration);
    let mut dispatched = 0u64;
    let mut aborted: Option<String> = None;
    let mut stopped = false;

    let mut in_flight = FuturesUnordered::new();
    let seed = u64::try_from(level).unwrap_or(u64::MAX).min(options.count);
    while dispatched < seed {
        let entry = source.next_entry();
        let (suite_index, test_index) = entry;
        if let (Some(test), Some(session)) =
            (candidate(suites, suite_index, test_index), sessions.get(suite_index))
        {
            dispatched = dispatched.saturating_add(1);
            let (conc_tot, conc_own) = gauges.started(entry);
            in_flight.push(execute_one(
                Arc::clone(session),
                test,
                Dispatch {
                    id: dispatched,
                    started_ms: 0,
                    entry,
                    conc_tot,
                    conc_own,
                },
            ));
        } else {
            break;
        }
    }

    while !in_flight.is_empty() {
        tokio::select! {
            maybe = in_flight.next() => {
                let Some(completion) = maybe else { break; };
                gauges.finished(completion.entry);
                collector.record(completion)?;
                if aborted.is_none() {
                    aborted = collector.breaker_tripped();
                }
                if aborted.is_some()
                    || dispatched >= options.count
                    || deadline.is_some_and(|limit| Instant::now() >= limit)
                {
                    stopped = true;
                }
                if !stopped {
                    let entry = source.next_entry();
                    let (suite_index, test_index) = entry;
                    if let (Some(test), Some(session)) =
                        (candidate(suites, suite_index, test_index), sessions.get(suite_index))
                    {
                        dispatched = dispatched.saturating_add(1);
                        let (conc_tot, conc_own) = gauges.started(entry);
                        in_flight.push(execute_one(
                            Arc::clone(session),
                            test,
                            Dispatch {
                                id: dispatched,
                                started_ms:
                                    u64::try_from(started.elapsed().as_millis())
                                        .unwrap_or(u64::MAX),
                                entry,
                                conc_tot,
                                conc_own,
                            },
                        ));
                    }
                }
            }
            () = recv_shutdown(&mut shutdown) => {
                info!("shutdown requested, draining in-flight executions");
                stopped = true;
            }
        }
    }

    Ok(LoadReport {
        dispatched,
        elapsed: started.elapsed(),
        aggregate: collector.aggregate,
        collected: collector.collected,
        aborted,
    })
}
