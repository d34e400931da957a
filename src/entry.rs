//! CLI entry: argument parsing, logger setup, subcommand dispatch, and
//! exit-code mapping.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::broadcast;
use tracing::error;

use crate::args::{Cli, Command, LoadArgs, parse_duration};
use crate::config::{self, ConfigFile};
use crate::error::AppResult;
use crate::http::ClientFactory;
use crate::load::{self, LoadOptions, LoadReport};
use crate::logger;
use crate::metrics::{Aggregate, StatusCounts};
use crate::shutdown::ShutdownReceiver;
use crate::sinks::{LiveLog, write_summary_json};
use crate::suite::{self, Suite, SuiteResult};
use crate::test::{Status, TestResult};
use crate::vars;

const INTERNAL_ERROR_EXIT: u8 = 7;

/// Parse the command line and run. Exit codes: 0 pass/skip, 1 fail,
/// 2 error, 3 bogus, 7 internal failure.
#[must_use]
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    logger::init_logging(cli.verbose);
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            error!("Failed to start runtime: {}", err);
            return ExitCode::from(INTERNAL_ERROR_EXIT);
        }
    };
    match runtime.block_on(dispatch(cli)) {
        Ok(status) => ExitCode::from(status.exit_code()),
        Err(err) => {
            error!("{}", err);
            ExitCode::from(INTERNAL_ERROR_EXIT)
        }
    }
}

async fn dispatch(cli: Cli) -> AppResult<Status> {
    let config = match cli.config.as_ref() {
        Some(path) => ConfigFile::load(path)?,
        None => ConfigFile::default(),
    };
    let overrides = collect_overrides(&cli, &config)?;
    let output = cli
        .output
        .clone()
        .or_else(|| config.output.as_ref().map(PathBuf::from));
    let only = cli.only.clone();
    let skip = cli.skip.clone();

    match cli.command {
        Command::Exec { files } => cmd_exec(&files, &overrides, output.as_deref()).await,
        Command::Run {
            files,
            max_concurrent,
        } => {
            let max_concurrent = max_concurrent.or(config.max_concurrent);
            cmd_run(
                &files,
                &overrides,
                &only,
                &skip,
                max_concurrent,
                output.as_deref(),
            )
            .await
        }
        Command::List { files } => cmd_list(&files, &only, &skip),
        Command::Bench {
            files,
            count,
            warmup,
        } => cmd_bench(&files, &overrides, count, warmup, output.as_deref()).await,
        Command::Load { files, load } => {
            cmd_load(&files, &load, &config, &overrides, &only, &skip, output.as_deref()).await
        }
    }
}

/// Variable priority: command line > variables file > config file.
/// Suite variables and test defaults merge in later, below all of these.
fn collect_overrides(cli: &Cli, config: &ConfigFile) -> AppResult<BTreeMap<String, String>> {
    let mut cmdline = BTreeMap::new();
    for (name, value) in &cli.defines {
        cmdline.insert(name.clone(), value.clone());
    }
    let from_file = match cli.vars_file.as_ref() {
        Some(path) => config::load_vars_file(path)?,
        None => BTreeMap::new(),
    };
    let from_config = config.variables.clone().unwrap_or_default();
    Ok(vars::merge(&[&cmdline, &from_file, &from_config]))
}

/// Disable Main tests excluded by `--only`/`--skip`; they then report
/// Skipped without a network call.
fn apply_filters(suite: &mut Suite, only: &[String], skip: &[String]) {
    for test in &mut suite.main {
        let selected = only.is_empty()
            || only.iter().any(|fragment| test.name.contains(fragment.as_str()));
        let excluded = skip
            .iter()
            .any(|fragment| test.name.contains(fragment.as_str()));
        if !selected || excluded {
            test.poll.max = -1;
        }
    }
}

async fn cmd_exec(
    files: &[PathBuf],
    overrides: &BTreeMap<String, String>,
    output: Option<&Path>,
) -> AppResult<Status> {
    let factory = ClientFactory::default();
    let mut worst = Status::NotRun;
    let mut results = Vec::with_capacity(files.len());
    for path in files {
        let test = config::load_test(path)?;
        let session = suite::Session::new(&factory, false, overrides.clone())?;
        let result = suite::run_test(&session, &test).await;
        print_test_result(&result, "");
        worst = worst.max(result.status);
        results.push(result);
    }
    print_counts(&count_tests(&results));
    if let Some(dir) = output {
        std::fs::create_dir_all(dir)?;
        write_summary_json(&dir.join("exec-results.json"), &results).await?;
    }
    Ok(worst)
}

async fn cmd_run(
    files: &[PathBuf],
    overrides: &BTreeMap<String, String>,
    only: &[String],
    skip: &[String],
    max_concurrent: Option<usize>,
    output: Option<&Path>,
) -> AppResult<Status> {
    let factory = ClientFactory::default();
    let mut worst = Status::NotRun;
    for path in files {
        let mut loaded = config::load_suite(path)?;
        apply_filters(&mut loaded, only, skip);
        let result = match max_concurrent {
            Some(bound) => {
                let session = Arc::new(loaded.session(&factory, overrides)?);
                loaded.execute_concurrent(&session, bound).await
            }
            None => {
                let session = loaded.session(&factory, overrides)?;
                loaded.execute(&session).await
            }
        };
        print_suite_result(&result);
        if let Some(dir) = output {
            std::fs::create_dir_all(dir)?;
            let file = dir.join(format!("{}-result.json", sanitize(&result.name)));
            write_summary_json(&file, &result).await?;
        }
        worst = worst.max(result.status);
    }
    Ok(worst)
}

fn cmd_list(files: &[PathBuf], only: &[String], skip: &[String]) -> AppResult<Status> {
    for path in files {
        let mut loaded = config::load_suite(path)?;
        apply_filters(&mut loaded, only, skip);
        println!("{}", loaded.name);
        for (section, tests) in [
            ("setup", &loaded.setup),
            ("main", &loaded.main),
            ("teardown", &loaded.teardown),
        ] {
            for test in tests {
                let marker = if test.disabled() { " (disabled)" } else { "" };
                println!("  {:>8}  {}{}", section, test.name, marker);
            }
        }
    }
    Ok(Status::NotRun)
}

async fn cmd_bench(
    files: &[PathBuf],
    overrides: &BTreeMap<String, String>,
    count: u32,
    warmup: u32,
    output: Option<&Path>,
) -> AppResult<Status> {
    let factory = ClientFactory::default();
    let mut worst = Status::NotRun;
    for path in files {
        let test = config::load_test(path)?;
        let session = suite::Session::new(&factory, false, overrides.clone())?;
        for _ in 0..warmup {
            drop(suite::run_test(&session, &test).await);
        }
        let mut aggregate = Aggregate::new();
        let started = tokio::time::Instant::now();
        for _ in 0..count {
            let result = suite::run_test(&session, &test).await;
            let latency_ms = u64::try_from(result.duration.as_millis()).unwrap_or(u64::MAX);
            aggregate.record(result.status, latency_ms);
            worst = worst.max(result.status);
        }
        let summary = aggregate.summary(started.elapsed());
        println!("bench {}", test.name);
        print_counts(&summary.counts);
        println!(
            "latency ms  min {}  avg {}  p50 {}  p90 {}  p99 {}  max {}",
            summary.latency.min_ms,
            summary.latency.avg_ms,
            summary.latency.p50_ms,
            summary.latency.p90_ms,
            summary.latency.p99_ms,
            summary.latency.max_ms
        );
        if let Some(dir) = output {
            std::fs::create_dir_all(dir)?;
            let file = dir.join(format!("{}-bench.json", sanitize(&test.name)));
            write_summary_json(&file, &summary).await?;
        }
    }
    Ok(worst)
}

async fn cmd_load(
    files: &[PathBuf],
    args: &LoadArgs,
    config: &ConfigFile,
    overrides: &BTreeMap<String, String>,
    only: &[String],
    skip: &[String],
    output: Option<&Path>,
) -> AppResult<Status> {
    let factory = ClientFactory::default();
    let mut suites = Vec::with_capacity(files.len());
    let mut sessions = Vec::with_capacity(files.len());
    for path in files {
        let mut loaded = config::load_suite(path)?;
        apply_filters(&mut loaded, only, skip);
        sessions.push(Arc::new(loaded.session(&factory, overrides)?));
        suites.push(loaded);
    }

    let options = load_options(args, config)?;
    let mut live_log = match args.live_log.as_ref() {
        Some(path) => Some(LiveLog::create(path)?),
        None => None,
    };
    let report = load::run_load(
        &suites,
        &sessions,
        &options,
        live_log.as_mut(),
        Some(ctrl_c_shutdown()),
    )
    .await?;

    print_load_report(&report);
    let summary = report.aggregate.summary(report.elapsed);
    if let Some(path) = args.summary_json.as_ref() {
        write_summary_json(path, &summary).await?;
    }
    if let Some(dir) = output {
        std::fs::create_dir_all(dir)?;
        write_summary_json(&dir.join("load-summary.json"), &summary).await?;
    }
    Ok(report.status())
}

fn ctrl_c_shutdown() -> ShutdownReceiver {
    let (tx, rx) = broadcast::channel(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            drop(tx.send(()));
        }
    });
    rx
}

fn load_options(args: &LoadArgs, config: &ConfigFile) -> AppResult<LoadOptions> {
    let defaults = config.load.as_ref();
    let fallback = LoadOptions::default();

    let duration = match args.duration {
        Some(value) => value,
        None => match defaults.and_then(|load| load.duration.as_deref()) {
            Some(raw) => parse_duration(raw)?,
            None => fallback.duration,
        },
    };
    let ramp = match args.ramp {
        Some(value) => value,
        None => match defaults.and_then(|load| load.ramp.as_deref()) {
            Some(raw) => parse_duration(raw)?,
            None => Duration::ZERO,
        },
    };
    Ok(LoadOptions {
        rate: args
            .rate
            .or_else(|| defaults.and_then(|load| load.rate))
            .unwrap_or(fallback.rate),
        duration,
        ramp,
        uniform: args.uniform || defaults.and_then(|load| load.uniform).unwrap_or(false),
        count: args
            .count
            .or_else(|| defaults.and_then(|load| load.count))
            .unwrap_or(u64::MAX),
        max_error_rate: args
            .max_error_rate
            .or_else(|| defaults.and_then(|load| load.max_error_rate))
            .unwrap_or(0.0),
        concurrency: args
            .concurrent
            .or_else(|| defaults.and_then(|load| load.concurrent)),
        collect_from: args.collect_from.unwrap_or(Status::Fail),
    })
}

fn count_tests(results: &[TestResult]) -> StatusCounts {
    let mut counts = StatusCounts::default();
    for result in results {
        counts.record(result.status);
    }
    counts
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .collect()
}

fn print_test_result(result: &TestResult, indent: &str) {
    let tries = if result.tries > 1 {
        format!(" ({} tries)", result.tries)
    } else {
        String::new()
    };
    let error = result
        .error
        .as_deref()
        .map(|text| format!("  [{text}]"))
        .unwrap_or_default();
    println!(
        "{indent}{:>7}  {}  {}ms{}{}",
        result.status,
        result.name,
        result.duration.as_millis(),
        tries,
        error
    );
    for check in &result.checks {
        let detail = check
            .error
            .as_deref()
            .map(|text| format!("  [{text}]"))
            .unwrap_or_default();
        println!("{indent}         {:>7}  {}{}", check.status, check.name, detail);
    }
}

fn print_suite_result(result: &SuiteResult) {
    println!(
        "{:>7}  suite {}  {}ms",
        result.status,
        result.name,
        result.duration.as_millis()
    );
    for (section, tests) in [
        ("setup", &result.setup),
        ("main", &result.main),
        ("teardown", &result.teardown),
    ] {
        if tests.is_empty() {
            continue;
        }
        println!("  {section}:");
        for test in tests {
            print_test_result(test, "  ");
        }
    }
}

fn print_counts(counts: &StatusCounts) {
    println!(
        "total {}  pass {}  fail {}  error {}  bogus {}  skipped {}",
        counts.total(),
        counts.pass,
        counts.fail,
        counts.error,
        counts.bogus,
        counts.skipped
    );
}

fn print_load_report(report: &LoadReport) {
    let summary = report.aggregate.summary(report.elapsed);
    println!(
        "dispatched {} in {}ms ({} rps)",
        report.dispatched,
        summary.duration_ms,
        format_x100(summary.throughput_rps_x100)
    );
    print_counts(&summary.counts);
    println!(
        "latency ms  min {}  avg {}  p50 {}  p90 {}  p99 {}  max {}",
        summary.latency.min_ms,
        summary.latency.avg_ms,
        summary.latency.p50_ms,
        summary.latency.p90_ms,
        summary.latency.p99_ms,
        summary.latency.max_ms
    );
    if summary.latency_fail.count > 0 {
        println!(
            "failed-request latency ms  p50 {}  p99 {}",
            summary.latency_fail.p50_ms, summary.latency_fail.p99_ms
        );
    }
    if let Some(reason) = report.aborted.as_deref() {
        println!("aborted: {reason}");
    }
    for result in &report.collected {
        print_test_result(result, "  ");
    }
}

fn format_x100(value: u64) -> String {
    format!(
        "{}.{:02}",
        value.checked_div(100).unwrap_or(0),
        value.checked_rem(100).unwrap_or(0)
    )
}
