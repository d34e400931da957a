//! Command-line surface.

mod parsers;


pub use parsers::{parse_duration, parse_key_value, parse_status};

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::test::Status;

/// Declarative HTTP test runner and load tester.
#[derive(Debug, Parser)]
#[command(name = "httest", version, about)]
pub struct Cli {
    /// Define or override a variable (repeatable).
    #[arg(
        short = 'D',
        long = "define",
        value_name = "NAME=VALUE",
        value_parser = parse_key_value,
        global = true
    )]
    pub defines: Vec<(String, String)>,

    /// JSON file with additional variable definitions.
    #[arg(long, value_name = "FILE", global = true)]
    pub vars_file: Option<PathBuf>,

    /// Run only tests whose name contains one of these fragments.
    #[arg(long, value_name = "NAME", global = true)]
    pub only: Vec<String>,

    /// Skip tests whose name contains one of these fragments.
    #[arg(long, value_name = "NAME", global = true)]
    pub skip: Vec<String>,

    /// Directory for result artifacts.
    #[arg(short, long, value_name = "DIR", global = true)]
    pub output: Option<PathBuf>,

    /// Tool configuration file.
    #[arg(long, value_name = "FILE", env = "HTTEST_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Verbose logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Execute standalone test files.
    Exec {
        #[arg(required = true, value_name = "TEST")]
        files: Vec<PathBuf>,
    },
    /// Execute suite files.
    Run {
        #[arg(required = true, value_name = "SUITE")]
        files: Vec<PathBuf>,
        /// Run Main tests concurrently under this worker bound.
        #[arg(long, value_name = "N")]
        max_concurrent: Option<usize>,
    },
    /// List the tests a set of suites would run.
    List {
        #[arg(required = true, value_name = "SUITE")]
        files: Vec<PathBuf>,
    },
    /// Benchmark standalone tests: repeated executions, latency stats.
    Bench {
        #[arg(required = true, value_name = "TEST")]
        files: Vec<PathBuf>,
        /// Recorded executions per test.
        #[arg(long, default_value_t = 50, value_name = "N")]
        count: u32,
        /// Discarded warmup executions per test.
        #[arg(long, default_value_t = 2, value_name = "N")]
        warmup: u32,
    },
    /// Drive suite Main tests as a load test.
    Load {
        #[arg(required = true, value_name = "SUITE")]
        files: Vec<PathBuf>,
        #[command(flatten)]
        load: LoadArgs,
    },
}

#[derive(Debug, Args)]
pub struct LoadArgs {
    /// Target arrival rate in requests per second.
    #[arg(long, value_name = "RPS")]
    pub rate: Option<f64>,

    /// Dispatch window, e.g. `30s` or `5m`.
    #[arg(long, value_name = "DURATION", value_parser = parse_duration)]
    pub duration: Option<Duration>,

    /// Linear rate ramp-up period.
    #[arg(long, value_name = "DURATION", value_parser = parse_duration)]
    pub ramp: Option<Duration>,

    /// Uniform inter-arrival gaps instead of exponential.
    #[arg(long)]
    pub uniform: bool,

    /// Stop after this many dispatched executions.
    #[arg(long, value_name = "N")]
    pub count: Option<u64>,

    /// Concurrency mode: keep exactly N executions in flight.
    #[arg(long, value_name = "N")]
    pub concurrent: Option<usize>,

    /// Abort when the observed error rate exceeds this fraction.
    #[arg(long, value_name = "FRACTION")]
    pub max_error_rate: Option<f64>,

    /// Keep full results at or above this severity (default fail).
    #[arg(long, value_name = "STATUS", value_parser = parse_status)]
    pub collect_from: Option<Status>,

    /// Stream one CSV record per completed request to this file.
    #[arg(long, value_name = "FILE")]
    pub live_log: Option<PathBuf>,

    /// Write the aggregated summary as JSON.
    #[arg(long, value_name = "FILE")]
    pub summary_json: Option<PathBuf>,
}
