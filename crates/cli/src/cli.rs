//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use contracts::DispatchMode;
use std::path::PathBuf;

/// bench-dispatch - pull vs push event dispatch benchmark
#[derive(Parser, Debug)]
#[command(
    name = "bench-dispatch",
    author,
    version,
    about = "Pull vs push event dispatch benchmark",
    long_about = "Generates a stream of synthetic banking events and delivers it to a \n\
                  bulk SQLite persister twice: once through a polled queue (pull) and \n\
                  once through registered callbacks (push). Prints a side-by-side \n\
                  throughput comparison."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "BENCH_DISPATCH_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "BENCH_DISPATCH_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the benchmark
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON), defaults apply when missing
    #[arg(
        short,
        long,
        default_value = "bench.toml",
        env = "BENCH_DISPATCH_CONFIG"
    )]
    pub config: PathBuf,

    /// Override number of events to generate
    #[arg(short = 'n', long, env = "BENCH_DISPATCH_EVENTS")]
    pub events: Option<u64>,

    /// Override bulk write threshold
    #[arg(short, long, env = "BENCH_DISPATCH_BATCH_SIZE")]
    pub batch_size: Option<usize>,

    /// Override pull queue capacity (0 = unbounded)
    #[arg(long, env = "BENCH_DISPATCH_QUEUE_CAPACITY")]
    pub queue_capacity: Option<usize>,

    /// Run only one mode, or both
    #[arg(short, long, value_enum, env = "BENCH_DISPATCH_MODE")]
    pub mode: Option<ModeSelection>,

    /// Override database output directory
    #[arg(short, long, env = "BENCH_DISPATCH_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Fixed generator seed
    #[arg(long, env = "BENCH_DISPATCH_SEED")]
    pub seed: Option<u64>,

    /// Write the comparison report as JSON to this path
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Validate configuration and exit without running
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "BENCH_DISPATCH_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "bench.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "bench.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Print the effective configuration as TOML
    #[arg(long)]
    pub effective: bool,
}

/// Which dispatch modes to run
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModeSelection {
    Pull,
    Push,
    /// Pull first, then push
    Both,
}

impl ModeSelection {
    pub fn modes(self) -> Vec<DispatchMode> {
        match self {
            ModeSelection::Pull => vec![DispatchMode::Pull],
            ModeSelection::Push => vec![DispatchMode::Push],
            ModeSelection::Both => vec![DispatchMode::Pull, DispatchMode::Push],
        }
    }
}

/// Log output format
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}
