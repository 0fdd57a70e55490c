// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `multiwatch`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "multiwatch",
    version,
    about = "Watch directories and run stage commands with dependency-aware rebuild propagation.",
    long_about = None
)]
pub struct CliArgs {
    /// Directory searched for `multiwatch.toml` after the system locations.
    ///
    /// Defaults to `MW_DIRNAME` if set, else the current working directory.
    #[arg(long, value_name = "DIR")]
    pub dirname: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `MW_LOGLEVEL` or the config's `loglevel` key is used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Filesystem poll cadence in milliseconds.
    #[arg(long, value_name = "MS", default_value_t = 100)]
    pub poll_ms: u64,

    /// Parse + validate, print the stage graph, but don't watch or execute.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
