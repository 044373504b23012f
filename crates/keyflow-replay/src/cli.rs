//! Command-line interface definitions for keyflow-replay.

use std::{path::PathBuf, time::Duration};

use clap::{Args, Parser, Subcommand};
use logging::LogArgs;

/// Command-line interface for the `keyflow-replay` binary.
#[derive(Parser, Debug)]
#[command(
    name = "keyflow-replay",
    about = "Replay scripted keyboard sessions through the keyflow engine",
    version
)]
pub struct Cli {
    /// Logging controls shared across keyflow binaries.
    #[command(flatten)]
    pub log: LogArgs,

    /// What to do.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Drive the engine with an event script and print every decision.
    Run(RunArgs),
    /// Load a configuration and report malformed triggers.
    Check(CheckArgs),
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Event script (RON).
    #[arg(value_name = "SCRIPT")]
    pub script: PathBuf,

    /// Workflow configuration (RON). Defaults to ~/.keyflow/workflows.ron.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Time to let timers and running commands finish after the last step.
    #[arg(
        long,
        value_parser = humantime::parse_duration,
        default_value = "1500ms",
        value_name = "DURATION"
    )]
    pub settle: Duration,
}

/// Arguments for the `check` subcommand.
#[derive(Args, Debug, Clone)]
pub struct CheckArgs {
    /// Workflow configuration (RON). Defaults to ~/.keyflow/workflows.ron.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}
