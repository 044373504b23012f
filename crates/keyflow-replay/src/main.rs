#![warn(missing_docs)]

//! Entry point for the `keyflow-replay` binary.

mod cli;
mod error;
mod replay;
mod script;

use std::process;

use clap::Parser;
use tracing::error;

use crate::{
    cli::{Cli, Commands},
    error::Result,
};

fn main() {
    if let Err(err) = run() {
        error!("{err}");
        eprintln!("error: {err}");
        process::exit(1);
    }
}

/// Parse CLI arguments, install logging, and dispatch to the chosen subcommand.
fn run() -> Result<()> {
    let Cli { log, command } = Cli::parse();
    logging::init(&log.spec());

    match command {
        Commands::Run(args) => replay::run(&args),
        Commands::Check(args) => replay::check(&args),
    }
}
