//! Error handling for the keyflow-replay crate.

use std::{io, path::PathBuf, result};

use thiserror::Error;

/// Convenient result type for keyflow-replay operations.
pub type Result<T> = result::Result<T, Error>;

/// Errors that can occur while replaying a script.
#[derive(Debug, Error)]
pub enum Error {
    /// Wrapper for standard I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// Configuration loading or validation errors.
    #[error("{}", .0.pretty())]
    Config(#[from] workflow_config::Error),
    /// Errors surfaced by the engine.
    #[error("Engine error: {0}")]
    Engine(#[from] keyflow_engine::Error),
    /// The event script could not be read or parsed.
    #[error("Script error at {}: {message}", path.display())]
    Script {
        /// Script path.
        path: PathBuf,
        /// What went wrong.
        message: String,
    },
    /// A script step named a key or keystroke we cannot build.
    #[error("Bad step {step}: {message}")]
    Step {
        /// Index of the step in the script.
        step: usize,
        /// What went wrong.
        message: String,
    },
    /// The engine loop went away before the script finished.
    #[error("Engine loop stopped unexpectedly")]
    EngineStopped,
}
