use std::result::Result as StdResult;

use thiserror::Error;

/// Convenient result type for the engine crate.
pub type Result<T> = StdResult<T, Error>;

/// Unified error type for the keyflow engine.
#[derive(Debug, Error)]
pub enum Error {
    /// Errors from loading or validating a configuration.
    #[error("Config error: {0}")]
    Config(#[from] workflow_config::Error),

    /// Posting a synthesized event failed.
    #[error("Event injection failed: {0}")]
    Inject(#[from] keypost::Error),

    /// The engine input channel has been closed by the receiver.
    #[error("Engine channel closed")]
    ChannelClosed,

    /// A command executor reported a failure.
    #[error("Command {command} failed: {message}")]
    Command {
        /// Id (or name) of the failing command.
        command: String,
        /// Executor-provided reason.
        message: String,
    },

    /// Generic error with context.
    #[error("Engine error: {0}")]
    Msg(String),
}
