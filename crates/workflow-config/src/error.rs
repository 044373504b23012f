//! Error types for configuration loading and validation.

use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
/// Errors produced while loading, parsing, or validating a configuration.
pub enum Error {
    #[error("{message}")]
    /// I/O or filesystem read error.
    Read {
        /// Optional path associated with the read error.
        path: Option<PathBuf>,
        /// Human-readable error message.
        message: String,
    },
    #[error("{message}")]
    /// RON syntax or shape error.
    Parse {
        /// Optional path associated with the parse error.
        path: Option<PathBuf>,
        /// Parser message, including its position.
        message: String,
    },
    #[error("{message}")]
    /// The file parsed but describes something the engine cannot use.
    Validation {
        /// Optional path associated with the validation error.
        path: Option<PathBuf>,
        /// Human-readable error message.
        message: String,
    },
}

impl Error {
    /// Render a human-friendly error message including the path when known.
    pub fn pretty(&self) -> String {
        let (label, path, message) = match self {
            Self::Read { path, message } => ("Read error", path, message),
            Self::Parse { path, message } => ("Config parse error", path, message),
            Self::Validation { path, message } => ("Config validation error", path, message),
        };
        match path {
            Some(p) => format!("{} at {}\n{}", label, p.display(), message),
            None => format!("{}\n{}", label, message),
        }
    }

    /// Access the optional path attached to this error.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Read { path, .. } | Self::Parse { path, .. } | Self::Validation { path, .. } => {
                path.as_deref()
            }
        }
    }
}
