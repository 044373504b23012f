//! Failures raised while building or posting synthetic input.
use std::result::Result as StdResult;

use mac_keycode::Scancode;
use thiserror::Error;

/// Outcome of a posting call.
pub type Result<T> = StdResult<T, Error>;

/// Why a synthetic event was not delivered.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// No HID-level event source could be opened.
    #[error("no HID event source available")]
    NoEventSource,
    /// The OS refused to build a keyboard event for this key code.
    #[error("cannot build keyboard event for key code {0}")]
    BuildEvent(Scancode),
    /// Posting needs a privacy permission the process lacks.
    #[error("{0} permission not granted")]
    NotTrusted(&'static str),
    /// A poster without an OS backend refused the event.
    #[error("event rejected: {0}")]
    Rejected(String),
}
