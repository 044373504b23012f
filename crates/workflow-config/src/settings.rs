use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::defaults::{
    default_builtin_hold_timeout_ms, default_chord_timeout_ms, default_snippet_buffer_cap,
    default_snippet_timeout_ms,
};

/// Timing and sizing knobs for the trigger engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Idle reset for a pending chord prefix.
    #[serde(default = "default_chord_timeout_ms")]
    pub chord_timeout_ms: u64,
    /// Rolling idle reset for the snippet buffer.
    #[serde(default = "default_snippet_timeout_ms")]
    pub snippet_timeout_ms: u64,
    /// Hold threshold for the built-in Escape and Tab modifier triggers.
    #[serde(default = "default_builtin_hold_timeout_ms")]
    pub builtin_hold_timeout_ms: u64,
    /// Maximum number of buffered snippet characters.
    #[serde(default = "default_snippet_buffer_cap")]
    pub snippet_buffer_cap: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            chord_timeout_ms: default_chord_timeout_ms(),
            snippet_timeout_ms: default_snippet_timeout_ms(),
            builtin_hold_timeout_ms: default_builtin_hold_timeout_ms(),
            snippet_buffer_cap: default_snippet_buffer_cap(),
        }
    }
}

impl EngineSettings {
    pub fn chord_timeout(&self) -> Duration {
        Duration::from_millis(self.chord_timeout_ms)
    }

    pub fn snippet_timeout(&self) -> Duration {
        Duration::from_millis(self.snippet_timeout_ms)
    }
}
