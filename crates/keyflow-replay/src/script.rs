//! RON event scripts.
//!
//! A script seeds the application context and then lists steps:
//!
//! ```ron
//! Script(
//!     running: ["com.apple.finder"],
//!     frontmost: Some("com.apple.finder"),
//!     steps: [
//!         Tap("cmd+k"),
//!         Wait(200),
//!         Type("brb"),
//!         Frontmost("com.apple.Safari"),
//!     ],
//! )
//! ```

use std::{fs, path::Path, time::Duration};

use keyflow_engine::RawEvent;
use mac_keycode::{Key, Keystroke, Modifiers};
use serde::Deserialize;

use crate::error::{Error, Result};

/// A replay script.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Script {
    /// Running applications before the first step (seeds the tracker).
    #[serde(default)]
    pub running: Vec<String>,
    /// Frontmost application before the first step.
    #[serde(default)]
    pub frontmost: Option<String>,
    /// Active user modes before the first step.
    #[serde(default)]
    pub user_modes: Vec<String>,
    /// Steps, in order.
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// One scripted action.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub enum Step {
    /// Press a keystroke spec (modifiers held).
    Down(String),
    /// Release a keystroke spec.
    Up(String),
    /// Press and release a keystroke spec.
    Tap(String),
    /// Type literal text, one key per character.
    Type(String),
    /// Sleep for this many milliseconds.
    Wait(u64),
    /// New frontmost application.
    Frontmost(String),
    /// New running-applications snapshot.
    Running(Vec<String>),
    /// Replace the active user modes.
    Modes(Vec<String>),
}

/// What the driver should do for one step.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Feed an event to the engine.
    Event(RawEvent),
    /// Sleep.
    Wait(Duration),
    /// Frontmost change.
    Frontmost(String),
    /// Running-set snapshot.
    Running(Vec<String>),
    /// User modes.
    Modes(Vec<String>),
}

/// Parse a script from RON text.
pub fn parse(source: &str, path: &Path) -> Result<Script> {
    ron::from_str(source).map_err(|e| Error::Script {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Read and parse a script file.
pub fn load(path: &Path) -> Result<Script> {
    let source = fs::read_to_string(path).map_err(|e| Error::Script {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    parse(&source, path)
}

/// Key and shift state that types `c` on a US-ANSI layout.
fn key_for_char(c: char) -> Option<(Key, bool)> {
    Key::ALL.iter().copied().find_map(|k| {
        if k.to_char(false) == Some(c) {
            Some((k, false))
        } else if k.to_char(true) == Some(c) {
            Some((k, true))
        } else {
            None
        }
    })
}

fn keystroke(step: usize, spec: &str) -> Result<Keystroke> {
    Keystroke::parse(spec).ok_or_else(|| Error::Step {
        step,
        message: format!("invalid keystroke {spec:?}"),
    })
}

impl Script {
    /// Expand every step into driver actions.
    pub fn actions(&self) -> Result<Vec<Action>> {
        let mut out = Vec::new();
        for (i, step) in self.steps.iter().enumerate() {
            match step {
                Step::Down(spec) => {
                    let k = keystroke(i, spec)?;
                    out.push(Action::Event(RawEvent::key_down(k.key, k.modifiers)));
                }
                Step::Up(spec) => {
                    let k = keystroke(i, spec)?;
                    out.push(Action::Event(RawEvent::key_up(k.key, k.modifiers)));
                }
                Step::Tap(spec) => {
                    let k = keystroke(i, spec)?;
                    out.push(Action::Event(RawEvent::key_down(k.key, k.modifiers)));
                    out.push(Action::Event(RawEvent::key_up(k.key, k.modifiers)));
                }
                Step::Type(text) => {
                    for c in text.chars() {
                        let (key, shift) = key_for_char(c).ok_or_else(|| Error::Step {
                            step: i,
                            message: format!("no key types {c:?}"),
                        })?;
                        let mods = if shift {
                            Modifiers::SHIFT
                        } else {
                            Modifiers::empty()
                        };
                        let text = c.to_string();
                        out.push(Action::Event(
                            RawEvent::key_down(key, mods).with_text(text.clone()),
                        ));
                        out.push(Action::Event(RawEvent::key_up(key, mods).with_text(text)));
                    }
                }
                Step::Wait(ms) => out.push(Action::Wait(Duration::from_millis(*ms))),
                Step::Frontmost(b) => out.push(Action::Frontmost(b.clone())),
                Step::Running(apps) => out.push(Action::Running(apps.clone())),
                Step::Modes(modes) => out.push(Action::Modes(modes.clone())),
            }
        }
        Ok(out)
    }
}
