//! Configuration snapshot types: groups of workflows, each with one trigger
//! and a list of opaque commands.

use mac_keycode::{Keystroke, Modifier, Modifiers};
use serde::{Deserialize, Serialize};

use crate::{
    EngineSettings,
    defaults::{default_modifier_timeout_ms, default_true},
};

/// Bundle identifier scope that matches every application.
pub const GLOBAL_SCOPE: &str = "*";

/// A full configuration snapshot, in evaluation order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Configuration {
    #[serde(default)]
    pub settings: EngineSettings,
    #[serde(default)]
    pub groups: Vec<WorkflowGroup>,
}

/// A named set of workflows sharing an application rule and user modes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkflowGroup {
    pub name: String,
    #[serde(default = "default_true")]
    pub is_enabled: bool,
    /// Restricts the group's keyboard triggers to these applications.
    #[serde(default)]
    pub rule: Option<Rule>,
    /// Restricts the group's keyboard triggers to these user modes.
    #[serde(default)]
    pub user_modes: Vec<String>,
    #[serde(default)]
    pub workflows: Vec<Workflow>,
}

impl WorkflowGroup {
    /// Bundle identifiers this group's entries are registered under.
    ///
    /// Falls back to [`GLOBAL_SCOPE`] when the group has no rule or the rule
    /// lists no (non-empty) identifiers.
    pub fn bundle_scopes(&self) -> Vec<&str> {
        let ids: Vec<&str> = self
            .rule
            .iter()
            .flat_map(|r| r.bundle_identifiers.iter())
            .map(String::as_str)
            .filter(|s| !s.is_empty())
            .collect();
        if ids.is_empty() {
            vec![GLOBAL_SCOPE]
        } else {
            ids
        }
    }

    /// User-mode keys this group's entries are registered under; the empty
    /// key means "no mode required".
    pub fn mode_scopes(&self) -> Vec<&str> {
        let modes: Vec<&str> = self
            .user_modes
            .iter()
            .map(String::as_str)
            .filter(|s| !s.is_empty())
            .collect();
        if modes.is_empty() { vec![""] } else { modes }
    }
}

/// Application restriction for a group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Rule {
    #[serde(default)]
    pub bundle_identifiers: Vec<String>,
}

/// One automation: a trigger plus the commands it runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Workflow {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub trigger: Option<Trigger>,
    #[serde(default)]
    pub commands: Vec<Command>,
    #[serde(default)]
    pub execution: ExecutionMode,
    #[serde(default = "default_true")]
    pub is_enabled: bool,
}

/// What makes a workflow run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Trigger {
    /// Application lifecycle transitions.
    Application(Vec<ApplicationTrigger>),
    /// A sequence of keystrokes pressed one after another.
    KeyboardShortcuts {
        keys: Vec<String>,
        /// Dispatch without swallowing the final keystroke.
        #[serde(default)]
        passthrough: bool,
    },
    /// Tap-vs-hold remap of a single key.
    Modifier {
        key: String,
        alone: RemapAction,
        #[serde(default)]
        held: Option<RemapAction>,
        #[serde(default = "default_modifier_timeout_ms")]
        timeout_ms: u64,
    },
    /// Literal typed text.
    Snippet { text: String },
}

/// Application trigger entry: one bundle identifier, one or more contexts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApplicationTrigger {
    pub bundle_identifier: String,
    pub contexts: Vec<AppContext>,
}

/// Lifecycle transition an application trigger listens for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AppContext {
    Launched,
    Closed,
    FrontMost,
    ResignFrontMost,
}

/// Configured remap output, as written in the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemapAction {
    /// Synthesize a keystroke spec such as `"esc"` or `"cmd+space"`.
    Key(String),
    /// Synthesize a modifier set such as `["ctrl", "opt"]`.
    Modifiers(Vec<String>),
}

/// Resolved remap output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Remap {
    Key(Keystroke),
    Modifiers(Modifiers),
}

impl RemapAction {
    /// Parse the spec strings into a [`Remap`].
    pub fn resolve(&self) -> Result<Remap, String> {
        match self {
            Self::Key(spec) => Keystroke::parse(spec)
                .map(Remap::Key)
                .ok_or_else(|| format!("invalid keystroke {:?}", spec)),
            Self::Modifiers(specs) => {
                if specs.is_empty() {
                    return Err("empty modifier list".to_string());
                }
                let mut mods = Modifiers::empty();
                for s in specs {
                    let m = Modifier::from_spec(s.trim())
                        .ok_or_else(|| format!("invalid modifier {:?}", s))?;
                    mods |= Modifiers::from(m);
                }
                Ok(Remap::Modifiers(mods))
            }
        }
    }
}

impl Trigger {
    /// Parse the keystrokes of a keyboard-shortcut trigger.
    ///
    /// Returns `None` for other trigger kinds.
    pub fn shortcut_keys(&self) -> Option<Result<Vec<Keystroke>, String>> {
        let Self::KeyboardShortcuts { keys, .. } = self else {
            return None;
        };
        if keys.is_empty() {
            return Some(Err("keyboard trigger has no keys".to_string()));
        }
        Some(
            keys.iter()
                .map(|k| Keystroke::parse(k).ok_or_else(|| format!("invalid keystroke {:?}", k)))
                .collect(),
        )
    }
}

/// How a workflow's commands are executed by the runner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExecutionMode {
    /// Fire every command without ordering guarantees.
    #[default]
    Concurrent,
    /// Run commands strictly in order.
    Serial,
}

/// An opaque dispatchable unit. The engine never interprets `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Command {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub kind: CommandKind,
}

/// Command payloads, interpreted only by the external command runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandKind {
    Application { bundle_identifier: String },
    Open { path: String },
    Shell { command: String },
    Script { source: String },
    Keyboard { keys: String },
    Text { text: String },
    BuiltIn { name: String },
}
