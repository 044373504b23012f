//! Test support utilities for keyflow-engine unit and integration tests.
//! These helpers are public to avoid dead_code warnings and are lightweight.
//! They are intended for use by the test suite only.

use std::mem;

use parking_lot::Mutex;
use workflow_config::{
    AppContext, ApplicationTrigger, Command, CommandKind, Configuration, ExecutionMode,
    RemapAction, Rule, Trigger, Workflow, WorkflowGroup,
};

use crate::dispatch::{CommandRunner, DispatchRequest};

fn workflow(id: &str, trigger: Trigger) -> Workflow {
    Workflow {
        id: id.to_string(),
        name: id.to_string(),
        trigger: Some(trigger),
        commands: vec![Command {
            id: format!("{id}.cmd"),
            name: String::new(),
            kind: CommandKind::Shell {
                command: format!("echo {id}"),
            },
        }],
        execution: ExecutionMode::Concurrent,
        is_enabled: true,
    }
}

/// Keyboard shortcut workflow for a chord of keystroke specs.
pub fn shortcut(id: &str, keys: &[&str]) -> Workflow {
    workflow(
        id,
        Trigger::KeyboardShortcuts {
            keys: keys.iter().map(|k| k.to_string()).collect(),
            passthrough: false,
        },
    )
}

/// Like [`shortcut`], but the final keystroke is not suppressed.
pub fn passthrough_shortcut(id: &str, keys: &[&str]) -> Workflow {
    workflow(
        id,
        Trigger::KeyboardShortcuts {
            keys: keys.iter().map(|k| k.to_string()).collect(),
            passthrough: true,
        },
    )
}

/// Tap/hold modifier workflow.
pub fn modifier(
    id: &str,
    key: &str,
    alone: RemapAction,
    held: Option<RemapAction>,
    timeout_ms: u64,
) -> Workflow {
    workflow(
        id,
        Trigger::Modifier {
            key: key.to_string(),
            alone,
            held,
            timeout_ms,
        },
    )
}

/// Snippet workflow.
pub fn snippet(id: &str, text: &str) -> Workflow {
    workflow(
        id,
        Trigger::Snippet {
            text: text.to_string(),
        },
    )
}

/// Application workflow listening on one bundle.
pub fn app_trigger(id: &str, bundle: &str, contexts: &[AppContext]) -> Workflow {
    workflow(
        id,
        Trigger::Application(vec![ApplicationTrigger {
            bundle_identifier: bundle.to_string(),
            contexts: contexts.to_vec(),
        }]),
    )
}

/// `wf` with `is_enabled` cleared.
pub fn disabled(mut wf: Workflow) -> Workflow {
    wf.is_enabled = false;
    wf
}

/// `wf` with serial execution and `commands` shell commands.
pub fn serial(mut wf: Workflow, commands: &[&str]) -> Workflow {
    wf.execution = ExecutionMode::Serial;
    wf.commands = commands
        .iter()
        .enumerate()
        .map(|(i, c)| Command {
            id: format!("{}.{i}", wf.id),
            name: String::new(),
            kind: CommandKind::Shell {
                command: c.to_string(),
            },
        })
        .collect();
    wf
}

/// Unrestricted, enabled group.
pub fn group(name: &str, workflows: Vec<Workflow>) -> WorkflowGroup {
    scoped_group(name, &[], &[], workflows)
}

/// Group restricted to `bundles` and `modes` (empty slices mean no restriction).
pub fn scoped_group(
    name: &str,
    bundles: &[&str],
    modes: &[&str],
    workflows: Vec<Workflow>,
) -> WorkflowGroup {
    WorkflowGroup {
        name: name.to_string(),
        is_enabled: true,
        rule: (!bundles.is_empty()).then(|| Rule {
            bundle_identifiers: bundles.iter().map(|b| b.to_string()).collect(),
        }),
        user_modes: modes.iter().map(|m| m.to_string()).collect(),
        workflows,
    }
}

/// Configuration with default settings.
pub fn config(groups: Vec<WorkflowGroup>) -> Configuration {
    Configuration {
        groups,
        ..Configuration::default()
    }
}

/// Runner that records every request instead of executing it.
#[derive(Debug, Default)]
pub struct RecordingRunner {
    requests: Mutex<Vec<DispatchRequest>>,
}

impl RecordingRunner {
    /// Empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain recorded requests.
    pub fn take(&self) -> Vec<DispatchRequest> {
        mem::take(&mut *self.requests.lock())
    }

    /// Drain recorded requests, keeping only workflow ids.
    pub fn ids(&self) -> Vec<String> {
        self.take()
            .into_iter()
            .map(|r| r.workflow.id.clone())
            .collect()
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, request: DispatchRequest) {
        self.requests.lock().push(request);
    }
}
