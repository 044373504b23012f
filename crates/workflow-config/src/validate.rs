//! Static checks over a parsed configuration.
//!
//! Nothing here rejects a configuration outright: the engine skips unusable
//! definitions when it rebuilds, and these diagnostics say which ones.

use std::collections::HashSet;

use mac_keycode::Key;

use crate::{Configuration, Trigger, Workflow};

/// One problem found in a workflow definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub group: String,
    pub workflow: String,
    pub message: String,
}

/// Every problem the engine would skip at rebuild time, in file order.
pub(crate) fn diagnostics(config: &Configuration) -> Vec<Diagnostic> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    for group in &config.groups {
        for wf in &group.workflows {
            let mut push = |message: String| {
                out.push(Diagnostic {
                    group: group.name.clone(),
                    workflow: wf.id.clone(),
                    message,
                })
            };
            if !seen.insert(wf.id.as_str()) {
                push(format!("duplicate workflow id {:?}", wf.id));
            }
            if let Err(message) = check_trigger(wf) {
                push(message);
            }
        }
    }
    out
}

fn check_trigger(wf: &Workflow) -> Result<(), String> {
    let Some(trigger) = &wf.trigger else {
        return Ok(());
    };
    match trigger {
        Trigger::KeyboardShortcuts { .. } => trigger.shortcut_keys().transpose().map(|_| ()),
        Trigger::Modifier {
            key, alone, held, ..
        } => {
            Key::from_spec(key.trim()).ok_or_else(|| format!("invalid modifier trigger key {:?}", key))?;
            alone.resolve()?;
            if let Some(h) = held {
                h.resolve()?;
            }
            Ok(())
        }
        Trigger::Snippet { text } if text.is_empty() => Err("empty snippet text".to_string()),
        Trigger::Snippet { .. } => Ok(()),
        Trigger::Application(entries) => {
            if entries.is_empty() {
                return Err("application trigger has no entries".to_string());
            }
            for e in entries {
                if e.bundle_identifier.is_empty() {
                    return Err("application trigger with empty bundle identifier".to_string());
                }
                if e.contexts.is_empty() {
                    return Err(format!(
                        "application trigger for {:?} has no contexts",
                        e.bundle_identifier
                    ));
                }
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::load_from_str;

    #[test]
    fn clean_config_has_no_diagnostics() {
        let cfg = load_from_str(
            r#"(groups: [(name: "g", workflows: [
                (id: "a", trigger: Some(KeyboardShortcuts(keys: ["cmd+k", "cmd+j"]))),
                (id: "b", trigger: Some(Modifier(key: "capslock", alone: Key("esc"), held: Some(Modifiers(["ctrl"]))))),
            ])])"#,
            None,
        )
        .unwrap();
        assert!(cfg.diagnostics().is_empty());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn reports_each_problem() {
        let cfg = load_from_str(
            r#"(groups: [(name: "g", workflows: [
                (id: "a", trigger: Some(KeyboardShortcuts(keys: []))),
                (id: "a", trigger: Some(Snippet(text: ""))),
                (id: "c", trigger: Some(KeyboardShortcuts(keys: ["hyper+q"]))),
                (id: "d", trigger: Some(Modifier(key: "capslock", alone: Modifiers(["meta"])))),
                (id: "e", trigger: Some(Application([(bundle_identifier: "com.apple.Safari", contexts: [])]))),
            ])])"#,
            None,
        )
        .unwrap();
        let diags = cfg.diagnostics();
        let ids: Vec<&str> = diags.iter().map(|d| d.workflow.as_str()).collect();
        assert_eq!(ids, vec!["a", "a", "a", "c", "d", "e"]);
        assert!(diags[1].message.contains("duplicate"));
        assert!(diags[3].message.contains("hyper+q"));
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().starts_with("g/a:"));
    }
}
