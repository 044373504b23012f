#[cfg(test)]
mod tests {
    use mac_keycode::{Key, Keystroke, Modifiers};

    use crate::*;

    const SAMPLE: &str = r#"(
        settings: (chord_timeout_ms: 750),
        groups: [
            (
                name: "Browsers",
                rule: Some((bundle_identifiers: ["com.apple.Safari", "org.mozilla.firefox"])),
                user_modes: ["nav"],
                workflows: [
                    (
                        id: "tabs",
                        name: "Next tab",
                        trigger: Some(KeyboardShortcuts(keys: ["cmd+k", "n"], passthrough: true)),
                        commands: [(kind: Keyboard(keys: "ctrl+tab"))],
                        execution: Serial,
                    ),
                ],
            ),
            (
                name: "Global",
                workflows: [
                    (
                        id: "caps",
                        trigger: Some(Modifier(key: "capslock", alone: Key("esc"), held: Some(Modifiers(["ctrl", "opt"])), timeout_ms: 150)),
                    ),
                    (
                        id: "launch",
                        trigger: Some(Application([(bundle_identifier: "com.apple.Terminal", contexts: [Launched, FrontMost])])),
                        commands: [
                            (id: "c1", name: "Say hi", kind: Shell(command: "say hi")),
                            (kind: Open(path: "~/Downloads")),
                        ],
                    ),
                    (id: "brb", trigger: Some(Snippet(text: "brb")), is_enabled: false),
                ],
            ),
        ],
    )"#;

    #[test]
    fn sample_parses() {
        let cfg = load_from_str(SAMPLE, None).unwrap();
        assert_eq!(cfg.settings.chord_timeout_ms, 750);
        assert_eq!(cfg.settings.snippet_timeout_ms, 1000);
        assert_eq!(cfg.groups.len(), 2);

        let browsers = &cfg.groups[0];
        assert!(browsers.is_enabled);
        assert_eq!(
            browsers.bundle_scopes(),
            vec!["com.apple.Safari", "org.mozilla.firefox"]
        );
        assert_eq!(browsers.mode_scopes(), vec!["nav"]);
        let tabs = &browsers.workflows[0];
        assert_eq!(tabs.execution, ExecutionMode::Serial);
        assert_eq!(
            tabs.trigger,
            Some(Trigger::KeyboardShortcuts {
                keys: vec!["cmd+k".into(), "n".into()],
                passthrough: true,
            })
        );

        let global = &cfg.groups[1];
        assert_eq!(global.bundle_scopes(), vec![GLOBAL_SCOPE]);
        assert_eq!(global.mode_scopes(), vec![""]);
        assert!(!global.workflows[2].is_enabled);
        assert_eq!(global.workflows[1].commands.len(), 2);
        assert_eq!(global.workflows[1].execution, ExecutionMode::Concurrent);
        assert!(cfg.diagnostics().is_empty());
    }

    #[test]
    fn modifier_trigger_resolves() {
        let cfg = load_from_str(SAMPLE, None).unwrap();
        let Some(Trigger::Modifier {
            alone,
            held,
            timeout_ms,
            ..
        }) = &cfg.groups[1].workflows[0].trigger
        else {
            panic!("expected modifier trigger");
        };
        assert_eq!(*timeout_ms, 150);
        assert_eq!(alone.resolve(), Ok(Remap::Key(Keystroke::bare(Key::Escape))));
        assert_eq!(
            held.as_ref().map(RemapAction::resolve),
            Some(Ok(Remap::Modifiers(Modifiers::CONTROL | Modifiers::OPTION)))
        );
    }

    #[test]
    fn modifier_timeout_defaults() {
        let cfg = load_from_str(
            r#"(groups: [(name: "g", workflows: [(id: "m", trigger: Some(Modifier(key: "tab", alone: Key("tab"))))])])"#,
            None,
        )
        .unwrap();
        match &cfg.groups[0].workflows[0].trigger {
            Some(Trigger::Modifier { timeout_ms, held, .. }) => {
                assert_eq!(*timeout_ms, 200);
                assert!(held.is_none());
            }
            other => panic!("unexpected trigger {:?}", other),
        }
    }

    #[test]
    fn empty_document_is_default() {
        let cfg = load_from_str("()", None).unwrap();
        assert_eq!(cfg, Configuration::default());
    }

    #[test]
    fn empty_rule_falls_back_to_global() {
        let cfg = load_from_str(
            r#"(groups: [(name: "g", rule: Some((bundle_identifiers: [""])), user_modes: [""])])"#,
            None,
        )
        .unwrap();
        assert_eq!(cfg.groups[0].bundle_scopes(), vec![GLOBAL_SCOPE]);
        assert_eq!(cfg.groups[0].mode_scopes(), vec![""]);
    }

    #[test]
    fn unknown_workflow_field_fails() {
        // misspelled trigger => triger should error
        let res = load_from_str(
            r#"(groups: [(name: "g", workflows: [(id: "a", triger: None)])])"#,
            None,
        );
        assert!(matches!(res, Err(Error::Parse { .. })));
    }

    #[test]
    fn unknown_command_kind_fails() {
        let res = load_from_str(
            r#"(groups: [(name: "g", workflows: [(id: "a", commands: [(kind: Teleport(to: "x"))])])])"#,
            None,
        );
        assert!(res.is_err());
    }
}
