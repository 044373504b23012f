use std::{
    collections::BTreeSet,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use keyflow_engine::{
    CacheHandle, ChordPrefix, DispatchOrigin, Engine, EventDecision, EventSignature, RawEvent,
    ResolutionResult, ScopeKey, scope_chain,
    test_support::{
        RecordingRunner, app_trigger, config, group, modifier, scoped_group, shortcut, snippet,
    },
};
use keypost::{EventKind, NullPoster, RecordingPoster};
use mac_keycode::{Key, Keystroke, Modifiers};
use proptest::prelude::*;
use workflow_config::{AppContext, Configuration, RemapAction};

fn engine_with(cfg: &Configuration) -> (Engine, Arc<RecordingRunner>) {
    let runner = Arc::new(RecordingRunner::new());
    let mut engine = Engine::new(Arc::new(NullPoster), runner.clone());
    engine.apply_config(1, cfg);
    (engine, runner)
}

fn tap(engine: &mut Engine, key: Key, mods: Modifiers) -> (EventDecision, EventDecision) {
    let d = engine.handle_event(&RawEvent::key_down(key, mods));
    let u = engine.handle_event(&RawEvent::key_up(key, mods));
    (d, u)
}

fn type_text(engine: &mut Engine, text: &str) {
    for c in text.chars() {
        let key = Key::ALL
            .iter()
            .copied()
            .find(|k| k.to_char(false) == Some(c))
            .unwrap();
        tap(engine, key, Modifiers::empty());
    }
}

fn mixed_config() -> Configuration {
    config(vec![
        group(
            "g",
            vec![
                shortcut("kj", &["cmd+k", "j"]),
                shortcut("kk", &["cmd+k", "cmd+k"]),
                shortcut("s", &["cmd+s"]),
                snippet("brb", "brb"),
            ],
        ),
        scoped_group("nav", &[], &["nav"], vec![shortcut("h", &["h"])]),
    ])
}

const KEYS: &[Key] = &[Key::K, Key::J, Key::S, Key::H, Key::B, Key::R, Key::X];

fn arb_event() -> impl Strategy<Value = RawEvent> {
    (
        prop::sample::select(KEYS),
        prop::bool::ANY,
        prop::bool::ANY,
        prop::bool::ANY,
    )
        .prop_map(|(key, cmd, is_down, repeat)| {
            let mods = if cmd {
                Modifiers::COMMAND
            } else {
                Modifiers::empty()
            };
            if is_down {
                let ev = RawEvent::key_down(key, mods);
                if repeat { ev.repeat() } else { ev }
            } else {
                RawEvent::key_up(key, mods)
            }
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// The same configuration and event stream always produce the same
    /// decisions and dispatches.
    #[test]
    fn same_inputs_same_outputs(events in prop::collection::vec(arb_event(), 0..60), nav in prop::bool::ANY) {
        let cfg = mixed_config();
        let (mut a, ra) = engine_with(&cfg);
        let (mut b, rb) = engine_with(&cfg);
        if nav {
            a.activate_user_mode("nav");
            b.activate_user_mode("nav");
        }
        let da: Vec<EventDecision> = events.iter().map(|e| a.handle_event(e)).collect();
        let db: Vec<EventDecision> = events.iter().map(|e| b.handle_event(e)).collect();
        prop_assert_eq!(da, db);
        prop_assert_eq!(ra.ids(), rb.ids());
    }
}

#[tokio::test(start_paused = true)]
async fn chord_completes_within_timeout_and_resets_after() {
    let (mut e, runner) = engine_with(&mixed_config());

    assert_eq!(
        tap(&mut e, Key::K, Modifiers::COMMAND),
        (EventDecision::Suppress, EventDecision::Suppress)
    );
    tokio::time::sleep(Duration::from_millis(500)).await;
    e.pump_timers();
    assert_eq!(
        tap(&mut e, Key::J, Modifiers::empty()),
        (EventDecision::Suppress, EventDecision::Suppress)
    );
    assert_eq!(runner.ids(), vec!["kj"]);

    tap(&mut e, Key::K, Modifiers::COMMAND);
    tokio::time::sleep(Duration::from_millis(1001)).await;
    assert_eq!(e.pump_timers(), 1);
    assert!(e.chord_prefix().is_empty());
    assert_eq!(
        tap(&mut e, Key::J, Modifiers::empty()),
        (EventDecision::PassThrough, EventDecision::PassThrough)
    );
    assert!(runner.ids().is_empty());
}

#[tokio::test(start_paused = true)]
async fn wrong_continuation_passes_and_is_not_retried() {
    let cfg = config(vec![group(
        "g",
        vec![shortcut("kj", &["cmd+k", "j"]), shortcut("x", &["x"])],
    )]);
    let (mut e, runner) = engine_with(&cfg);
    tap(&mut e, Key::K, Modifiers::COMMAND);
    // "x" alone is bound, but it arrived as a failed continuation.
    assert_eq!(
        e.handle_event(&RawEvent::key_down(Key::X, Modifiers::empty())),
        EventDecision::PassThrough
    );
    assert!(runner.ids().is_empty());
    assert_eq!(
        e.handle_event(&RawEvent::key_down(Key::X, Modifiers::empty())),
        EventDecision::Suppress
    );
    assert_eq!(runner.ids(), vec!["x"]);
}

#[tokio::test(start_paused = true)]
async fn three_key_chord_resolves_step_by_step() {
    let cfg = config(vec![group("g", vec![shortcut("abc", &["cmd+a", "b", "c"])])]);
    let (mut e, runner) = engine_with(&cfg);
    let sig = |spec: &str| EventSignature::from_keystroke(&Keystroke::parse(spec).unwrap());
    let tables = e.tables();
    let global = [ScopeKey::global()];

    let first = match tables.resolve(&global, &ChordPrefix::empty(), sig("cmd+a")) {
        Some((_, ResolutionResult::Partial(p))) => p.clone(),
        other => panic!("expected partial, got {other:?}"),
    };
    let second = match tables.resolve(&global, &first, sig("b")) {
        Some((_, ResolutionResult::Partial(p))) => p.clone(),
        other => panic!("expected partial, got {other:?}"),
    };
    assert_eq!(second.len(), 2);
    assert!(matches!(
        tables.resolve(&global, &second, sig("c")),
        Some((_, ResolutionResult::Exact { workflow, .. })) if workflow.id == "abc"
    ));
    assert!(tables.resolve(&global, &ChordPrefix::empty(), sig("b")).is_none());

    let suppressed = (EventDecision::Suppress, EventDecision::Suppress);
    assert_eq!(tap(&mut e, Key::A, Modifiers::COMMAND), suppressed);
    assert_eq!(e.chord_prefix().len(), 1);
    assert_eq!(tap(&mut e, Key::B, Modifiers::empty()), suppressed);
    assert_eq!(e.chord_prefix().len(), 2);
    assert!(runner.ids().is_empty());
    assert_eq!(tap(&mut e, Key::C, Modifiers::empty()), suppressed);
    assert_eq!(runner.ids(), vec!["abc"]);
    assert!(e.chord_prefix().is_empty());

    // A timeout after the first step drops the prefix; "b" alone is unbound.
    tap(&mut e, Key::A, Modifiers::COMMAND);
    tokio::time::sleep(Duration::from_millis(1001)).await;
    assert_eq!(e.pump_timers(), 1);
    assert_eq!(
        tap(&mut e, Key::B, Modifiers::empty()),
        (EventDecision::PassThrough, EventDecision::PassThrough)
    );
    assert!(runner.ids().is_empty());
}

#[test]
fn application_scope_beats_global() {
    let cfg = config(vec![
        group("global", vec![shortcut("global-n", &["cmd+shift+n"])]),
        scoped_group(
            "finder",
            &["com.apple.finder"],
            &[],
            vec![shortcut("finder-n", &["cmd+shift+n"])],
        ),
    ]);
    let (mut e, runner) = engine_with(&cfg);
    let mods = Modifiers::COMMAND | Modifiers::SHIFT;

    e.on_frontmost_changed("com.apple.finder");
    tap(&mut e, Key::N, mods);
    e.on_frontmost_changed("com.apple.Safari");
    tap(&mut e, Key::N, mods);
    let reqs = runner.take();
    let got: Vec<(String, String)> = reqs
        .iter()
        .map(|r| match &r.origin {
            DispatchOrigin::Shortcut { scope } => (r.workflow.id.clone(), scope.to_string()),
            other => panic!("unexpected origin {other:?}"),
        })
        .collect();
    assert_eq!(
        got,
        vec![
            ("finder-n".to_string(), "com.apple.finder/".to_string()),
            ("global-n".to_string(), "*/".to_string()),
        ]
    );
}

fn remap_engine(poster: Arc<RecordingPoster>) -> Engine {
    let cfg = config(vec![group(
        "g",
        vec![modifier(
            "caps",
            "f18",
            RemapAction::Key("esc".into()),
            Some(RemapAction::Modifiers(vec!["ctrl".into()])),
            100,
        )],
    )]);
    let mut e = Engine::new(poster, Arc::new(RecordingRunner::new()));
    e.apply_config(1, &cfg);
    e
}

#[tokio::test(start_paused = true)]
async fn release_before_threshold_is_a_tap() {
    let poster = Arc::new(RecordingPoster::new());
    let mut e = remap_engine(poster.clone());
    assert_eq!(
        e.handle_event(&RawEvent::key_down(Key::F18, Modifiers::empty())),
        EventDecision::Suppress
    );
    tokio::time::sleep(Duration::from_millis(99)).await;
    assert_eq!(e.pump_timers(), 0);
    assert_eq!(
        e.handle_event(&RawEvent::key_up(Key::F18, Modifiers::empty())),
        EventDecision::Suppress
    );
    let esc = Key::Escape.scancode();
    let posted: Vec<_> = poster.take().iter().map(|p| (p.key_code, p.kind)).collect();
    assert_eq!(posted, vec![(esc, EventKind::KeyDown), (esc, EventKind::KeyUp)]);

    // The cancelled timer never resurfaces.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(e.pump_timers(), 0);
    assert!(poster.take().is_empty());
}

#[tokio::test(start_paused = true)]
async fn holding_past_threshold_is_a_hold() {
    let poster = Arc::new(RecordingPoster::new());
    let mut e = remap_engine(poster.clone());
    e.handle_event(&RawEvent::key_down(Key::F18, Modifiers::empty()));
    tokio::time::sleep(Duration::from_millis(101)).await;
    assert_eq!(e.pump_timers(), 1);
    let posted = poster.take();
    assert_eq!(posted.len(), 1);
    assert_eq!(posted[0].key_code, Key::Control.scancode());
    assert_eq!(posted[0].flags, Modifiers::CONTROL);

    assert_eq!(
        e.handle_event(&RawEvent::key_down(Key::C, Modifiers::empty())),
        EventDecision::Decorate(Modifiers::CONTROL)
    );
    e.handle_event(&RawEvent::key_up(Key::F18, Modifiers::empty()));
    let posted = poster.take();
    assert_eq!(posted.len(), 1);
    assert_eq!(posted[0].flags, Modifiers::empty());
}

#[test]
fn running_set_diff() {
    let (a, b, c) = ("com.example.a", "com.example.b", "com.example.c");
    let all = [
        AppContext::Launched,
        AppContext::Closed,
        AppContext::FrontMost,
        AppContext::ResignFrontMost,
    ];
    let cfg = config(vec![group(
        "apps",
        vec![
            app_trigger("a", a, &all),
            app_trigger("b", b, &all),
            app_trigger("c", c, &all),
        ],
    )]);
    let (mut e, runner) = engine_with(&cfg);
    assert_eq!(e.on_running_applications([a, b]), 0);
    assert_eq!(e.on_running_applications([b, c]), 2);
    let got: Vec<(String, AppContext)> = runner
        .take()
        .iter()
        .map(|r| match &r.origin {
            DispatchOrigin::Application { context, .. } => (r.workflow.id.clone(), *context),
            other => panic!("unexpected origin {other:?}"),
        })
        .collect();
    assert_eq!(
        got,
        vec![("a".to_string(), AppContext::Closed), ("c".to_string(), AppContext::Launched)]
    );
    assert_eq!(e.on_running_applications([c, b]), 0);
}

#[tokio::test(start_paused = true)]
async fn snippet_fires_once_on_exact_text() {
    let cfg = config(vec![group("g", vec![snippet("brb", "brb")])]);
    let (mut e, runner) = engine_with(&cfg);
    type_text(&mut e, "brb");
    assert_eq!(runner.ids(), vec!["brb"]);
    type_text(&mut e, "x");
    assert!(runner.ids().is_empty());
    assert_eq!(e.snippet_buffer(), "x");

    // A pause longer than the idle timeout breaks the word.
    type_text(&mut e, "br");
    tokio::time::sleep(Duration::from_millis(1001)).await;
    e.pump_timers();
    type_text(&mut e, "b");
    assert!(runner.ids().is_empty());
}

/// Build a config whose every shortcut points at a workflow tagged `tag`.
fn tagged_config(tag: &str) -> Configuration {
    let workflows = ["a", "b", "c", "d", "e", "f", "g", "h"]
        .iter()
        .map(|k| shortcut(&format!("{tag}-{k}"), &[&format!("cmd+{k}")]))
        .collect();
    config(vec![group(tag, workflows)])
}

#[test]
fn readers_never_see_mixed_generations() {
    let handle = CacheHandle::new();
    let configs = [tagged_config("even"), tagged_config("odd")];
    handle.rebuild(0, &configs[0]);
    let stop = Arc::new(AtomicBool::new(false));
    let chain = scope_chain(None, &BTreeSet::new());
    let sigs: Vec<EventSignature> = ["a", "b", "c", "d", "e", "f", "g", "h"]
        .iter()
        .map(|k| EventSignature::from_keystroke(&Keystroke::parse(&format!("cmd+{k}")).unwrap()))
        .collect();

    thread::scope(|s| {
        for _ in 0..4 {
            let handle = handle.clone();
            let stop = stop.clone();
            let chain = &chain;
            let sigs = &sigs;
            s.spawn(move || {
                let mut checks = 0u32;
                while !stop.load(Ordering::Relaxed) || checks == 0 {
                    let tables = handle.load();
                    let version = tables.config_version().unwrap();
                    let want = if version % 2 == 0 { "even-" } else { "odd-" };
                    for sig in sigs {
                        match tables.resolve(chain, &ChordPrefix::empty(), *sig) {
                            Some((_, ResolutionResult::Exact { workflow, .. })) => {
                                assert!(workflow.id.starts_with(want), "{} in v{version}", workflow.id);
                            }
                            other => panic!("missing entry: {other:?}"),
                        }
                    }
                    checks += 1;
                }
            });
        }
        let writer = handle.clone();
        s.spawn(move || {
            for version in 1..200u64 {
                writer.rebuild(version, &configs[(version % 2) as usize]);
            }
            stop.store(true, Ordering::Relaxed);
        });
    });

    assert_eq!(handle.load().config_version(), Some(199));
    assert!(
        handle
            .load()
            .lookup(&ScopeKey::global(), &ChordPrefix::empty(), sigs[0])
            .is_some()
    );
}
