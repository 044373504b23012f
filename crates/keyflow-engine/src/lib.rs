//! Keyflow Engine
//!
//! The keyflow engine turns a raw keyboard event stream into workflow
//! dispatches:
//! - resolves shortcuts and multi-key chords, scoped by the frontmost
//!   application and active user modes
//! - remaps keys with tap-vs-hold semantics (including the built-in Escape and
//!   Tab holds)
//! - matches typed snippets
//! - fires application launch/close/frontmost triggers
//!
//! [`Engine`] is the single owner of all of this state. Drive it from one
//! context: feed events to [`Engine::handle_event`], deliver timer fires with
//! [`Engine::on_timer`] (or use [`runtime::run`], which does both), and install
//! configurations with [`Engine::apply_config`].
use std::{
    collections::{BTreeSet, HashSet},
    sync::Arc,
    time::{Duration, Instant},
};

mod apps;
mod cache;
mod chord;
mod dispatch;
mod error;
mod remap;
pub mod runtime;
mod signature;
mod snippet;
pub mod test_support;
mod timer;

// Timing constants for warning thresholds
const EVENT_PROC_WARN_MS: u64 = 5;

use keypost::{EventKind, Poster};
use mac_keycode::Modifiers;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, trace, warn};
use workflow_config::Configuration;

pub use apps::{AppFire, ApplicationTriggerTracker};
pub use cache::{
    BUILTIN_ESCAPE_ID, BUILTIN_TAB_ID, CacheHandle, ChordPrefix, ModifierTrigger,
    ResolutionResult, ScopeKey, SnippetEntry, TriggerCacheKey, TriggerTables, WorkflowEntry,
    WorkflowRef, scope_chain,
};
pub use chord::{ChordSequenceTracker, ChordStep};
pub use dispatch::{
    CommandExecutor, CommandRunner, DispatchOrigin, DispatchRequest, Dispatcher, SpawnRunner,
};
pub use error::{Error, Result};
pub use remap::{ModifierRemapState, ModifierRemapStateMachine, RemapOutcome};
pub use signature::{EventSignature, RawEvent, normalize};
pub use snippet::{SnippetMatch, SnippetMatcher};
pub use timer::{TimerFired, TimerHandle, TimerQueue, TimerSlot};

/// What the event tap should do with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventDecision {
    /// Deliver the event unchanged.
    PassThrough,
    /// Drop the event.
    Suppress,
    /// Deliver the event with these modifier flags added.
    Decorate(Modifiers),
}

/// Engine owns every trigger state machine and routes events through them.
///
/// Construct via [`Engine::new`] (or [`Engine::with_cache`] to share tables
/// with another thread), then feed events via [`Engine::handle_event`].
pub struct Engine {
    /// Shared slot holding the current trigger tables.
    cache: CacheHandle,
    /// Tables seen by the last call; a generation change resets the chord.
    tables: Arc<TriggerTables>,
    /// Sink for synthesized events.
    poster: Arc<dyn Poster>,
    /// Hands matched workflows to the command runner.
    dispatcher: Dispatcher,
    /// Timer scheduling for every state machine.
    timers: TimerQueue,
    /// Fires from `timers`, drained by the owning context.
    timer_rx: UnboundedReceiver<TimerFired>,
    /// Chord prefix tracking.
    chord: ChordSequenceTracker,
    /// Tap/hold remapping.
    remap: ModifierRemapStateMachine,
    /// Snippet buffer.
    snippet: SnippetMatcher,
    /// Running set and frontmost application.
    apps: ApplicationTriggerTracker,
    /// Active user modes.
    user_modes: BTreeSet<String>,
    /// Lookup order for the current frontmost app and modes.
    scope_chain: Vec<ScopeKey>,
    /// Key codes whose key-down was swallowed; their key-up is swallowed too.
    suppressed: HashSet<i64>,
}

impl Engine {
    /// Create an engine with its own trigger tables.
    ///
    /// - `poster`: sink for remap output
    /// - `runner`: receives every dispatched workflow
    pub fn new(poster: Arc<dyn Poster>, runner: Arc<dyn CommandRunner>) -> Self {
        Self::with_cache(CacheHandle::new(), poster, runner)
    }

    /// Create an engine reading tables from `cache`.
    pub fn with_cache(
        cache: CacheHandle,
        poster: Arc<dyn Poster>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        let (timers, timer_rx) = TimerQueue::new();
        let tables = cache.load();
        Self {
            cache,
            tables,
            poster,
            dispatcher: Dispatcher::new(runner),
            timers,
            timer_rx,
            chord: ChordSequenceTracker::new(),
            remap: ModifierRemapStateMachine::new(),
            snippet: SnippetMatcher::new(),
            apps: ApplicationTriggerTracker::new(),
            user_modes: BTreeSet::new(),
            scope_chain: scope_chain(None, &BTreeSet::new()),
            suppressed: HashSet::new(),
        }
    }

    /// A clone of the cache handle, for rebuilding from another thread.
    pub fn cache_handle(&self) -> CacheHandle {
        self.cache.clone()
    }

    /// The tables the engine is currently reading.
    pub fn tables(&self) -> Arc<TriggerTables> {
        self.cache.load()
    }

    /// Active user modes.
    pub fn user_modes(&self) -> &BTreeSet<String> {
        &self.user_modes
    }

    /// Frontmost application, once known.
    pub fn frontmost(&self) -> Option<&str> {
        self.apps.frontmost()
    }

    /// Pending chord prefix (empty when idle).
    pub fn chord_prefix(&self) -> &ChordPrefix {
        self.chord.prefix()
    }

    /// Remapper state.
    pub fn remap_state(&self) -> &ModifierRemapState {
        self.remap.state()
    }

    /// Snippet buffer contents.
    pub fn snippet_buffer(&self) -> &str {
        self.snippet.buffer()
    }

    /// Pick up a newer generation if one was published.
    fn refresh_tables(&mut self) -> Arc<TriggerTables> {
        let current = self.cache.load();
        if current.generation() != self.tables.generation() {
            debug!(
                from = self.tables.generation(),
                to = current.generation(),
                "engine_tables_changed"
            );
            self.chord.reset();
            self.tables = current.clone();
        }
        current
    }

    /// Recompute the scope chain after a frontmost or mode change.
    fn rebuild_scope_chain(&mut self) {
        self.scope_chain = scope_chain(self.apps.frontmost(), &self.user_modes);
        self.chord.reset();
        trace!(chain = self.scope_chain.len(), "scope_chain_rebuilt");
    }

    /// Route one event through the remapper, chord and snippet stages.
    ///
    /// Never blocks and never fails: misses pass through.
    pub fn handle_event(&mut self, event: &RawEvent) -> EventDecision {
        if event.is_synthetic() {
            trace!(key_code = event.key_code, kind = ?event.kind, "event_synthetic");
            return EventDecision::PassThrough;
        }
        let start = Instant::now();
        let tables = self.refresh_tables();

        let decoration = match self.remap.on_event(
            event,
            &tables,
            &self.scope_chain,
            self.chord.prefix(),
            self.poster.as_ref(),
            &self.timers,
        ) {
            RemapOutcome::Consumed => return EventDecision::Suppress,
            RemapOutcome::Ignored => Modifiers::empty(),
            RemapOutcome::Decorate(m) => m,
        };

        let decision = match event.kind {
            EventKind::KeyDown => self.on_key_down(event, &tables, decoration),
            EventKind::KeyUp => self.on_key_up(event, &tables, decoration),
            EventKind::FlagsChanged => EventDecision::PassThrough,
        };

        let elapsed = start.elapsed();
        if elapsed > Duration::from_millis(EVENT_PROC_WARN_MS) {
            warn!(key_code = event.key_code, ?elapsed, "event_processing_slow");
        }
        match decision {
            EventDecision::PassThrough if !decoration.is_empty() => {
                EventDecision::Decorate(decoration)
            }
            d => d,
        }
    }

    /// Chord stage.
    fn on_key_down(
        &mut self,
        event: &RawEvent,
        tables: &TriggerTables,
        decoration: Modifiers,
    ) -> EventDecision {
        if event.is_repeat {
            return if self.suppressed.contains(&event.key_code) {
                EventDecision::Suppress
            } else {
                EventDecision::PassThrough
            };
        }
        let signature = normalize(event).with_modifiers(decoration);
        let step = self.chord.on_key_down(
            tables,
            &self.scope_chain,
            signature,
            &self.timers,
            tables.settings().chord_timeout(),
        );
        match step {
            ChordStep::Exact {
                workflow,
                scope,
                passthrough,
            } => {
                self.dispatcher
                    .dispatch(&workflow, DispatchOrigin::Shortcut { scope });
                if passthrough {
                    EventDecision::PassThrough
                } else {
                    self.suppressed.insert(event.key_code);
                    EventDecision::Suppress
                }
            }
            ChordStep::Partial => {
                self.suppressed.insert(event.key_code);
                EventDecision::Suppress
            }
            ChordStep::Miss { .. } => EventDecision::PassThrough,
        }
    }

    /// Key-up symmetry, then the snippet stage.
    fn on_key_up(
        &mut self,
        event: &RawEvent,
        tables: &TriggerTables,
        decoration: Modifiers,
    ) -> EventDecision {
        if self.suppressed.remove(&event.key_code) {
            return EventDecision::Suppress;
        }
        let decorated;
        let event = if decoration.is_empty() {
            event
        } else {
            decorated = RawEvent {
                flags: event.flags | decoration.bits(),
                ..event.clone()
            };
            &decorated
        };
        let settings = *tables.settings();
        let frontmost = self.apps.frontmost();
        let modes = &self.user_modes;
        let found = self.snippet.on_key_up(
            event,
            tables,
            |scope| scope.accepts(frontmost, modes),
            &self.timers,
            settings.snippet_timeout(),
            settings.snippet_buffer_cap,
        );
        if let Some(SnippetMatch { text, workflows }) = found {
            for wf in &workflows {
                self.dispatcher
                    .dispatch(wf, DispatchOrigin::Snippet { text: text.clone() });
            }
        }
        EventDecision::PassThrough
    }

    /// Install a configuration. Returns false when `version` is already the
    /// published one, in which case nothing is rebuilt.
    pub fn apply_config(&mut self, version: u64, config: &Configuration) -> bool {
        if self.cache.load().config_version() == Some(version) {
            debug!(version, "config_unchanged");
            return false;
        }
        self.cache.rebuild(version, config);
        self.refresh_tables();
        true
    }

    /// Hand every application fire to the dispatcher.
    fn dispatch_app_fires(&self, fires: Vec<AppFire>) -> usize {
        let count = fires.len();
        for fire in fires {
            self.dispatcher.dispatch(
                &fire.workflow,
                DispatchOrigin::Application {
                    bundle_identifier: fire.bundle_identifier,
                    context: fire.context,
                },
            );
        }
        count
    }

    /// Deliver a running-applications snapshot. Returns the number of
    /// workflows dispatched.
    pub fn on_running_applications<I, S>(&mut self, bundle_identifiers: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tables = self.refresh_tables();
        let fires = self
            .apps
            .on_running_applications(&tables, bundle_identifiers);
        self.dispatch_app_fires(fires)
    }

    /// Deliver a frontmost-application change. Returns the number of
    /// workflows dispatched.
    pub fn on_frontmost_changed(&mut self, bundle_identifier: &str) -> usize {
        let tables = self.refresh_tables();
        let Some(fires) = self.apps.on_frontmost_changed(&tables, bundle_identifier) else {
            return 0;
        };
        self.snippet.reset();
        self.rebuild_scope_chain();
        self.dispatch_app_fires(fires)
    }

    /// Replace the active user modes.
    pub fn set_user_modes<I, S>(&mut self, modes: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let modes: BTreeSet<String> = modes
            .into_iter()
            .map(Into::into)
            .filter(|m: &String| !m.is_empty())
            .collect();
        if modes != self.user_modes {
            debug!(?modes, "user_modes_set");
            self.user_modes = modes;
            self.rebuild_scope_chain();
        }
    }

    /// Activate one user mode.
    pub fn activate_user_mode(&mut self, mode: &str) {
        if !mode.is_empty() && self.user_modes.insert(mode.to_string()) {
            debug!(mode, "user_mode_activated");
            self.rebuild_scope_chain();
        }
    }

    /// Deactivate one user mode.
    pub fn deactivate_user_mode(&mut self, mode: &str) {
        if self.user_modes.remove(mode) {
            debug!(mode, "user_mode_deactivated");
            self.rebuild_scope_chain();
        }
    }

    /// Deliver a timer fire to its owner. Stale fires are ignored.
    pub fn on_timer(&mut self, fired: TimerFired) {
        match fired.slot {
            TimerSlot::Chord => {
                self.chord.on_timer(fired);
            }
            TimerSlot::Hold => self.remap.on_timer(fired, self.poster.as_ref()),
            TimerSlot::Snippet => {
                self.snippet.on_timer(fired);
            }
        }
    }

    /// Deliver every fire already queued. Returns how many were delivered.
    pub fn pump_timers(&mut self) -> usize {
        let mut delivered = 0;
        while let Ok(fired) = self.timer_rx.try_recv() {
            self.on_timer(fired);
            delivered += 1;
        }
        delivered
    }

    /// Wait for the next timer fire.
    pub async fn next_timer(&mut self) -> Option<TimerFired> {
        self.timer_rx.recv().await
    }

    /// Cancel every dispatched workflow that is still running.
    pub fn cancel_all(&mut self) {
        self.dispatcher.cancel_all();
    }

    /// Drop all transient state: pending chord, snippet buffer, remap state
    /// (releasing held modifiers) and suppressed key-ups.
    pub fn reset(&mut self) {
        self.chord.reset();
        self.snippet.reset();
        self.remap.reset(self.poster.as_ref());
        self.suppressed.clear();
        debug!("engine_reset");
    }
}
