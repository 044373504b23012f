//! Trigger tables: every lookup structure the hot path reads, built in one
//! sweep over a configuration and published as a single generation.
//!
//! Readers take an `Arc<TriggerTables>` from [`CacheHandle::load`] and never
//! hold a lock while looking things up. A rebuild produces a complete new
//! generation and swaps the pointer, so a reader sees either the old tables
//! or the new ones, never a mix.

use std::{
    collections::{BTreeSet, HashMap},
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use mac_keycode::{Key, Keystroke, Modifiers};
use parking_lot::RwLock;
use tracing::{debug, trace, warn};
use workflow_config::{
    AppContext, Command, Configuration, EngineSettings, ExecutionMode, GLOBAL_SCOPE, Remap,
    RemapAction, Trigger, Workflow, WorkflowGroup,
};

use crate::signature::EventSignature;

/// Rebuilds slower than this are logged at warn.
const REBUILD_WARN_MS: u64 = 10;

/// Id of the built-in Escape tap/hold trigger.
pub const BUILTIN_ESCAPE_ID: &str = "builtin.escape";
/// Id of the built-in Tab tap/hold trigger.
pub const BUILTIN_TAB_ID: &str = "builtin.tab";

/// The dispatchable part of a workflow, shared by every table entry that
/// refers to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowEntry {
    /// Workflow id from the configuration.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Name of the owning group.
    pub group: String,
    /// Commands, in configuration order.
    pub commands: Arc<[Command]>,
    /// How the runner should execute `commands`.
    pub execution: ExecutionMode,
}

impl WorkflowEntry {
    fn new(group: &WorkflowGroup, wf: &Workflow) -> Self {
        Self {
            id: wf.id.clone(),
            name: wf.name.clone(),
            group: group.name.clone(),
            commands: wf.commands.iter().cloned().collect(),
            execution: wf.execution,
        }
    }
}

/// Shared pointer to a workflow; cloning it never copies the workflow.
pub type WorkflowRef = Arc<WorkflowEntry>;

/// Where an entry applies: an application and a user mode.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeKey {
    /// Bundle identifier, or `"*"` for every application.
    pub bundle_identifier: String,
    /// User mode, or empty for "no mode required".
    pub user_mode: String,
}

impl ScopeKey {
    /// Scope for `bundle_identifier` under `user_mode`.
    pub fn new(bundle_identifier: impl Into<String>, user_mode: impl Into<String>) -> Self {
        Self {
            bundle_identifier: bundle_identifier.into(),
            user_mode: user_mode.into(),
        }
    }

    /// The `("*", "")` scope.
    pub fn global() -> Self {
        Self::new(GLOBAL_SCOPE, "")
    }

    /// True when this scope is active for the given context.
    pub fn accepts(&self, frontmost: Option<&str>, modes: &BTreeSet<String>) -> bool {
        let app_ok = self.bundle_identifier == GLOBAL_SCOPE
            || frontmost == Some(self.bundle_identifier.as_str());
        let mode_ok = self.user_mode.is_empty() || modes.contains(&self.user_mode);
        app_ok && mode_ok
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bundle_identifier, self.user_mode)
    }
}

/// Scopes to try for a context, most specific first.
///
/// Order: (app, each mode) > (app, "") > ("*", each mode) > ("*", ""). Modes
/// are visited in sorted order.
pub fn scope_chain(frontmost: Option<&str>, modes: &BTreeSet<String>) -> Vec<ScopeKey> {
    let mut chain = Vec::with_capacity((modes.len() + 1) * 2);
    let bundles = frontmost
        .filter(|b| !b.is_empty() && *b != GLOBAL_SCOPE)
        .into_iter()
        .chain([GLOBAL_SCOPE]);
    for bundle in bundles {
        for mode in modes {
            chain.push(ScopeKey::new(bundle, mode.as_str()));
        }
        chain.push(ScopeKey::new(bundle, ""));
    }
    chain
}

/// Keystrokes already consumed by a pending chord, encoded as text.
///
/// Each signature is written as `code:mask` and joined with `,`; both parts
/// are numeric so distinct chains always encode differently.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChordPrefix {
    encoded: String,
    len: usize,
}

impl ChordPrefix {
    /// The empty prefix.
    pub fn empty() -> Self {
        Self::default()
    }

    /// True when no keystroke has been consumed.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of keystrokes in the prefix.
    pub fn len(&self) -> usize {
        self.len
    }

    /// This prefix followed by `sig`.
    pub fn push(&self, sig: EventSignature) -> Self {
        let encoded = if self.is_empty() {
            sig.to_string()
        } else {
            format!("{},{}", self.encoded, sig)
        };
        Self {
            encoded,
            len: self.len + 1,
        }
    }

    /// Encoded form.
    pub fn as_str(&self) -> &str {
        &self.encoded
    }
}

impl fmt::Display for ChordPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encoded)
    }
}

/// Identity of one shortcut table entry: scope, then chord prefix, then
/// signature. The table itself is nested in that order so lookups borrow.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TriggerCacheKey {
    /// Scope the entry was registered under.
    pub scope: ScopeKey,
    /// Keystrokes that must already be pending.
    pub prefix: ChordPrefix,
    /// This keystroke.
    pub signature: EventSignature,
}

/// What a keystroke means in a given scope and prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionResult {
    /// The keystroke continues a longer chord; the new prefix is attached.
    Partial(ChordPrefix),
    /// The keystroke completes a chord.
    Exact {
        /// Workflow to dispatch.
        workflow: WorkflowRef,
        /// Let the final keystroke through to the application.
        passthrough: bool,
    },
}

impl ResolutionResult {
    fn is_exact(&self) -> bool {
        matches!(self, Self::Exact { .. })
    }
}

/// A tap/hold remap of one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModifierTrigger {
    /// Workflow id (or built-in id).
    pub id: String,
    /// The keystroke being remapped (key plus exact modifiers).
    pub base: EventSignature,
    /// Output when the key is tapped.
    pub alone: Remap,
    /// Output when the key is held past `timeout`.
    pub held: Option<Remap>,
    /// Hold threshold.
    pub timeout: Duration,
}

impl ModifierTrigger {
    /// The base key, when its code is known.
    pub fn base_key(&self) -> Option<Key> {
        u16::try_from(self.base.key_code)
            .ok()
            .and_then(Key::from_scancode)
    }
}

/// A snippet registration: one workflow in one scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnippetEntry {
    /// Workflow to dispatch.
    pub workflow: WorkflowRef,
    /// Scope the owning group applies to.
    pub scope: ScopeKey,
}

/// Shortcut entries of one scope: prefix, then signature.
type ScopeShortcuts = HashMap<ChordPrefix, HashMap<EventSignature, ResolutionResult>>;

/// One immutable generation of every trigger table.
#[derive(Debug)]
pub struct TriggerTables {
    generation: u64,
    config_version: Option<u64>,
    settings: EngineSettings,
    shortcuts: HashMap<ScopeKey, ScopeShortcuts>,
    shortcut_count: usize,
    modifiers: HashMap<ScopeKey, HashMap<EventSignature, Arc<ModifierTrigger>>>,
    snippets: HashMap<String, Vec<SnippetEntry>>,
    snippet_lengths: BTreeSet<usize>,
    apps: HashMap<(String, AppContext), Vec<WorkflowRef>>,
}

impl TriggerTables {
    /// Tables holding only the built-in modifier triggers.
    pub fn empty(settings: EngineSettings) -> Self {
        let mut tables = Self {
            generation: 0,
            config_version: None,
            settings,
            shortcuts: HashMap::new(),
            shortcut_count: 0,
            modifiers: HashMap::new(),
            snippets: HashMap::new(),
            snippet_lengths: BTreeSet::new(),
            apps: HashMap::new(),
        };
        tables.insert_builtins();
        tables
    }

    /// Build every table from `config`. Never fails: unusable definitions are
    /// logged and skipped, and later duplicates replace earlier ones.
    pub fn build(generation: u64, config_version: u64, config: &Configuration) -> Self {
        let start = Instant::now();
        let mut tables = Self::empty(config.settings);
        tables.generation = generation;
        tables.config_version = Some(config_version);

        for group in &config.groups {
            if !group.is_enabled {
                trace!(group = %group.name, "group_disabled");
                continue;
            }
            let scopes: Vec<ScopeKey> = group
                .bundle_scopes()
                .into_iter()
                .flat_map(|b| {
                    group
                        .mode_scopes()
                        .into_iter()
                        .map(move |m| ScopeKey::new(b, m))
                })
                .collect();
            for wf in &group.workflows {
                if !wf.is_enabled {
                    trace!(workflow = %wf.id, "workflow_disabled");
                    continue;
                }
                let Some(trigger) = &wf.trigger else {
                    continue;
                };
                let entry: WorkflowRef = Arc::new(WorkflowEntry::new(group, wf));
                if let Err(reason) = tables.insert_trigger(&scopes, trigger, entry) {
                    warn!(group = %group.name, workflow = %wf.id, %reason, "trigger_skipped");
                }
            }
        }

        let elapsed = start.elapsed();
        if elapsed > Duration::from_millis(REBUILD_WARN_MS) {
            warn!(generation, ?elapsed, "trigger_rebuild_slow");
        }
        debug!(
            generation,
            config_version,
            shortcuts = tables.shortcut_count,
            modifiers = tables.modifiers.values().map(HashMap::len).sum::<usize>(),
            snippets = tables.snippets.len(),
            app_triggers = tables.apps.len(),
            ?elapsed,
            "trigger_tables_built"
        );
        tables
    }

    fn insert_builtins(&mut self) {
        let timeout = Duration::from_millis(self.settings.builtin_hold_timeout_ms);
        let builtins = [
            (BUILTIN_ESCAPE_ID, Key::Escape, Modifiers::CONTROL),
            (BUILTIN_TAB_ID, Key::Tab, Modifiers::FUNCTION),
        ];
        let global = self.modifiers.entry(ScopeKey::global()).or_default();
        for (id, key, held) in builtins {
            let base = EventSignature::from_keystroke(&Keystroke::bare(key));
            global.insert(
                base,
                Arc::new(ModifierTrigger {
                    id: id.to_string(),
                    base,
                    alone: Remap::Key(Keystroke::bare(key)),
                    held: Some(Remap::Modifiers(held)),
                    timeout,
                }),
            );
        }
    }

    fn insert_trigger(
        &mut self,
        scopes: &[ScopeKey],
        trigger: &Trigger,
        entry: WorkflowRef,
    ) -> Result<(), String> {
        match trigger {
            Trigger::KeyboardShortcuts { passthrough, .. } => {
                let keys = trigger
                    .shortcut_keys()
                    .unwrap_or_else(|| Err("not a keyboard trigger".to_string()))?;
                let sigs: Vec<EventSignature> =
                    keys.iter().map(EventSignature::from_keystroke).collect();
                for scope in scopes {
                    self.insert_chord(scope, &sigs, &entry, *passthrough);
                }
            }
            Trigger::Modifier {
                key,
                alone,
                held,
                timeout_ms,
            } => {
                let trigger = Arc::new(modifier_trigger(
                    &entry.id,
                    key,
                    alone,
                    held.as_ref(),
                    *timeout_ms,
                )?);
                for scope in scopes {
                    self.modifiers
                        .entry(scope.clone())
                        .or_default()
                        .insert(trigger.base, trigger.clone());
                }
            }
            Trigger::Snippet { text } => {
                if text.is_empty() {
                    return Err("empty snippet text".to_string());
                }
                self.snippet_lengths.insert(text.chars().count());
                let list = self.snippets.entry(text.clone()).or_default();
                for scope in scopes {
                    list.push(SnippetEntry {
                        workflow: entry.clone(),
                        scope: scope.clone(),
                    });
                }
            }
            Trigger::Application(apps) => {
                if apps.is_empty() {
                    return Err("application trigger has no entries".to_string());
                }
                for app in apps {
                    if app.bundle_identifier.is_empty() {
                        warn!(workflow = %entry.id, "app_trigger_empty_bundle");
                        continue;
                    }
                    let contexts: BTreeSet<AppContext> = app.contexts.iter().copied().collect();
                    for ctx in contexts {
                        self.apps
                            .entry((app.bundle_identifier.clone(), ctx))
                            .or_default()
                            .push(entry.clone());
                    }
                }
            }
        }
        Ok(())
    }

    fn insert_chord(
        &mut self,
        scope: &ScopeKey,
        sigs: &[EventSignature],
        entry: &WorkflowRef,
        passthrough: bool,
    ) {
        let mut prefix = ChordPrefix::empty();
        for (i, sig) in sigs.iter().enumerate() {
            let next = prefix.push(*sig);
            let result = if i + 1 == sigs.len() {
                ResolutionResult::Exact {
                    workflow: entry.clone(),
                    passthrough,
                }
            } else {
                ResolutionResult::Partial(next.clone())
            };
            let exact = result.is_exact();
            let old = self
                .shortcuts
                .entry(scope.clone())
                .or_default()
                .entry(prefix)
                .or_default()
                .insert(*sig, result);
            match old {
                None => self.shortcut_count += 1,
                Some(old) if old.is_exact() || exact => {
                    warn!(workflow = %entry.id, %scope, signature = %sig, "shortcut_replaced");
                }
                Some(_) => {}
            }
            prefix = next;
        }
    }

    /// Generation number assigned by the publishing [`CacheHandle`].
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Configuration version these tables were built from (`None` before the
    /// first configuration).
    pub fn config_version(&self) -> Option<u64> {
        self.config_version
    }

    /// Settings carried by the configuration.
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Number of shortcut table entries.
    pub fn shortcut_count(&self) -> usize {
        self.shortcut_count
    }

    /// Every shortcut entry with its key, in no particular order.
    pub fn shortcut_entries(&self) -> impl Iterator<Item = (TriggerCacheKey, &ResolutionResult)> {
        self.shortcuts.iter().flat_map(|(scope, prefixes)| {
            prefixes.iter().flat_map(move |(prefix, sigs)| {
                sigs.iter().map(move |(signature, result)| {
                    let key = TriggerCacheKey {
                        scope: scope.clone(),
                        prefix: prefix.clone(),
                        signature: *signature,
                    };
                    (key, result)
                })
            })
        })
    }

    /// Exact lookup in one scope. Borrows every key part; nothing is allocated.
    pub fn lookup(
        &self,
        scope: &ScopeKey,
        prefix: &ChordPrefix,
        signature: EventSignature,
    ) -> Option<&ResolutionResult> {
        self.shortcuts.get(scope)?.get(prefix)?.get(&signature)
    }

    /// First match along `chain`, with the scope it was found in.
    pub fn resolve<'a>(
        &'a self,
        chain: &'a [ScopeKey],
        prefix: &ChordPrefix,
        signature: EventSignature,
    ) -> Option<(&'a ScopeKey, &'a ResolutionResult)> {
        if self.shortcuts.is_empty() {
            return None;
        }
        chain
            .iter()
            .find_map(|scope| self.lookup(scope, prefix, signature).map(|r| (scope, r)))
    }

    /// Modifier trigger registered for exactly `signature`, most specific
    /// scope first.
    pub fn modifier_trigger(
        &self,
        chain: &[ScopeKey],
        signature: EventSignature,
    ) -> Option<&Arc<ModifierTrigger>> {
        chain
            .iter()
            .find_map(|scope| self.modifiers.get(scope)?.get(&signature))
    }

    /// Modifier trigger that should claim `signature` while `prefix` is
    /// pending. Walking the chain from the most specific scope, a shortcut
    /// entry for the same keystroke in a scope at least as specific wins, and
    /// the keystroke is left to the chord stage.
    pub fn remap_trigger(
        &self,
        chain: &[ScopeKey],
        prefix: &ChordPrefix,
        signature: EventSignature,
    ) -> Option<&Arc<ModifierTrigger>> {
        for scope in chain {
            if self.lookup(scope, prefix, signature).is_some() {
                return None;
            }
            if let Some(t) = self.modifiers.get(scope).and_then(|m| m.get(&signature)) {
                return Some(t);
            }
        }
        None
    }

    /// Snippet registrations for exactly `text`.
    pub fn snippet(&self, text: &str) -> &[SnippetEntry] {
        self.snippets.get(text).map(Vec::as_slice).unwrap_or(&[])
    }

    /// True when at least one snippet is registered.
    pub fn has_snippets(&self) -> bool {
        !self.snippets.is_empty()
    }

    /// Length in characters of the longest registered snippet.
    pub fn longest_snippet(&self) -> usize {
        self.snippet_lengths.last().copied().unwrap_or(0)
    }

    /// Workflows listening for `context` on `bundle_identifier`.
    pub fn app_workflows(&self, bundle_identifier: &str, context: AppContext) -> &[WorkflowRef] {
        self.apps
            .get(&(bundle_identifier.to_string(), context))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

fn modifier_trigger(
    id: &str,
    key: &str,
    alone: &RemapAction,
    held: Option<&RemapAction>,
    timeout_ms: u64,
) -> Result<ModifierTrigger, String> {
    let stroke =
        Keystroke::parse(key.trim()).ok_or_else(|| format!("invalid modifier key {:?}", key))?;
    Ok(ModifierTrigger {
        id: id.to_string(),
        base: EventSignature::from_keystroke(&stroke),
        alone: alone.resolve()?,
        held: held.map(RemapAction::resolve).transpose()?,
        timeout: Duration::from_millis(timeout_ms),
    })
}

/// Shared, swappable pointer to the current [`TriggerTables`].
///
/// Cloning the handle shares the same slot, so a rebuild on one thread is
/// visible to every engine reading through a clone.
#[derive(Clone)]
pub struct CacheHandle {
    current: Arc<RwLock<Arc<TriggerTables>>>,
    generations: Arc<AtomicU64>,
}

impl Default for CacheHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheHandle {
    /// A handle holding the built-in triggers with default settings.
    pub fn new() -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(TriggerTables::empty(
                EngineSettings::default(),
            )))),
            generations: Arc::new(AtomicU64::new(0)),
        }
    }

    /// The current generation. The lock is held only for the pointer clone.
    pub fn load(&self) -> Arc<TriggerTables> {
        self.current.read().clone()
    }

    /// Build a new generation from `config` and publish it.
    pub fn rebuild(&self, config_version: u64, config: &Configuration) -> Arc<TriggerTables> {
        let generation = self.generations.fetch_add(1, Ordering::SeqCst) + 1;
        let tables = Arc::new(TriggerTables::build(generation, config_version, config));
        self.publish(tables.clone());
        tables
    }

    /// Swap in `tables` unless a newer generation is already published.
    pub fn publish(&self, tables: Arc<TriggerTables>) {
        let mut current = self.current.write();
        if tables.generation > current.generation {
            *current = tables;
        } else {
            debug!(
                stale = tables.generation,
                current = current.generation,
                "trigger_tables_stale_publish"
            );
        }
    }
}
