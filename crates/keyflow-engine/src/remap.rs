//! Tap-vs-hold remapping of single keys.
//!
//! A key with a [`ModifierTrigger`] is swallowed on press. Releasing it before
//! the hold threshold synthesizes the "alone" output; holding it past the
//! threshold (or pressing another key meanwhile) synthesizes the "held"
//! output and decorates other keys with the held modifiers until release.
//!
//! A trigger claims a press only when the normalized keystroke (key plus
//! modifiers) equals its base, so `shift+tab` is untouched by a `tab` remap.
//! A shortcut registered for the same keystroke in a scope at least as
//! specific takes the press instead.
//!
//! At most one trigger is active at a time and at most one hold timer is
//! pending. Every exit from `Armed` cancels that timer.

use std::{mem, sync::Arc};

use keypost::{EventKind, Poster, post_keystroke, post_modifiers};
use mac_keycode::{Key, Modifier, Modifiers};
use tracing::{debug, trace, warn};
use workflow_config::Remap;

use crate::{
    cache::{ChordPrefix, ModifierTrigger, ScopeKey, TriggerTables},
    signature::{EventSignature, RawEvent, normalize},
    timer::{TimerFired, TimerHandle, TimerQueue, TimerSlot},
};

/// Remapper state.
#[derive(Debug, Default)]
pub enum ModifierRemapState {
    /// No trigger key is down.
    #[default]
    Idle,
    /// Trigger key is down; waiting for release or the hold threshold.
    Armed {
        /// Active trigger.
        trigger: Arc<ModifierTrigger>,
        /// Hold timer (absent when the trigger has no held output).
        timer: Option<TimerHandle>,
    },
    /// Trigger key is held; its held output is in effect.
    Held {
        /// Active trigger.
        trigger: Arc<ModifierTrigger>,
        /// Modifiers pressed on the trigger's behalf.
        active: Modifiers,
    },
}

/// What the remapper did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemapOutcome {
    /// Not ours; later stages see it unchanged.
    Ignored,
    /// Swallow the event.
    Consumed,
    /// Let the event through with these flags added.
    Decorate(Modifiers),
}

/// Direction of a base key transition, derived from the event kind.
fn press_direction(event: &RawEvent, key: Option<Key>) -> Option<bool> {
    match event.kind {
        EventKind::KeyDown => Some(true),
        EventKind::KeyUp => Some(false),
        // Modifier keys only report flag changes; the flag says which way.
        EventKind::FlagsChanged => {
            let m = Modifier::try_from(key?).ok()?;
            Some(event.modifiers().contains(Modifiers::from(m)))
        }
    }
}

/// Signature a press is matched against. A modifier key's own flag is
/// dropped so pressing `ctrl` matches a trigger on bare `ctrl`.
fn press_signature(event: &RawEvent) -> EventSignature {
    let mut sig = normalize(event);
    if let Some(m) = event.key().and_then(|k| Modifier::try_from(k).ok()) {
        sig.modifiers.remove(Modifiers::from(m));
    }
    sig
}

/// The tap/hold state machine.
#[derive(Debug, Default)]
pub struct ModifierRemapStateMachine {
    state: ModifierRemapState,
}

impl ModifierRemapStateMachine {
    /// Idle remapper.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    pub fn state(&self) -> &ModifierRemapState {
        &self.state
    }

    /// Offer a user event to the remapper. `prefix` is the pending chord,
    /// used to let shortcuts shadow remaps of the same keystroke.
    pub fn on_event(
        &mut self,
        event: &RawEvent,
        tables: &TriggerTables,
        chain: &[ScopeKey],
        prefix: &ChordPrefix,
        poster: &dyn Poster,
        timers: &TimerQueue,
    ) -> RemapOutcome {
        match &self.state {
            ModifierRemapState::Idle => self.on_idle(event, tables, chain, prefix, timers),
            ModifierRemapState::Armed { trigger, .. } => {
                let trigger = trigger.clone();
                self.on_armed(event, trigger, poster)
            }
            ModifierRemapState::Held { trigger, active } => {
                let (trigger, active) = (trigger.clone(), *active);
                self.on_held(event, &trigger, active, poster)
            }
        }
    }

    fn on_idle(
        &mut self,
        event: &RawEvent,
        tables: &TriggerTables,
        chain: &[ScopeKey],
        prefix: &ChordPrefix,
        timers: &TimerQueue,
    ) -> RemapOutcome {
        if event.is_repeat || press_direction(event, event.key()) != Some(true) {
            return RemapOutcome::Ignored;
        }
        let Some(trigger) = tables.remap_trigger(chain, prefix, press_signature(event)) else {
            return RemapOutcome::Ignored;
        };
        let timer = trigger
            .held
            .is_some()
            .then(|| timers.schedule(TimerSlot::Hold, trigger.timeout));
        trace!(trigger = %trigger.id, timeout_ms = trigger.timeout.as_millis(), "remap_armed");
        self.state = ModifierRemapState::Armed {
            trigger: trigger.clone(),
            timer,
        };
        RemapOutcome::Consumed
    }

    fn on_armed(
        &mut self,
        event: &RawEvent,
        trigger: Arc<ModifierTrigger>,
        poster: &dyn Poster,
    ) -> RemapOutcome {
        if event.key_code == trigger.base.key_code {
            if press_direction(event, trigger.base_key()) == Some(false) {
                self.disarm();
                debug!(trigger = %trigger.id, "remap_alone");
                synthesize(poster, &trigger.alone, &trigger.id);
                self.state = ModifierRemapState::Idle;
            }
            // Presses and autorepeats of the base key while armed are swallowed.
            return RemapOutcome::Consumed;
        }
        if event.kind != EventKind::KeyDown || trigger.held.is_none() {
            return RemapOutcome::Ignored;
        }
        // Another key while armed: the user is holding the trigger.
        self.disarm();
        let active = self.enter_held(trigger, poster);
        if active.is_empty() {
            RemapOutcome::Ignored
        } else {
            RemapOutcome::Decorate(active)
        }
    }

    fn on_held(
        &mut self,
        event: &RawEvent,
        trigger: &ModifierTrigger,
        active: Modifiers,
        poster: &dyn Poster,
    ) -> RemapOutcome {
        if event.key_code == trigger.base.key_code {
            if press_direction(event, trigger.base_key()) == Some(false) {
                if !active.is_empty()
                    && let Err(e) = post_modifiers(poster, active, false)
                {
                    warn!(trigger = %trigger.id, error = %e, "remap_release_failed");
                }
                debug!(trigger = %trigger.id, "remap_released");
                self.state = ModifierRemapState::Idle;
            }
            return RemapOutcome::Consumed;
        }
        if active.is_empty() {
            RemapOutcome::Ignored
        } else {
            RemapOutcome::Decorate(active)
        }
    }

    /// Handle a hold-timer fire.
    pub fn on_timer(&mut self, fired: TimerFired, poster: &dyn Poster) {
        let trigger = match &self.state {
            ModifierRemapState::Armed {
                trigger,
                timer: Some(t),
            } if t.matches(fired) => trigger.clone(),
            _ => {
                trace!(epoch = fired.epoch, "remap_timer_stale");
                return;
            }
        };
        // The timer already fired; dropping the handle is enough.
        self.state = ModifierRemapState::Idle;
        self.enter_held(trigger, poster);
    }

    /// Release anything held and return to idle without synthesizing the
    /// alone output.
    pub fn reset(&mut self, poster: &dyn Poster) {
        match mem::take(&mut self.state) {
            ModifierRemapState::Armed {
                timer: Some(t), ..
            } => t.cancel(),
            ModifierRemapState::Held { trigger, active } if !active.is_empty() => {
                if let Err(e) = post_modifiers(poster, active, false) {
                    warn!(trigger = %trigger.id, error = %e, "remap_release_failed");
                }
            }
            _ => {}
        }
    }

    fn disarm(&mut self) {
        if let ModifierRemapState::Armed { timer, .. } = &mut self.state
            && let Some(t) = timer.take()
        {
            t.cancel();
        }
    }

    fn enter_held(&mut self, trigger: Arc<ModifierTrigger>, poster: &dyn Poster) -> Modifiers {
        let active = match trigger.held {
            Some(Remap::Modifiers(m)) => {
                if let Err(e) = post_modifiers(poster, m, true) {
                    warn!(trigger = %trigger.id, error = %e, "remap_held_failed");
                }
                m
            }
            Some(ref held @ Remap::Key(_)) => {
                synthesize(poster, held, &trigger.id);
                Modifiers::empty()
            }
            None => Modifiers::empty(),
        };
        debug!(trigger = %trigger.id, ?active, "remap_held");
        self.state = ModifierRemapState::Held { trigger, active };
        active
    }
}

/// Tap a remap output. Failures are logged; the caller's transition stands.
fn synthesize(poster: &dyn Poster, remap: &Remap, id: &str) {
    let result = match remap {
        Remap::Key(stroke) => post_keystroke(poster, stroke),
        Remap::Modifiers(m) => {
            post_modifiers(poster, *m, true).and_then(|()| post_modifiers(poster, *m, false))
        }
    };
    if let Err(e) = result {
        warn!(trigger = %id, error = %e, "remap_synthesize_failed");
    }
}
