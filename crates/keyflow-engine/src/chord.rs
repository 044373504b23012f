//! Multi-key chord tracking.
//!
//! Holds the prefix of a partially matched chord and its idle timer. The
//! prefix is non-empty only while a partial match is pending.

use std::time::Duration;

use tracing::trace;

use crate::{
    cache::{ChordPrefix, ResolutionResult, ScopeKey, TriggerTables, WorkflowRef},
    signature::EventSignature,
    timer::{TimerFired, TimerHandle, TimerQueue, TimerSlot},
};

/// Result of offering a key-down to the tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChordStep {
    /// A chord completed.
    Exact {
        /// Workflow to dispatch.
        workflow: WorkflowRef,
        /// Scope the match was found in.
        scope: ScopeKey,
        /// Do not suppress the final keystroke.
        passthrough: bool,
    },
    /// The keystroke extended a pending chord.
    Partial,
    /// No match. `abandoned` is true when a pending prefix was discarded.
    Miss {
        /// A pending prefix was discarded by this keystroke.
        abandoned: bool,
    },
}

/// Chord prefix state plus its idle timer.
#[derive(Debug, Default)]
pub struct ChordSequenceTracker {
    prefix: ChordPrefix,
    timer: Option<TimerHandle>,
}

impl ChordSequenceTracker {
    /// Tracker with no pending chord.
    pub fn new() -> Self {
        Self::default()
    }

    /// The pending prefix (empty when idle).
    pub fn prefix(&self) -> &ChordPrefix {
        &self.prefix
    }

    /// True while a partial match is pending.
    pub fn is_pending(&self) -> bool {
        !self.prefix.is_empty()
    }

    /// Resolve a key-down against `tables` along `chain`.
    pub fn on_key_down(
        &mut self,
        tables: &TriggerTables,
        chain: &[ScopeKey],
        signature: EventSignature,
        timers: &TimerQueue,
        idle: Duration,
    ) -> ChordStep {
        let resolved = tables
            .resolve(chain, &self.prefix, signature)
            .map(|(scope, r)| (scope.clone(), r.clone()));
        match resolved {
            Some((scope, ResolutionResult::Exact { workflow, passthrough })) => {
                trace!(prefix = %self.prefix, %scope, workflow = %workflow.id, "chord_exact");
                self.reset();
                ChordStep::Exact {
                    workflow,
                    scope,
                    passthrough,
                }
            }
            Some((scope, ResolutionResult::Partial(next))) => {
                trace!(prefix = %next, %scope, "chord_partial");
                self.prefix = next;
                if let Some(old) = self.timer.replace(timers.schedule(TimerSlot::Chord, idle)) {
                    old.cancel();
                }
                ChordStep::Partial
            }
            None => {
                let abandoned = self.is_pending();
                if abandoned {
                    trace!(prefix = %self.prefix, %signature, "chord_abandoned");
                }
                self.reset();
                ChordStep::Miss { abandoned }
            }
        }
    }

    /// Handle an idle-timer fire. Returns true when it discarded a prefix.
    pub fn on_timer(&mut self, fired: TimerFired) -> bool {
        match &self.timer {
            Some(t) if t.matches(fired) => {
                trace!(prefix = %self.prefix, "chord_timeout");
                self.timer = None;
                self.prefix = ChordPrefix::empty();
                true
            }
            _ => {
                trace!(epoch = fired.epoch, "chord_timer_stale");
                false
            }
        }
    }

    /// Drop any pending prefix and cancel its timer.
    pub fn reset(&mut self) {
        self.prefix = ChordPrefix::empty();
        if let Some(t) = self.timer.take() {
            t.cancel();
        }
    }
}
