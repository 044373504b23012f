//! Typed-text triggers.
//!
//! Characters from key-up events accumulate in a buffer. After each append
//! the whole buffer is looked up as a literal; text typed before a snippet
//! (`"xbrb"`) never matches `"brb"`. A match dispatches and clears the
//! buffer; an idle timer clears it after a pause in typing.
//!
//! Once the buffer is longer than every registered snippet it can no longer
//! match, so it stops growing and stays dead until the next clear.

use std::time::Duration;

use mac_keycode::{Key, Modifiers};
use tracing::trace;

use crate::{
    cache::{ScopeKey, TriggerTables, WorkflowRef},
    signature::RawEvent,
    timer::{TimerFired, TimerHandle, TimerQueue, TimerSlot},
};

/// A completed snippet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnippetMatch {
    /// The literal that matched.
    pub text: String,
    /// Every workflow registered for it in an active scope.
    pub workflows: Vec<WorkflowRef>,
}

/// Text buffer plus its idle timer.
#[derive(Debug, Default)]
pub struct SnippetMatcher {
    buffer: String,
    chars: usize,
    /// Typed past the longest snippet; nothing matches until cleared.
    overflowed: bool,
    timer: Option<TimerHandle>,
}

/// Characters an event contributes, or `None` when it types nothing.
fn typed_chars(event: &RawEvent) -> Option<String> {
    let mods = event.modifiers();
    if mods.intersects(Modifiers::COMMAND | Modifiers::CONTROL) {
        return None;
    }
    let text = match &event.text {
        Some(t) => t.chars().filter(|c| !c.is_control()).collect(),
        None => event
            .key()
            .and_then(|k| k.to_char(mods.contains(Modifiers::SHIFT)))
            .map(String::from)
            .unwrap_or_default(),
    };
    (!text.is_empty()).then_some(text)
}

impl SnippetMatcher {
    /// Empty matcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current buffer contents (empty once overflowed).
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// True when the buffer outgrew every snippet since the last clear.
    pub fn is_overflowed(&self) -> bool {
        self.overflowed
    }

    /// Feed a key-up event. `accepts` filters registrations by scope.
    pub fn on_key_up(
        &mut self,
        event: &RawEvent,
        tables: &TriggerTables,
        accepts: impl Fn(&ScopeKey) -> bool,
        timers: &TimerQueue,
        idle: Duration,
        cap: usize,
    ) -> Option<SnippetMatch> {
        if !tables.has_snippets() {
            return None;
        }
        let limit = tables.longest_snippet().min(cap.max(1));
        let appended = match typed_chars(event) {
            Some(text) => {
                self.append(&text, limit);
                true
            }
            None => {
                match event.key() {
                    Some(Key::Delete) => self.pop(),
                    Some(k) if k.is_special() => self.clear(),
                    _ => {}
                }
                false
            }
        };

        if appended && let Some(found) = self.find_match(tables, &accepts) {
            trace!(text = %found.text, count = found.workflows.len(), "snippet_match");
            self.reset();
            return Some(found);
        }

        if let Some(old) = self.timer.take() {
            old.cancel();
        }
        if !self.buffer.is_empty() || self.overflowed {
            self.timer = Some(timers.schedule(TimerSlot::Snippet, idle));
        }
        None
    }

    /// Exact lookup of the whole buffer.
    fn find_match(
        &self,
        tables: &TriggerTables,
        accepts: &impl Fn(&ScopeKey) -> bool,
    ) -> Option<SnippetMatch> {
        if self.overflowed || self.buffer.is_empty() {
            return None;
        }
        let workflows: Vec<WorkflowRef> = tables
            .snippet(&self.buffer)
            .iter()
            .filter(|e| accepts(&e.scope))
            .map(|e| e.workflow.clone())
            .collect();
        (!workflows.is_empty()).then(|| SnippetMatch {
            text: self.buffer.clone(),
            workflows,
        })
    }

    /// Append typed text; past `limit` characters the buffer goes dead.
    fn append(&mut self, text: &str, limit: usize) {
        if self.overflowed {
            return;
        }
        let added = text.chars().count();
        if self.chars + added > limit {
            trace!(limit, "snippet_buffer_overflow");
            self.buffer.clear();
            self.chars = 0;
            self.overflowed = true;
            return;
        }
        self.buffer.push_str(text);
        self.chars += added;
    }

    /// Delete one character. An overflowed buffer stays dead: the deleted
    /// character is not known.
    fn pop(&mut self) {
        if !self.overflowed && self.buffer.pop().is_some() {
            self.chars -= 1;
        }
    }

    fn clear(&mut self) {
        self.buffer.clear();
        self.chars = 0;
        self.overflowed = false;
    }

    /// Handle an idle-timer fire. Returns true when it cleared the buffer.
    pub fn on_timer(&mut self, fired: TimerFired) -> bool {
        match &self.timer {
            Some(t) if t.matches(fired) => {
                trace!(buffer = %self.buffer, "snippet_timeout");
                self.timer = None;
                self.clear();
                true
            }
            _ => false,
        }
    }

    /// Clear the buffer and cancel the timer.
    pub fn reset(&mut self) {
        self.clear();
        if let Some(t) = self.timer.take() {
            t.cancel();
        }
    }
}
