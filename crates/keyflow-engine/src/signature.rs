//! Raw tap events and their canonical, hashable signatures.

use std::fmt;

use keypost::{EventKind, SYNTHETIC_TAG};
use mac_keycode::{Key, Keystroke, Modifiers};

/// One keyboard event as delivered by the system event tap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    /// Hardware virtual keycode.
    pub key_code: i64,
    /// Raw `CGEventFlags` bits.
    pub flags: u64,
    /// Down, up or modifier change.
    pub kind: EventKind,
    /// Event timestamp in nanoseconds since boot.
    pub timestamp: u64,
    /// OS autorepeat.
    pub is_repeat: bool,
    /// `EventSourceUserData`; equals [`SYNTHETIC_TAG`] for events we posted.
    pub source_tag: i64,
    /// Characters the OS produced for this event, when known.
    pub text: Option<String>,
}

impl RawEvent {
    /// A user (untagged) event for `key` with modifier flags `mods`.
    pub fn new(kind: EventKind, key: Key, mods: Modifiers) -> Self {
        Self {
            key_code: i64::from(key.scancode()),
            flags: mods.bits(),
            kind,
            timestamp: 0,
            is_repeat: false,
            source_tag: 0,
            text: None,
        }
    }

    /// Key-down for `key` with `mods` held.
    pub fn key_down(key: Key, mods: Modifiers) -> Self {
        Self::new(EventKind::KeyDown, key, mods)
    }

    /// Key-up for `key` with `mods` held.
    pub fn key_up(key: Key, mods: Modifiers) -> Self {
        Self::new(EventKind::KeyUp, key, mods)
    }

    /// Mark this event as an OS autorepeat.
    pub fn repeat(mut self) -> Self {
        self.is_repeat = true;
        self
    }

    /// Attach the characters the OS produced.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Attach a source tag.
    pub fn with_source_tag(mut self, tag: i64) -> Self {
        self.source_tag = tag;
        self
    }

    /// True for events the engine itself injected.
    pub fn is_synthetic(&self) -> bool {
        self.source_tag == SYNTHETIC_TAG
    }

    /// The known key for this event's keycode, if any.
    pub fn key(&self) -> Option<Key> {
        u16::try_from(self.key_code).ok().and_then(Key::from_scancode)
    }

    /// Modifier flags carried by the event, unknown bits dropped.
    pub fn modifiers(&self) -> Modifiers {
        Modifiers::from_cg_flags(self.flags)
    }
}

/// Canonical identity of a keystroke for trigger lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventSignature {
    /// Hardware virtual keycode.
    pub key_code: i64,
    /// Normalized modifier set (matching bits only).
    pub modifiers: Modifiers,
}

impl EventSignature {
    /// Build a signature, normalizing `modifiers` for `key_code`.
    pub fn new(key_code: i64, modifiers: Modifiers) -> Self {
        let special = u16::try_from(key_code)
            .ok()
            .and_then(Key::from_scancode)
            .is_some_and(Key::is_special);
        let mut modifiers = modifiers & Modifiers::MATCHING;
        if special {
            modifiers.remove(Modifiers::FUNCTION);
        }
        Self {
            key_code,
            modifiers,
        }
    }

    /// Signature a configured keystroke is registered under.
    pub fn from_keystroke(stroke: &Keystroke) -> Self {
        Self::new(i64::from(stroke.key.scancode()), stroke.modifiers)
    }

    /// Same key with `extra` modifiers added, renormalized.
    pub fn with_modifiers(self, extra: Modifiers) -> Self {
        Self::new(self.key_code, self.modifiers | extra)
    }
}

impl fmt::Display for EventSignature {
    /// `code:mask` with the mask in hex; used in chord prefix encodings.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:x}", self.key_code, self.modifiers.bits())
    }
}

/// Canonical signature for a raw event.
///
/// Only shift, control, option, command and function survive; special keys
/// (arrows, navigation, F-keys, space, tab, return, escape, delete) never keep
/// the function bit the OS sets on them.
pub fn normalize(event: &RawEvent) -> EventSignature {
    EventSignature::new(event.key_code, event.modifiers())
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn drops_non_matching_bits() {
        let ev = RawEvent::key_down(Key::K, Modifiers::COMMAND | Modifiers::CAPS_LOCK)
            .with_text("k");
        let sig = normalize(&ev);
        assert_eq!(sig.modifiers, Modifiers::COMMAND);
        assert_eq!(sig.key_code, i64::from(Key::K.scancode()));
    }

    #[test]
    fn special_keys_lose_function_bit() {
        let ev = RawEvent::key_down(Key::LeftArrow, Modifiers::FUNCTION | Modifiers::SHIFT);
        assert_eq!(normalize(&ev).modifiers, Modifiers::SHIFT);
        let ev = RawEvent::key_down(Key::K, Modifiers::FUNCTION);
        assert_eq!(normalize(&ev).modifiers, Modifiers::FUNCTION);
    }

    #[test]
    fn unknown_raw_bits_are_ignored() {
        let mut ev = RawEvent::key_down(Key::A, Modifiers::OPTION);
        ev.flags |= 0x0100 | (1 << 40);
        assert_eq!(normalize(&ev), EventSignature::new(0, Modifiers::OPTION));
    }

    #[test]
    fn unknown_keycodes_still_normalize() {
        let mut ev = RawEvent::key_down(Key::A, Modifiers::FUNCTION);
        ev.key_code = 0x1ff;
        let sig = normalize(&ev);
        assert_eq!(sig.key_code, 0x1ff);
        assert_eq!(sig.modifiers, Modifiers::FUNCTION);
        assert!(ev.key().is_none());
    }

    #[test]
    fn synthetic_detection() {
        let ev = RawEvent::key_down(Key::A, Modifiers::empty());
        assert!(!ev.is_synthetic());
        assert!(ev.with_source_tag(SYNTHETIC_TAG).is_synthetic());
    }

    #[test]
    fn keystroke_and_event_agree() {
        let stroke = Keystroke::parse("fn+cmd+up").unwrap();
        let ev = RawEvent::key_down(Key::UpArrow, Modifiers::COMMAND | Modifiers::FUNCTION);
        assert_eq!(EventSignature::from_keystroke(&stroke), normalize(&ev));
    }

    #[test]
    fn display_encoding() {
        let sig = EventSignature::new(40, Modifiers::COMMAND);
        assert_eq!(sig.to_string(), "40:100000");
    }

    proptest! {
        #[test]
        fn normalize_is_idempotent(idx in 0usize..Key::ALL.len(), bits in any::<u64>()) {
            let key = Key::ALL[idx];
            let mut ev = RawEvent::key_down(key, Modifiers::empty());
            ev.flags = bits;
            let sig = normalize(&ev);
            prop_assert_eq!(sig.with_modifiers(Modifiers::empty()), sig);
            prop_assert!(Modifiers::MATCHING.contains(sig.modifiers));
        }
    }
}
