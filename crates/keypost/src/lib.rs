//! Posts synthesized keyboard events back into the OS input stream.
//!
//! The engine never talks to CoreGraphics directly; it goes through the
//! [`Poster`] trait so the hot path can be exercised without an event tap.
//!
//! - [`CgPoster`] (macOS only) posts tagged `CGEvent`s at the HID location.
//! - [`NullPoster`] drops everything (useful for dry runs).
//! - `RecordingPoster` (behind `test-utils`) records every request.
//!
//! Every event we inject carries [`SYNTHETIC_TAG`] in its
//! `EventSourceUserData` field so our own tap can recognise and skip it.
#![warn(missing_docs)]
#![warn(unsafe_op_in_unsafe_fn)]

mod error;

#[cfg(target_os = "macos")]
mod cg;

#[cfg(any(test, feature = "test-utils"))]
mod recording;

use mac_keycode::{Keystroke, Modifier, Modifiers, Scancode};
use tracing::{trace, warn};

pub use error::{Error, Result};

#[cfg(target_os = "macos")]
pub use cg::CgPoster;

#[cfg(any(test, feature = "test-utils"))]
pub use recording::{Posted, RecordingPoster};

/// 'kflw' in ASCII bytes: 0x6b 0x66 0x6c 0x77.
pub const SYNTHETIC_TAG: i64 = 0x6b66_6c77;

/// Kind of keyboard event, as seen by the tap or requested from a poster.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum EventKind {
    /// A key was pressed.
    KeyDown,
    /// A key was released.
    KeyUp,
    /// A modifier key changed state.
    FlagsChanged,
}

/// Sink for synthesized events: `post(keyCode, type, flags)`.
pub trait Poster: Send + Sync {
    /// Post one keyboard event with the given flags.
    fn post(&self, key_code: Scancode, kind: EventKind, flags: Modifiers) -> Result<()>;
}

/// Poster that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPoster;

impl Poster for NullPoster {
    fn post(&self, key_code: Scancode, kind: EventKind, flags: Modifiers) -> Result<()> {
        trace!(key_code, ?kind, ?flags, "null_post");
        Ok(())
    }
}

/// Press (or release) the modifier keys for `mods`.
///
/// Presses walk [`Modifiers::keys`] in order, releases walk it in reverse, and
/// the flags on each event reflect the state after that key changed. Every
/// key is attempted even after a failure; the first error is returned.
pub fn post_modifiers(poster: &dyn Poster, mods: Modifiers, down: bool) -> Result<()> {
    let mut keys = mods.keys();
    let mut held = if down { Modifiers::empty() } else { mods };
    if !down {
        keys.reverse();
    }
    let mut first = Ok(());
    for key in keys {
        let Ok(modifier) = Modifier::try_from(key) else {
            continue;
        };
        let flag = Modifiers::from(modifier);
        if down {
            held |= flag;
        } else {
            held -= flag;
        }
        if let Err(e) = poster.post(key.scancode(), EventKind::FlagsChanged, held)
            && first.is_ok()
        {
            first = Err(e);
        }
    }
    first
}

/// Tap a full keystroke: modifiers down, key down, key up, modifiers up.
///
/// Failures are logged and the remaining events are still attempted so no
/// modifier is left stuck; the first error is returned.
pub fn post_keystroke(poster: &dyn Poster, stroke: &Keystroke) -> Result<()> {
    trace!(keystroke = %stroke, "post_keystroke");
    let code = stroke.key.scancode();
    let results = [
        post_modifiers(poster, stroke.modifiers, true),
        poster.post(code, EventKind::KeyDown, stroke.modifiers),
        poster.post(code, EventKind::KeyUp, stroke.modifiers),
        post_modifiers(poster, stroke.modifiers, false),
    ];
    let mut first = Ok(());
    for r in results {
        if let Err(e) = r {
            warn!(keystroke = %stroke, error = %e, "post_keystroke_failed");
            if first.is_ok() {
                first = Err(e);
            }
        }
    }
    first
}

#[cfg(test)]
mod tests {
    use mac_keycode::Key;

    use super::*;

    #[test]
    fn keystroke_posts_modifiers_around_key() {
        let poster = RecordingPoster::new();
        let stroke = Keystroke::parse("cmd+ctrl+k").expect("spec");
        post_keystroke(&poster, &stroke).expect("post");
        let posted = poster.take();
        let seq: Vec<(u16, EventKind)> = posted.iter().map(|p| (p.key_code, p.kind)).collect();
        assert_eq!(
            seq,
            vec![
                (Key::Control.scancode(), EventKind::FlagsChanged),
                (Key::Command.scancode(), EventKind::FlagsChanged),
                (Key::K.scancode(), EventKind::KeyDown),
                (Key::K.scancode(), EventKind::KeyUp),
                (Key::Command.scancode(), EventKind::FlagsChanged),
                (Key::Control.scancode(), EventKind::FlagsChanged),
            ]
        );
        assert_eq!(posted[1].flags, Modifiers::CONTROL | Modifiers::COMMAND);
        assert_eq!(posted[4].flags, Modifiers::CONTROL);
        assert_eq!(posted[5].flags, Modifiers::empty());
    }

    #[test]
    fn bare_keystroke_is_two_events() {
        let poster = RecordingPoster::new();
        post_keystroke(&poster, &Keystroke::bare(Key::Escape)).expect("post");
        assert_eq!(poster.take().len(), 2);
    }

    #[test]
    fn failures_do_not_stop_the_sequence() {
        let poster = RecordingPoster::new();
        poster.set_failing(true);
        let stroke = Keystroke::parse("shift+a").expect("spec");
        assert!(post_keystroke(&poster, &stroke).is_err());
        // Every attempt is still recorded.
        assert_eq!(poster.take().len(), 4);
    }

    #[test]
    fn every_modifier_release_is_attempted() {
        let poster = RecordingPoster::new();
        poster.set_failing(true);
        let mods = Modifiers::COMMAND | Modifiers::SHIFT | Modifiers::OPTION;
        assert!(matches!(
            post_modifiers(&poster, mods, false),
            Err(Error::Rejected(_))
        ));
        let posted = poster.take();
        assert_eq!(posted.len(), 3);
        assert_eq!(posted[2].flags, Modifiers::empty());

        // A multi-modifier keystroke attempts all eight events.
        poster.set_failing(true);
        let stroke = Keystroke::parse("cmd+shift+opt+k").expect("spec");
        assert!(post_keystroke(&poster, &stroke).is_err());
        assert_eq!(poster.take().len(), 8);
    }
}
