//! CoreGraphics-backed poster.
//!
//! Events are created from a `HIDSystemState` source and posted at the HID
//! tap location so they flow through every downstream tap, including ours.

use core_graphics::{
    event::{CGEvent, CGEventFlags, CGEventTapLocation, CGKeyCode, EventField},
    event_source::{CGEventSource, CGEventSourceStateID},
};
use mac_keycode::{Key, Modifier, Modifiers, Scancode};
use tracing::{trace, warn};

use crate::{Error, EventKind, Poster, Result, SYNTHETIC_TAG};

fn ax_is_process_trusted() -> bool {
    #[link(name = "ApplicationServices", kind = "framework")]
    unsafe extern "C" {
        fn AXIsProcessTrusted() -> bool;
    }
    unsafe { AXIsProcessTrusted() }
}

/// Posts tagged keyboard events through CoreGraphics.
#[derive(Debug, Default, Clone, Copy)]
pub struct CgPoster {
    /// When true, do not tag events so upstream taps treat them as user input.
    untagged: bool,
}

impl CgPoster {
    /// Poster whose events carry [`SYNTHETIC_TAG`].
    pub fn new() -> Self {
        Self { untagged: false }
    }

    /// Poster whose events look like real user input (for manual testing).
    pub fn new_untagged() -> Self {
        Self { untagged: true }
    }

    fn build(&self, key_code: Scancode, down: bool, flags: Modifiers) -> Result<CGEvent> {
        let source = CGEventSource::new(CGEventSourceStateID::HIDSystemState).map_err(|_| {
            if !ax_is_process_trusted() {
                warn!("accessibility_permission_missing_for_event_source");
                return Error::NotTrusted("Accessibility");
            }
            Error::NoEventSource
        })?;
        let event = CGEvent::new_keyboard_event(source, CGKeyCode::from(key_code), down)
            .map_err(|_| {
                if !ax_is_process_trusted() {
                    warn!("accessibility_permission_missing_for_event_create");
                    return Error::NotTrusted("Accessibility");
                }
                Error::BuildEvent(key_code)
            })?;
        event.set_flags(CGEventFlags::from_bits_retain(flags.bits()));
        if !self.untagged {
            event.set_integer_value_field(EventField::EVENT_SOURCE_USER_DATA, SYNTHETIC_TAG);
        }
        Ok(event)
    }
}

impl Poster for CgPoster {
    fn post(&self, key_code: Scancode, kind: EventKind, flags: Modifiers) -> Result<()> {
        let down = match kind {
            EventKind::KeyDown => true,
            EventKind::KeyUp => false,
            // Modifier keys toggle; the resulting flags say which way.
            EventKind::FlagsChanged => Key::from_scancode(key_code)
                .and_then(|k| Modifier::try_from(k).ok())
                .map(|m| flags.contains(Modifiers::from(m)))
                .unwrap_or(!flags.is_empty()),
        };
        let event = self.build(key_code, down, flags)?;
        event.post(CGEventTapLocation::HID);
        trace!(key_code, ?kind, ?flags, "cg_posted");
        Ok(())
    }
}
