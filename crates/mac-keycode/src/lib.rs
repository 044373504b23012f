//! mac-keycode: virtual keycodes, modifier flags and keystroke specs for macOS.
//!
//! - `Key`: the ANSI subset of macOS hardware virtual keycodes (`kVK_*`),
//!   `repr(u16)` with the exact hardware values.
//! - `Modifier`: individual modifier keys, parsed from spec words.
//! - `Modifiers`: the CoreGraphics event flag bitset (`CGEventFlags` layout).
//! - `Keystroke`: one key plus a modifier set, parsed from specs such as
//!   `"cmd+shift+k"`.
//!
//! Variant names follow the SDK header with the `ANSI_` prefix stripped and
//! digits prefixed with `Digit`.

mod key;
pub use key::{Key, Scancode};

mod spec;

mod modifiers;
pub use modifiers::{Modifier, Modifiers};

mod keystroke;
pub use keystroke::Keystroke;

mod text;
