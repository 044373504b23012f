//! The `Key` enum and scancode conversions.
//!
//! A "scancode" here is the macOS hardware virtual keycode: the integer
//! reported by `NSEvent.keyCode` and by CoreGraphics in the
//! `kCGKeyboardEventKeycode` field. It is positional and layout independent.

/// macOS hardware virtual keycode (`kVK_*`, `NSEvent.keyCode`).
pub type Scancode = u16;

macro_rules! define_keys {
    ( $( $name:ident = $code:literal ),* $(,)? ) => {
        /// macOS virtual keys, valued with their hardware keycodes.
        #[allow(missing_docs)]
        #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
        #[repr(u16)]
        pub enum Key {
            $( $name = $code, )*
        }

        impl Key {
            /// Every known key, in declaration order.
            pub const ALL: &'static [Key] = &[ $( Key::$name, )* ];

            /// The enum variant name (e.g. `"LeftArrow"`).
            pub fn name(self) -> &'static str {
                match self {
                    $( Key::$name => stringify!($name), )*
                }
            }

            /// Map a hardware keycode to a `Key`, if known.
            pub fn from_scancode(code: Scancode) -> Option<Self> {
                match code {
                    $( $code => Some(Key::$name), )*
                    _ => None,
                }
            }
        }
    };
}

define_keys! {
    A = 0x00,
    S = 0x01,
    D = 0x02,
    F = 0x03,
    H = 0x04,
    G = 0x05,
    Z = 0x06,
    X = 0x07,
    C = 0x08,
    V = 0x09,
    B = 0x0B,
    Q = 0x0C,
    W = 0x0D,
    E = 0x0E,
    R = 0x0F,
    Y = 0x10,
    T = 0x11,
    Digit1 = 0x12,
    Digit2 = 0x13,
    Digit3 = 0x14,
    Digit4 = 0x15,
    Digit6 = 0x16,
    Digit5 = 0x17,
    Equal = 0x18,
    Digit9 = 0x19,
    Digit7 = 0x1A,
    Minus = 0x1B,
    Digit8 = 0x1C,
    Digit0 = 0x1D,
    RightBracket = 0x1E,
    O = 0x1F,
    U = 0x20,
    LeftBracket = 0x21,
    I = 0x22,
    P = 0x23,
    Return = 0x24,
    L = 0x25,
    J = 0x26,
    Quote = 0x27,
    K = 0x28,
    Semicolon = 0x29,
    Backslash = 0x2A,
    Comma = 0x2B,
    Slash = 0x2C,
    N = 0x2D,
    M = 0x2E,
    Period = 0x2F,
    Tab = 0x30,
    Space = 0x31,
    Grave = 0x32,
    Delete = 0x33,
    Escape = 0x35,
    RightCommand = 0x36,
    Command = 0x37,
    Shift = 0x38,
    CapsLock = 0x39,
    Option = 0x3A,
    Control = 0x3B,
    RightShift = 0x3C,
    RightOption = 0x3D,
    RightControl = 0x3E,
    Function = 0x3F,
    F17 = 0x40,
    VolumeUp = 0x48,
    VolumeDown = 0x49,
    Mute = 0x4A,
    F18 = 0x4F,
    F19 = 0x50,
    F20 = 0x5A,
    F5 = 0x60,
    F6 = 0x61,
    F7 = 0x62,
    F3 = 0x63,
    F8 = 0x64,
    F9 = 0x65,
    F11 = 0x67,
    F13 = 0x69,
    F16 = 0x6A,
    F14 = 0x6B,
    F10 = 0x6D,
    F12 = 0x6F,
    F15 = 0x71,
    Help = 0x72,
    Home = 0x73,
    PageUp = 0x74,
    ForwardDelete = 0x75,
    F4 = 0x76,
    End = 0x77,
    F2 = 0x78,
    PageDown = 0x79,
    F1 = 0x7A,
    LeftArrow = 0x7B,
    RightArrow = 0x7C,
    DownArrow = 0x7D,
    UpArrow = 0x7E,
}

impl Key {
    /// The hardware keycode for this key.
    pub fn scancode(self) -> Scancode {
        self as u16
    }

    /// Case-insensitive lookup by variant name.
    pub fn from_name(s: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.name().eq_ignore_ascii_case(s))
    }

    /// True for the physical modifier keys (which arrive as `flagsChanged`).
    pub fn is_modifier(self) -> bool {
        matches!(
            self,
            Key::Command
                | Key::RightCommand
                | Key::Shift
                | Key::RightShift
                | Key::Option
                | Key::RightOption
                | Key::Control
                | Key::RightControl
                | Key::CapsLock
                | Key::Function
        )
    }

    /// Keys for which macOS reports the secondary-function flag on its own.
    ///
    /// The OS sets `kCGEventFlagMaskSecondaryFn` for arrows, navigation and
    /// F-keys even when fn is not held, and some keyboards do the same for
    /// space and tab. Signatures for these keys never carry the function bit.
    pub fn is_special(self) -> bool {
        matches!(
            self,
            Key::Space
                | Key::Tab
                | Key::Return
                | Key::Escape
                | Key::Delete
                | Key::ForwardDelete
                | Key::Help
                | Key::Home
                | Key::End
                | Key::PageUp
                | Key::PageDown
                | Key::LeftArrow
                | Key::RightArrow
                | Key::UpArrow
                | Key::DownArrow
                | Key::F1
                | Key::F2
                | Key::F3
                | Key::F4
                | Key::F5
                | Key::F6
                | Key::F7
                | Key::F8
                | Key::F9
                | Key::F10
                | Key::F11
                | Key::F12
                | Key::F13
                | Key::F14
                | Key::F15
                | Key::F16
                | Key::F17
                | Key::F18
                | Key::F19
                | Key::F20
        )
    }
}

impl TryFrom<Scancode> for Key {
    type Error = ();
    fn try_from(value: Scancode) -> Result<Self, Self::Error> {
        Key::from_scancode(value).ok_or(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scancodes_roundtrip() {
        for k in Key::ALL {
            assert_eq!(Key::from_scancode(k.scancode()), Some(*k), "{}", k.name());
        }
    }

    #[test]
    fn known_hardware_values() {
        assert_eq!(Key::A.scancode(), 0x00);
        assert_eq!(Key::Tab.scancode(), 0x30);
        assert_eq!(Key::Escape.scancode(), 0x35);
        assert_eq!(Key::Control.scancode(), 0x3B);
        assert_eq!(Key::from_scancode(0x34), None);
    }

    #[test]
    fn name_lookup_ignores_case() {
        assert_eq!(Key::from_name("leftarrow"), Some(Key::LeftArrow));
        assert_eq!(Key::from_name("ESCAPE"), Some(Key::Escape));
        assert_eq!(Key::from_name("nope"), None);
    }

    #[test]
    fn special_keys_are_not_letters() {
        assert!(Key::Space.is_special());
        assert!(Key::F5.is_special());
        assert!(!Key::A.is_special());
        assert!(Key::Function.is_modifier());
        assert!(!Key::Tab.is_modifier());
    }
}
