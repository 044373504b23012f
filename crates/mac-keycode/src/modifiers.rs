use std::convert::TryFrom;

use bitflags::bitflags;

use crate::Key;

bitflags! {
    /// Modifier state as carried in `CGEventFlags`.
    ///
    /// Bit positions match the device-independent CoreGraphics masks so raw
    /// event flags can be truncated straight into this type.
    #[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, PartialOrd, Ord)]
    pub struct Modifiers: u64 {
        /// `kCGEventFlagMaskAlphaShift`
        const CAPS_LOCK = 1 << 16;
        /// `kCGEventFlagMaskShift`
        const SHIFT = 1 << 17;
        /// `kCGEventFlagMaskControl`
        const CONTROL = 1 << 18;
        /// `kCGEventFlagMaskAlternate`
        const OPTION = 1 << 19;
        /// `kCGEventFlagMaskCommand`
        const COMMAND = 1 << 20;
        /// `kCGEventFlagMaskNumericPad`
        const NUMERIC_PAD = 1 << 21;
        /// `kCGEventFlagMaskHelp`
        const HELP = 1 << 22;
        /// `kCGEventFlagMaskSecondaryFn`
        const FUNCTION = 1 << 23;
    }
}

impl Modifiers {
    /// Bits that participate in trigger matching.
    pub const MATCHING: Self = Self::SHIFT
        .union(Self::CONTROL)
        .union(Self::OPTION)
        .union(Self::COMMAND)
        .union(Self::FUNCTION);

    /// Keep only the known flag bits of a raw `CGEventFlags` value.
    pub fn from_cg_flags(flags: u64) -> Self {
        Self::from_bits_truncate(flags)
    }

    /// The left-hand modifier keys that produce these flags, in posting order.
    ///
    /// Releasing should walk this list in reverse.
    pub fn keys(self) -> Vec<Key> {
        let mut out = Vec::new();
        if self.contains(Self::CONTROL) {
            out.push(Key::Control);
        }
        if self.contains(Self::OPTION) {
            out.push(Key::Option);
        }
        if self.contains(Self::SHIFT) {
            out.push(Key::Shift);
        }
        if self.contains(Self::COMMAND) {
            out.push(Key::Command);
        }
        if self.contains(Self::FUNCTION) {
            out.push(Key::Function);
        }
        out
    }
}

/// Modifier keys available on macOS keyboards.
#[allow(missing_docs)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Modifier {
    Command,
    Shift,
    Option,
    Control,
    CapsLock,
    Function,
    RightCommand,
    RightShift,
    RightOption,
    RightControl,
}

impl From<Modifier> for Key {
    fn from(m: Modifier) -> Self {
        match m {
            Modifier::Command => Key::Command,
            Modifier::Shift => Key::Shift,
            Modifier::Option => Key::Option,
            Modifier::Control => Key::Control,
            Modifier::CapsLock => Key::CapsLock,
            Modifier::Function => Key::Function,
            Modifier::RightCommand => Key::RightCommand,
            Modifier::RightShift => Key::RightShift,
            Modifier::RightOption => Key::RightOption,
            Modifier::RightControl => Key::RightControl,
        }
    }
}

impl TryFrom<Key> for Modifier {
    type Error = ();
    fn try_from(k: Key) -> Result<Self, Self::Error> {
        match k {
            Key::Command => Ok(Modifier::Command),
            Key::Shift => Ok(Modifier::Shift),
            Key::Option => Ok(Modifier::Option),
            Key::Control => Ok(Modifier::Control),
            Key::CapsLock => Ok(Modifier::CapsLock),
            Key::Function => Ok(Modifier::Function),
            Key::RightCommand => Ok(Modifier::RightCommand),
            Key::RightShift => Ok(Modifier::RightShift),
            Key::RightOption => Ok(Modifier::RightOption),
            Key::RightControl => Ok(Modifier::RightControl),
            _ => Err(()),
        }
    }
}

impl From<Modifier> for Modifiers {
    fn from(m: Modifier) -> Self {
        match m {
            Modifier::Command | Modifier::RightCommand => Modifiers::COMMAND,
            Modifier::Shift | Modifier::RightShift => Modifiers::SHIFT,
            Modifier::Option | Modifier::RightOption => Modifiers::OPTION,
            Modifier::Control | Modifier::RightControl => Modifiers::CONTROL,
            Modifier::CapsLock => Modifiers::CAPS_LOCK,
            Modifier::Function => Modifiers::FUNCTION,
        }
    }
}

impl Modifier {
    /// Parses a modifier spec word (cmd/ctrl/opt/alt/shift/caps/fn or a
    /// variant name). Non-modifier keys fail.
    pub fn from_spec(s: &str) -> Option<Self> {
        Key::from_spec(s).and_then(|k| Self::try_from(k).ok())
    }

    /// Returns the canonical spec string for this modifier, always lowercased.
    pub fn to_spec(self) -> String {
        match self {
            Modifier::Command => "cmd".to_string(),
            Modifier::Control => "ctrl".to_string(),
            Modifier::Option => "opt".to_string(),
            Modifier::Function => "fn".to_string(),
            _ => Key::from(self).name().to_ascii_lowercase(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modifier_specs() {
        assert_eq!(Modifier::from_spec("cmd"), Some(Modifier::Command));
        assert_eq!(Modifier::from_spec("alt"), Some(Modifier::Option));
        assert_eq!(Modifier::from_spec("caps"), Some(Modifier::CapsLock));
        assert_eq!(Modifier::from_spec("fn"), Some(Modifier::Function));
        assert_eq!(Modifier::from_spec("k"), None);
        assert_eq!(Modifier::Command.to_spec(), "cmd");
        assert_eq!(Modifier::Shift.to_spec(), "shift");
    }

    #[test]
    fn sided_modifiers_share_flags() {
        assert_eq!(
            Modifiers::from(Modifier::RightCommand),
            Modifiers::from(Modifier::Command)
        );
        assert_eq!(Modifiers::from(Modifier::Function), Modifiers::FUNCTION);
    }

    #[test]
    fn cg_flags_truncate_unknown_bits() {
        // Device-dependent left-control bit (0x1) and non-coalesced bit (0x100) drop out.
        let raw = (1 << 18) | (1 << 20) | 0x1 | 0x100;
        let m = Modifiers::from_cg_flags(raw);
        assert_eq!(m, Modifiers::CONTROL | Modifiers::COMMAND);
    }

    #[test]
    fn keys_follow_posting_order() {
        let m = Modifiers::COMMAND | Modifiers::CONTROL;
        assert_eq!(m.keys(), vec![Key::Control, Key::Command]);
        assert!(Modifiers::empty().keys().is_empty());
    }
}
