//! Key spec strings: the textual form used by configuration files.

use crate::Key;

/// Symbol forms emitted by `to_spec` and accepted verbatim by `from_spec`.
const SYMBOLS: &[(Key, &str)] = &[
    (Key::Digit0, "0"),
    (Key::Digit1, "1"),
    (Key::Digit2, "2"),
    (Key::Digit3, "3"),
    (Key::Digit4, "4"),
    (Key::Digit5, "5"),
    (Key::Digit6, "6"),
    (Key::Digit7, "7"),
    (Key::Digit8, "8"),
    (Key::Digit9, "9"),
    (Key::Minus, "-"),
    (Key::Equal, "="),
    (Key::LeftBracket, "["),
    (Key::RightBracket, "]"),
    (Key::Backslash, "\\"),
    (Key::Semicolon, ";"),
    (Key::Quote, "'"),
    (Key::Comma, ","),
    (Key::Period, "."),
    (Key::Slash, "/"),
    (Key::Grave, "`"),
];

/// Parse-only alias words, matched case-insensitively.
const ALIASES: &[(&str, Key)] = &[
    ("cmd", Key::Command),
    ("rcmd", Key::RightCommand),
    ("ctrl", Key::Control),
    ("rctrl", Key::RightControl),
    ("opt", Key::Option),
    ("alt", Key::Option),
    ("ropt", Key::RightOption),
    ("ralt", Key::RightOption),
    ("rshift", Key::RightShift),
    ("caps", Key::CapsLock),
    ("fn", Key::Function),
    ("enter", Key::Return),
    ("ret", Key::Return),
    ("esc", Key::Escape),
    ("space", Key::Space),
    ("backspace", Key::Delete),
    ("del", Key::ForwardDelete),
    ("fwddel", Key::ForwardDelete),
    ("left", Key::LeftArrow),
    ("right", Key::RightArrow),
    ("up", Key::UpArrow),
    ("down", Key::DownArrow),
    ("pgup", Key::PageUp),
    ("pgdn", Key::PageDown),
];

/// Parses a key specification into a `Key`.
///
/// Tries, in order: the variant name (case-insensitive), the symbol forms for
/// digits and punctuation, a literal `" "` for space, then the alias words.
pub fn from_spec(s: &str) -> Option<Key> {
    if let Some(k) = Key::from_name(s) {
        return Some(k);
    }
    if s == " " {
        return Some(Key::Space);
    }
    if let Some((k, _)) = SYMBOLS.iter().find(|(_, sym)| *sym == s) {
        return Some(*k);
    }
    ALIASES
        .iter()
        .find(|(alias, _)| alias.eq_ignore_ascii_case(s))
        .map(|(_, k)| *k)
}

/// Returns the spec string for a `Key`: the symbol form when one exists,
/// otherwise the lowercased variant name.
pub fn to_spec(key: Key) -> String {
    match SYMBOLS.iter().find(|(k, _)| *k == key) {
        Some((_, sym)) => (*sym).to_string(),
        None => key.name().to_ascii_lowercase(),
    }
}

impl Key {
    /// Parses a key specification string into a `Key`. See [`from_spec`].
    pub fn from_spec(s: &str) -> Option<Self> {
        from_spec(s)
    }

    /// Returns the canonical spec string for this `Key`.
    pub fn to_spec(self) -> String {
        to_spec(self)
    }
}
