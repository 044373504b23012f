use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::{Key, Modifier, Modifiers};

/// A single keystroke: a set of modifier flags plus one key.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Keystroke {
    /// Modifier flags held for this keystroke.
    pub modifiers: Modifiers,
    /// The key pressed.
    pub key: Key,
}

/// Canonical emission order for modifiers in spec strings.
const ORDER: &[(Modifiers, &str)] = &[
    (Modifiers::COMMAND, "cmd"),
    (Modifiers::OPTION, "opt"),
    (Modifiers::CONTROL, "ctrl"),
    (Modifiers::SHIFT, "shift"),
    (Modifiers::FUNCTION, "fn"),
    (Modifiers::CAPS_LOCK, "capslock"),
];

impl Keystroke {
    /// A keystroke without modifiers.
    pub fn bare(key: Key) -> Self {
        Self {
            modifiers: Modifiers::empty(),
            key,
        }
    }

    /// Parses a keystroke specification of the form `"shift+opt+k"`.
    ///
    /// - Case-insensitive for both modifiers and the key.
    /// - Components are separated by `+`; the last component is the key.
    /// - A trailing literal space is accepted as the space key.
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts: Vec<&str> = s.split('+').collect();
        let key_raw = parts.pop()?;
        let key = if key_raw == " " {
            Key::Space
        } else {
            Key::from_spec(key_raw.trim())?
        };
        let mut modifiers = Modifiers::empty();
        for part in parts {
            let part = part.trim();
            if part.is_empty() {
                return None;
            }
            modifiers |= Modifiers::from(Modifier::from_spec(part)?);
        }
        Some(Self { modifiers, key })
    }

    /// Canonical string form: modifiers in a fixed order, then the key spec.
    pub fn to_string_canonical(&self) -> String {
        let mut out: Vec<String> = ORDER
            .iter()
            .filter(|(flag, _)| self.modifiers.contains(*flag))
            .map(|(_, name)| (*name).to_string())
            .collect();
        out.push(self.key.to_spec());
        out.join("+")
    }
}

impl fmt::Display for Keystroke {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_string_canonical())
    }
}

impl Serialize for Keystroke {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Keystroke {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).ok_or_else(|| de::Error::custom(format!("invalid keystroke: {s:?}")))
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn parse_basic() {
        let k = Keystroke::parse("shift+opt+k").expect("parse");
        assert_eq!(k.modifiers, Modifiers::SHIFT | Modifiers::OPTION);
        assert_eq!(k.key, Key::K);
        assert_eq!(k.to_string(), "opt+shift+k");
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(Keystroke::parse(""), None);
        assert_eq!(Keystroke::parse("cmd++k"), None);
        assert_eq!(Keystroke::parse("k+cmd"), None);
        assert_eq!(Keystroke::parse("hyper+k"), None);
    }

    #[test]
    fn bare_modifier_key() {
        let k = Keystroke::parse("esc").expect("parse");
        assert_eq!(k, Keystroke::bare(Key::Escape));
        let k = Keystroke::parse("ctrl").expect("parse");
        assert_eq!(k.key, Key::Control);
        assert!(k.modifiers.is_empty());
    }

    #[test]
    fn deserializes_from_spec_string() {
        let k: Keystroke = ron::from_str("\"cmd+1\"").expect("ron");
        assert_eq!(k.modifiers, Modifiers::COMMAND);
        assert_eq!(k.key, Key::Digit1);
        assert!(ron::from_str::<Keystroke>("\"cmd+nothing\"").is_err());
    }

    proptest! {
        #[test]
        fn canonical_form_reparses(idx in 0usize..Key::ALL.len(), bits in 0u8..64) {
            let mut modifiers = Modifiers::empty();
            for (i, (flag, _)) in ORDER.iter().enumerate() {
                if bits & (1 << i) != 0 {
                    modifiers |= *flag;
                }
            }
            let k = Keystroke { modifiers, key: Key::ALL[idx] };
            let spec = k.to_string();
            prop_assert_eq!(Keystroke::parse(&spec), Some(k));
        }
    }
}
