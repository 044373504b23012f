//! US-ANSI character table, used when an event carries no OS-provided text.

use crate::Key;

impl Key {
    /// The character this key produces on a US-ANSI layout, if printable.
    pub fn to_char(self, shift: bool) -> Option<char> {
        let (plain, shifted) = match self {
            Key::A => ('a', 'A'),
            Key::B => ('b', 'B'),
            Key::C => ('c', 'C'),
            Key::D => ('d', 'D'),
            Key::E => ('e', 'E'),
            Key::F => ('f', 'F'),
            Key::G => ('g', 'G'),
            Key::H => ('h', 'H'),
            Key::I => ('i', 'I'),
            Key::J => ('j', 'J'),
            Key::K => ('k', 'K'),
            Key::L => ('l', 'L'),
            Key::M => ('m', 'M'),
            Key::N => ('n', 'N'),
            Key::O => ('o', 'O'),
            Key::P => ('p', 'P'),
            Key::Q => ('q', 'Q'),
            Key::R => ('r', 'R'),
            Key::S => ('s', 'S'),
            Key::T => ('t', 'T'),
            Key::U => ('u', 'U'),
            Key::V => ('v', 'V'),
            Key::W => ('w', 'W'),
            Key::X => ('x', 'X'),
            Key::Y => ('y', 'Y'),
            Key::Z => ('z', 'Z'),
            Key::Digit0 => ('0', ')'),
            Key::Digit1 => ('1', '!'),
            Key::Digit2 => ('2', '@'),
            Key::Digit3 => ('3', '#'),
            Key::Digit4 => ('4', '$'),
            Key::Digit5 => ('5', '%'),
            Key::Digit6 => ('6', '^'),
            Key::Digit7 => ('7', '&'),
            Key::Digit8 => ('8', '*'),
            Key::Digit9 => ('9', '('),
            Key::Minus => ('-', '_'),
            Key::Equal => ('=', '+'),
            Key::LeftBracket => ('[', '{'),
            Key::RightBracket => (']', '}'),
            Key::Backslash => ('\\', '|'),
            Key::Semicolon => (';', ':'),
            Key::Quote => ('\'', '"'),
            Key::Comma => (',', '<'),
            Key::Period => ('.', '>'),
            Key::Slash => ('/', '?'),
            Key::Grave => ('`', '~'),
            Key::Space => (' ', ' '),
            _ => return None,
        };
        Some(if shift { shifted } else { plain })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letters_and_shifted_symbols() {
        assert_eq!(Key::B.to_char(false), Some('b'));
        assert_eq!(Key::B.to_char(true), Some('B'));
        assert_eq!(Key::Digit1.to_char(true), Some('!'));
        assert_eq!(Key::Space.to_char(false), Some(' '));
        assert_eq!(Key::Return.to_char(false), None);
        assert_eq!(Key::Command.to_char(true), None);
    }
}
