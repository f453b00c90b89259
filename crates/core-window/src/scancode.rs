//! Fixed key-to-scancode table.
//!
//! The guest sees legacy PC BIOS scan codes in `key_down`/`key_up` signals;
//! the mapping never varies by platform or layout.

/// Logical keys the windowing layer reports. Anything outside this set
/// never reaches the guest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Char(char),
    Digit(u8),
    LeftShift,
    LeftControl,
    Enter,
    Backspace,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    Delete,
    F(u8),
}

impl Key {
    /// The character a control chord delivers as its codepoint, when the
    /// key has one.
    pub fn base_char(&self) -> Option<char> {
        match *self {
            Key::Char(c) => Some(c.to_ascii_lowercase()),
            Key::Digit(d) => Some((b'0' + d) as char),
            Key::Enter => Some('\r'),
            Key::Backspace => Some('\u{8}'),
            _ => None,
        }
    }
}

/// Legacy BIOS scan code for a key, or `None` for keys outside the table.
pub fn scancode_for(key: Key) -> Option<u16> {
    let code = match key {
        Key::Digit(1) => 0x02,
        Key::Digit(2) => 0x03,
        Key::Digit(3) => 0x04,
        Key::Digit(4) => 0x05,
        Key::Digit(5) => 0x06,
        Key::Digit(6) => 0x07,
        Key::Digit(7) => 0x08,
        Key::Digit(8) => 0x09,
        Key::Digit(9) => 0x0A,
        Key::Digit(0) => 0x0B,
        Key::Digit(_) => return None,
        Key::Char(c) => match c.to_ascii_lowercase() {
            'a' => 0x1E,
            'b' => 0x30,
            'c' => 0x2E,
            'd' => 0x20,
            'e' => 0x12,
            'f' => 0x21,
            'g' => 0x22,
            'h' => 0x23,
            'i' => 0x17,
            'j' => 0x24,
            'k' => 0x25,
            'l' => 0x26,
            'm' => 0x32,
            'n' => 0x31,
            'o' => 0x18,
            'p' => 0x19,
            'q' => 0x10,
            'r' => 0x13,
            's' => 0x1F,
            't' => 0x14,
            'u' => 0x16,
            'v' => 0x2F,
            'w' => 0x11,
            'x' => 0x2D,
            'y' => 0x15,
            'z' => 0x2C,
            _ => return None,
        },
        Key::LeftShift => 0x2A,
        Key::LeftControl => 0x1D,
        Key::Backspace => 0x0E,
        Key::Enter => 0x1C,
        Key::Up => 0xC8,
        Key::Down => 0xD0,
        Key::Left => 0xCB,
        Key::Right => 0xCD,
        Key::Home => 0xC7,
        Key::End => 0xCF,
        Key::Delete => 0xD3,
        Key::F(n) => match n {
            1 => 0x3B,
            2 => 0x3C,
            3 => 0x3E,
            4 => 0x3F,
            5 => 0x40,
            6 => 0x41,
            7 => 0x42,
            8 => 0x43,
            9 => 0x44,
            10 => 0x45,
            11 => 0x57,
            12 => 0x58,
            13 => 0x64,
            14 => 0x65,
            15 => 0x66,
            16 => 0x67,
            17 => 0x68,
            18 => 0x69,
            19 => 0x71,
            _ => return None,
        },
    };
    Some(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bios_codes_for_letters_and_digits() {
        assert_eq!(scancode_for(Key::Char('a')), Some(0x1E));
        assert_eq!(scancode_for(Key::Char('Z')), Some(0x2C));
        assert_eq!(scancode_for(Key::Digit(1)), Some(0x02));
        assert_eq!(scancode_for(Key::Digit(0)), Some(0x0B));
    }

    #[test]
    fn control_and_navigation_keys() {
        assert_eq!(scancode_for(Key::LeftShift), Some(0x2A));
        assert_eq!(scancode_for(Key::LeftControl), Some(0x1D));
        assert_eq!(scancode_for(Key::Enter), Some(0x1C));
        assert_eq!(scancode_for(Key::Backspace), Some(0x0E));
        assert_eq!(scancode_for(Key::Up), Some(0xC8));
        assert_eq!(scancode_for(Key::Delete), Some(0xD3));
    }

    #[test]
    fn function_keys_keep_the_historical_gap() {
        assert_eq!(scancode_for(Key::F(2)), Some(0x3C));
        assert_eq!(scancode_for(Key::F(3)), Some(0x3E));
        assert_eq!(scancode_for(Key::F(19)), Some(0x71));
        assert_eq!(scancode_for(Key::F(20)), None);
    }

    #[test]
    fn base_characters() {
        assert_eq!(Key::Char('Q').base_char(), Some('q'));
        assert_eq!(Key::Enter.base_char(), Some('\r'));
        assert_eq!(Key::F(1).base_char(), None);
    }
}
