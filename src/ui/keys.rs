//! Key input for the terminal panel
//!
//! Converts crossterm key events into the small key vocabulary the
//! terminal's line editor understands.

use bitflags::bitflags;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

bitflags! {
    /// Modifier keys
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b0001;
        const CTRL  = 0b0010;
        const ALT   = 0b0100;
    }
}

impl From<KeyModifiers> for Modifiers {
    fn from(mods: KeyModifiers) -> Self {
        let mut result = Modifiers::empty();
        if mods.contains(KeyModifiers::SHIFT) {
            result |= Modifiers::SHIFT;
        }
        if mods.contains(KeyModifiers::CONTROL) {
            result |= Modifiers::CTRL;
        }
        if mods.contains(KeyModifiers::ALT) {
            result |= Modifiers::ALT;
        }
        result
    }
}

/// Keys the line editor distinguishes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Enter,
    Backspace,
    Delete,
    Left,
    Right,
    Home,
    End,
    Other,
}

/// A key press with its modifiers
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyInput {
    pub key: Key,
    pub mods: Modifiers,
}

impl KeyInput {
    pub fn new(key: Key) -> Self {
        Self {
            key,
            mods: Modifiers::empty(),
        }
    }

    pub fn with_mods(key: Key, mods: Modifiers) -> Self {
        Self { key, mods }
    }

    pub fn ctrl(&self) -> bool {
        self.mods.contains(Modifiers::CTRL)
    }

    /// True for characters that are inserted into the input line
    pub fn is_printable(&self) -> bool {
        matches!(self.key, Key::Char(ch) if !ch.is_control())
    }
}

impl From<&KeyEvent> for KeyInput {
    fn from(event: &KeyEvent) -> Self {
        let key = match event.code {
            KeyCode::Char(ch) => Key::Char(ch),
            // Numpad enter arrives as Enter as well
            KeyCode::Enter => Key::Enter,
            KeyCode::Backspace => Key::Backspace,
            KeyCode::Delete => Key::Delete,
            KeyCode::Left => Key::Left,
            KeyCode::Right => Key::Right,
            KeyCode::Home => Key::Home,
            KeyCode::End => Key::End,
            _ => Key::Other,
        };
        Self {
            key,
            mods: Modifiers::from(event.modifiers),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_event(code: KeyCode, mods: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, mods)
    }

    #[test]
    fn test_char_keys() {
        let input = KeyInput::from(&key_event(KeyCode::Char('a'), KeyModifiers::NONE));
        assert_eq!(input.key, Key::Char('a'));
        assert!(input.is_printable());
        assert!(!input.ctrl());

        let input = KeyInput::from(&key_event(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(input.ctrl());
    }

    #[test]
    fn test_modifier_mapping() {
        let mods = Modifiers::from(KeyModifiers::SHIFT | KeyModifiers::ALT);
        assert_eq!(mods, Modifiers::SHIFT | Modifiers::ALT);
    }

    #[test]
    fn test_editing_keys() {
        let input = KeyInput::from(&key_event(KeyCode::Backspace, KeyModifiers::NONE));
        assert_eq!(input.key, Key::Backspace);
        assert!(!input.is_printable());

        let input = KeyInput::from(&key_event(KeyCode::F(5), KeyModifiers::NONE));
        assert_eq!(input.key, Key::Other);
    }
}
