//! Key input: raw key events, the configurable key map, and console parsing.
//!
//! The console stands in for a handset keypad.  Each character of an input
//! line becomes one key press (a key-down followed by a key-up):
//!
//! | Character | Key |
//! |---|---|
//! | `0`-`9` | digit key, raw code = ASCII code |
//! | `f` | fire |
//! | `s` | soft-left |
//! | `u` | up |
//! | `d` | down |
//!
//! Whitespace is skipped; any other character is reported back so the caller
//! can log it.

use crate::application::browser::Key;
use crate::infrastructure::storage::config::KeyConfig;

/// A raw key event carrying an opaque key code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawKeyEvent {
    KeyDown(u32),
    KeyUp(u32),
}

/// Translates raw key codes into browser [`Key`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyMap {
    codes: KeyConfig,
}

impl KeyMap {
    pub fn new(codes: KeyConfig) -> Self {
        Self { codes }
    }

    /// Maps a key-down event to a [`Key`].  Key-up events and unmapped codes
    /// yield `None`.
    pub fn translate(&self, event: RawKeyEvent) -> Option<Key> {
        let RawKeyEvent::KeyDown(code) = event else {
            return None;
        };
        let c = &self.codes;
        match code {
            _ if code == c.exit => Some(Key::Exit),
            _ if code == c.primary => Some(Key::Primary),
            _ if code == c.delete => Some(Key::Delete),
            _ if code == c.fire => Some(Key::Fire),
            _ if code == c.soft_left => Some(Key::SoftLeft),
            _ if code == c.up => Some(Key::Up),
            _ if code == c.down => Some(Key::Down),
            _ => None,
        }
    }

    /// Raw code produced by a console character, if the character is a key.
    pub fn code_for_char(&self, ch: char) -> Option<u32> {
        match ch {
            '0'..='9' => Some(u32::from(ch)),
            'f' | 'F' => Some(self.codes.fire),
            's' | 'S' => Some(self.codes.soft_left),
            'u' | 'U' => Some(self.codes.up),
            'd' | 'D' => Some(self.codes.down),
            _ => None,
        }
    }
}

impl Default for KeyMap {
    fn default() -> Self {
        Self::new(KeyConfig::default())
    }
}

/// Result of parsing one console line.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ParsedLine {
    pub events: Vec<RawKeyEvent>,
    pub unknown: Vec<char>,
}

/// Turns a console line into key-down/key-up pairs.
pub fn parse_console_line(keymap: &KeyMap, line: &str) -> ParsedLine {
    let mut parsed = ParsedLine::default();
    for ch in line.chars().filter(|c| !c.is_whitespace()) {
        match keymap.code_for_char(ch) {
            Some(code) => {
                parsed.events.push(RawKeyEvent::KeyDown(code));
                parsed.events.push(RawKeyEvent::KeyUp(code));
            }
            None => parsed.unknown.push(ch),
        }
    }
    parsed
}
