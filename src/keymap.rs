use std::fmt;

use serde::{Deserialize, Serialize};

use Modifier::{Control, Shift};

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Lowest MIDI note covered by the reference layout (C3).
pub const LAYOUT_LOW: u8 = 48;

/// A secondary key held while the primary key is tapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modifier {
    Shift,
    Control,
}

impl Modifier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Modifier::Shift => "shift",
            Modifier::Control => "control",
        }
    }
}

/// One tap: a primary key symbol and at most one modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyPress {
    pub key: char,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modifier: Option<Modifier>,
}

impl KeyPress {
    pub const fn plain(key: char) -> Self {
        Self {
            key,
            modifier: None,
        }
    }

    pub const fn with(key: char, modifier: Modifier) -> Self {
        Self {
            key,
            modifier: Some(modifier),
        }
    }
}

impl fmt::Display for KeyPress {
    // "s-a" for shift+a, "c-c" for control+c, bare key otherwise
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.modifier {
            Some(m) => write!(f, "{}-{}", &m.as_str()[..1], self.key),
            None => write!(f, "{}", self.key),
        }
    }
}

const REFERENCE_LAYOUT: [KeyPress; 36] = [
    // C3 .. B3
    KeyPress::plain('z'),
    KeyPress::with('z', Shift),
    KeyPress::plain('x'),
    KeyPress::with('c', Control),
    KeyPress::plain('c'),
    KeyPress::plain('v'),
    KeyPress::with('v', Shift),
    KeyPress::plain('b'),
    KeyPress::with('b', Shift),
    KeyPress::plain('n'),
    KeyPress::with('m', Control),
    KeyPress::plain('m'),
    // C4 .. B4
    KeyPress::plain('a'),
    KeyPress::with('a', Shift),
    KeyPress::plain('s'),
    KeyPress::with('s', Control),
    KeyPress::plain('d'),
    KeyPress::plain('f'),
    KeyPress::with('f', Shift),
    KeyPress::plain('g'),
    KeyPress::with('g', Shift),
    KeyPress::plain('h'),
    KeyPress::with('j', Control),
    KeyPress::plain('j'),
    // C5 .. B5
    KeyPress::plain('q'),
    KeyPress::with('q', Shift),
    KeyPress::plain('w'),
    KeyPress::with('e', Control),
    KeyPress::plain('e'),
    KeyPress::plain('r'),
    KeyPress::with('r', Shift),
    KeyPress::plain('t'),
    KeyPress::with('t', Shift),
    KeyPress::plain('y'),
    KeyPress::with('u', Control),
    KeyPress::plain('u'),
];

/// Maps MIDI note numbers onto a contiguous chromatic run of key presses.
#[derive(Debug, Clone)]
pub struct KeyMap {
    low: u8,
    presses: Vec<KeyPress>,
}

impl Default for KeyMap {
    fn default() -> Self {
        Self::new(LAYOUT_LOW, REFERENCE_LAYOUT.to_vec())
    }
}

impl KeyMap {
    pub fn new(low: u8, presses: Vec<KeyPress>) -> Self {
        Self { low, presses }
    }

    /// Returns `None` for notes outside the layout. Never panics.
    pub fn lookup(&self, note: u8) -> Option<KeyPress> {
        let offset = note.checked_sub(self.low)?;
        self.presses.get(offset as usize).copied()
    }

    /// Inclusive note range covered, or `None` for an empty layout.
    pub fn range(&self) -> Option<(u8, u8)> {
        let len = u8::try_from(self.presses.len()).ok()?;
        if len == 0 {
            return None;
        }
        Some((self.low, self.low.saturating_add(len - 1)))
    }
}

/// Scientific pitch name, e.g. 60 -> "C4".
pub fn note_name(note: u8) -> String {
    let octave = (note / 12) as i32 - 1;
    format!("{}{}", NOTE_NAMES[(note % 12) as usize], octave)
}
