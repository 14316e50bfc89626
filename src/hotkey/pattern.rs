//! Hotkey patterns: a validated modifier set plus key, or a bare function key.
//!
//! Grammar:
//! ```text
//! Pattern  := 'F' [1-9] | 'F1' [0-2]
//!           | (Modifier '+')+ KeyName
//! Modifier := 'Ctrl' | 'Alt' | 'Shift' | 'Win'
//! KeyName  := [A-Za-z0-9_]+
//! ```

use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;
use thiserror::Error;

bitflags! {
    /// Modifier keys held while the terminal key is pressed.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
    pub struct Modifiers: u8 {
        const CTRL = 1 << 0;
        const ALT = 1 << 1;
        const SHIFT = 1 << 2;
        const WIN = 1 << 3;
    }
}

impl Modifiers {
    /// Look up a modifier by its source spelling.
    pub fn from_source_name(name: &str) -> Option<Self> {
        match name {
            "Ctrl" => Some(Self::CTRL),
            "Alt" => Some(Self::ALT),
            "Shift" => Some(Self::SHIFT),
            "Win" => Some(Self::WIN),
            _ => None,
        }
    }

    fn names(self) -> impl Iterator<Item = &'static str> {
        [
            (Self::CTRL, "Ctrl"),
            (Self::ALT, "Alt"),
            (Self::SHIFT, "Shift"),
            (Self::WIN, "Win"),
        ]
        .into_iter()
        .filter(move |(flag, _)| self.contains(*flag))
        .map(|(_, name)| name)
    }
}

/// A terminal key name, normalized to lowercase with `_` separators removed,
/// so `Page_Up` and `pageup` name the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Key(String);

impl Key {
    pub fn new(name: &str) -> Self {
        let joined: String = name
            .chars()
            .filter(|c| *c != '_')
            .map(|c| c.to_ascii_lowercase())
            .collect();
        if joined.is_empty() {
            Self(name.to_ascii_lowercase())
        } else {
            Self(joined)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Function key index when this key is `f1`..`f12`.
    pub fn function_index(&self) -> Option<u8> {
        parse_function_key(&self.0)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A validated hotkey pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HotkeyPattern {
    /// One or more modifiers plus a terminal key, e.g. `Ctrl+Alt+t`.
    Chord { modifiers: Modifiers, key: Key },
    /// A bare function key `F1`..`F12`.
    Function(u8),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid hotkey pattern: '{0}'")]
pub struct HotkeyParseError(pub String);

impl HotkeyPattern {
    /// Validate `text` against the hotkey grammar.
    pub fn parse(text: &str) -> Option<Self> {
        if let Some(n) = parse_function_key(text) {
            return Some(Self::Function(n));
        }

        let mut parts = text.split('+');
        let key = parts.next_back()?;
        let mut modifiers = Modifiers::empty();
        let mut count = 0;
        for part in parts {
            let m = Modifiers::from_source_name(part)?;
            if modifiers.contains(m) {
                return None;
            }
            modifiers |= m;
            count += 1;
        }
        if count == 0 || !is_key_name(key) {
            return None;
        }

        Some(Self::Chord {
            modifiers,
            key: Key::new(key),
        })
    }

    /// Build the pattern a physical key press corresponds to.
    ///
    /// A function key pressed without modifiers is normalized to
    /// [`HotkeyPattern::Function`], so both spellings land on the same entry.
    pub fn from_parts(modifiers: Modifiers, key: Key) -> Self {
        match key.function_index() {
            Some(n) if modifiers.is_empty() => Self::Function(n),
            _ => Self::Chord { modifiers, key },
        }
    }
}

impl FromStr for HotkeyPattern {
    type Err = HotkeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| HotkeyParseError(s.to_string()))
    }
}

impl fmt::Display for HotkeyPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Function(n) => write!(f, "F{n}"),
            Self::Chord { modifiers, key } => {
                for name in modifiers.names() {
                    write!(f, "{name}+")?;
                }
                write!(f, "{key}")
            }
        }
    }
}

fn is_key_name(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// `F1`..`F12` (either case), no leading zeros.
fn parse_function_key(s: &str) -> Option<u8> {
    let digits = s.strip_prefix('F').or_else(|| s.strip_prefix('f'))?;
    if digits.is_empty() || digits.len() > 2 || digits.starts_with('0') {
        return None;
    }
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let n: u8 = digits.parse().ok()?;
    (1..=12).contains(&n).then_some(n)
}
