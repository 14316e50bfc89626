//! Raw key presses as delivered to the registry.

use crossterm::event::{KeyCode, KeyEventKind, KeyModifiers};

use super::pattern::{HotkeyPattern, Key, Modifiers};

/// A key press: held modifiers plus the pressed key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyEvent {
    pub modifiers: Modifiers,
    pub key: Key,
}

impl KeyEvent {
    pub fn new(modifiers: Modifiers, key: &str) -> Self {
        Self {
            modifiers,
            key: Key::new(key),
        }
    }

    /// The press that would trigger `pattern`.
    pub fn from_pattern(pattern: &HotkeyPattern) -> Self {
        match pattern {
            HotkeyPattern::Chord { modifiers, key } => Self {
                modifiers: *modifiers,
                key: key.clone(),
            },
            HotkeyPattern::Function(n) => Self::new(Modifiers::empty(), &format!("f{n}")),
        }
    }

    /// Pattern lookup key for this press.
    pub fn pattern(&self) -> HotkeyPattern {
        HotkeyPattern::from_parts(self.modifiers, self.key.clone())
    }

    /// Convert a terminal key event. Releases and keys with no name map to `None`.
    pub fn from_crossterm(event: &crossterm::event::KeyEvent) -> Option<Self> {
        if event.kind == KeyEventKind::Release {
            return None;
        }

        let mut modifiers = Modifiers::empty();
        if event.modifiers.contains(KeyModifiers::CONTROL) {
            modifiers |= Modifiers::CTRL;
        }
        if event.modifiers.contains(KeyModifiers::ALT) {
            modifiers |= Modifiers::ALT;
        }
        if event.modifiers.contains(KeyModifiers::SHIFT) {
            modifiers |= Modifiers::SHIFT;
        }
        if event.modifiers.contains(KeyModifiers::SUPER) {
            modifiers |= Modifiers::WIN;
        }

        let name = match event.code {
            KeyCode::Char(' ') => "space".to_string(),
            KeyCode::Char(c) if c.is_ascii_uppercase() => {
                modifiers |= Modifiers::SHIFT;
                c.to_ascii_lowercase().to_string()
            }
            KeyCode::Char(c) => c.to_string(),
            KeyCode::F(n) => format!("f{n}"),
            KeyCode::BackTab => {
                modifiers |= Modifiers::SHIFT;
                "tab".to_string()
            }
            KeyCode::Tab => "tab".to_string(),
            KeyCode::Enter => "enter".to_string(),
            KeyCode::Esc => "esc".to_string(),
            KeyCode::Backspace => "backspace".to_string(),
            KeyCode::Delete => "delete".to_string(),
            KeyCode::Insert => "insert".to_string(),
            KeyCode::Home => "home".to_string(),
            KeyCode::End => "end".to_string(),
            KeyCode::PageUp => "pageup".to_string(),
            KeyCode::PageDown => "pagedown".to_string(),
            KeyCode::Up => "up".to_string(),
            KeyCode::Down => "down".to_string(),
            KeyCode::Left => "left".to_string(),
            KeyCode::Right => "right".to_string(),
            _ => return None,
        };

        Some(Self::new(modifiers, &name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEvent as TermKey;

    fn term(code: KeyCode, modifiers: KeyModifiers) -> TermKey {
        TermKey::new(code, modifiers)
    }

    #[test]
    fn ctrl_alt_letter() {
        let ev = KeyEvent::from_crossterm(&term(
            KeyCode::Char('t'),
            KeyModifiers::CONTROL | KeyModifiers::ALT,
        ))
        .unwrap();
        assert_eq!(ev.pattern(), "Ctrl+Alt+t".parse::<HotkeyPattern>().unwrap());
    }

    #[test]
    fn uppercase_char_implies_shift() {
        let ev =
            KeyEvent::from_crossterm(&term(KeyCode::Char('A'), KeyModifiers::CONTROL)).unwrap();
        assert_eq!(ev.modifiers, Modifiers::CTRL | Modifiers::SHIFT);
        assert_eq!(ev.key.as_str(), "a");
    }

    #[test]
    fn named_keys() {
        let ev = KeyEvent::from_crossterm(&term(KeyCode::Enter, KeyModifiers::SHIFT)).unwrap();
        assert_eq!(ev.pattern(), "Shift+Enter".parse::<HotkeyPattern>().unwrap());
        let ev = KeyEvent::from_crossterm(&term(KeyCode::Char(' '), KeyModifiers::CONTROL)).unwrap();
        assert_eq!(ev.pattern(), "Ctrl+space".parse::<HotkeyPattern>().unwrap());
    }

    #[test]
    fn page_keys_match_underscored_spelling() {
        let ev = KeyEvent::from_crossterm(&term(KeyCode::PageUp, KeyModifiers::CONTROL)).unwrap();
        assert_eq!(ev.pattern(), "Ctrl+page_up".parse::<HotkeyPattern>().unwrap());
        let ev = KeyEvent::from_crossterm(&term(KeyCode::PageDown, KeyModifiers::ALT)).unwrap();
        assert_eq!(ev.pattern(), "Alt+Page_Down".parse::<HotkeyPattern>().unwrap());
    }

    #[test]
    fn bare_function_key_matches_function_pattern() {
        let ev = KeyEvent::from_crossterm(&term(KeyCode::F(7), KeyModifiers::NONE)).unwrap();
        assert_eq!(ev.pattern(), HotkeyPattern::Function(7));
        let ev = KeyEvent::from_crossterm(&term(KeyCode::F(7), KeyModifiers::CONTROL)).unwrap();
        assert_eq!(ev.pattern(), "Ctrl+F7".parse::<HotkeyPattern>().unwrap());
    }

    #[test]
    fn from_pattern_round_trips() {
        for text in ["Ctrl+Alt+t", "F12", "Win+Shift+x"] {
            let pattern: HotkeyPattern = text.parse().unwrap();
            assert_eq!(KeyEvent::from_pattern(&pattern).pattern(), pattern);
        }
    }

    #[test]
    fn unnamed_keys_are_ignored() {
        assert!(KeyEvent::from_crossterm(&term(KeyCode::Null, KeyModifiers::NONE)).is_none());
    }
}
