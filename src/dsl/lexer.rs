//! Lexer for the hotscript language.
//!
//! Converts source text into a stream of [`Token`]s ending in
//! [`TokenKind::EndOfInput`]. The only failure is an unterminated string;
//! anything else that looks wrong degrades to an ordinary token and is left
//! for the parser to reject.

use tracing::trace;

use super::error::LexError;
use super::token::{keyword, punctuation, Token, TokenKind};
use crate::hotkey::HotkeyPattern;

/// Lexer position. Copying it is a complete snapshot of lexer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Cursor {
    pos: usize,
    line: usize,
    col: usize,
}

pub struct Lexer {
    chars: Vec<char>,
    cursor: Cursor,
}

/// Tokenize `source` in one call.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(source).tokenize()
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            cursor: Cursor {
                pos: 0,
                line: 1,
                col: 1,
            },
        }
    }

    pub fn tokenize(&mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();

        loop {
            self.skip_trivia();

            if self.is_at_end() {
                let start = self.cursor;
                tokens.push(self.make(TokenKind::EndOfInput, String::new(), start));
                break;
            }

            let ch = self.peek();
            let token = match ch {
                '\n' => self.single_char(TokenKind::NewLine),
                '"' | '\'' => self.lex_string(ch)?,
                '=' => self.lex_equals_or_arrow(),
                '0'..='9' => self.lex_number(),
                '-' if self.starts_negative_literal() => self.lex_number(),
                'F' if self.peek_next().is_some_and(|c| c.is_ascii_digit()) => {
                    self.lex_hotkey_or_ident()
                }
                'C' | 'A' | 'S' | 'W' => self.lex_hotkey_or_ident(),
                c if c.is_ascii_alphabetic() || c == '_' => self.lex_ident_or_keyword(),
                c => match punctuation(c) {
                    Some(kind) => self.single_char(kind),
                    None => self.single_char(TokenKind::Unknown),
                },
            };

            tokens.push(token);
        }

        Ok(tokens)
    }

    fn peek(&self) -> char {
        self.chars[self.cursor.pos]
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.get(self.cursor.pos + 1).copied()
    }

    fn previous(&self) -> Option<char> {
        self.cursor
            .pos
            .checked_sub(1)
            .and_then(|i| self.chars.get(i).copied())
    }

    fn advance(&mut self) -> char {
        let ch = self.chars[self.cursor.pos];
        self.cursor.pos += 1;
        if ch == '\n' {
            self.cursor.line += 1;
            self.cursor.col = 1;
        } else {
            self.cursor.col += 1;
        }
        ch
    }

    fn is_at_end(&self) -> bool {
        self.cursor.pos >= self.chars.len()
    }

    fn snapshot(&self) -> Cursor {
        self.cursor
    }

    fn restore(&mut self, snapshot: Cursor) {
        self.cursor = snapshot;
    }

    fn make(&self, kind: TokenKind, text: String, start: Cursor) -> Token {
        Token {
            kind,
            value: text.clone(),
            raw: text,
            line: start.line,
            column: start.col,
        }
    }

    /// Skip spaces, tabs, carriage returns and comments. Newlines are tokens.
    fn skip_trivia(&mut self) {
        while !self.is_at_end() {
            match self.peek() {
                ' ' | '\t' | '\r' => {
                    self.advance();
                }
                '/' if self.peek_next() == Some('/') => {
                    while !self.is_at_end() && self.peek() != '\n' {
                        self.advance();
                    }
                }
                '/' if self.peek_next() == Some('*') => {
                    self.advance();
                    self.advance();
                    while !self.is_at_end() {
                        if self.peek() == '*' && self.peek_next() == Some('/') {
                            self.advance();
                            self.advance();
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn single_char(&mut self, kind: TokenKind) -> Token {
        let start = self.snapshot();
        let ch = self.advance();
        self.make(kind, ch.to_string(), start)
    }

    fn lex_equals_or_arrow(&mut self) -> Token {
        let start = self.snapshot();
        self.advance(); // consume '='
        if !self.is_at_end() && self.peek() == '>' {
            self.advance();
            self.make(TokenKind::Arrow, "=>".to_string(), start)
        } else {
            self.make(TokenKind::Equals, "=".to_string(), start)
        }
    }

    fn lex_string(&mut self, quote: char) -> Result<Token, LexError> {
        let start = self.snapshot();
        let unterminated = LexError::UnterminatedString {
            line: start.line,
            column: start.col,
        };
        self.advance(); // consume opening quote

        let mut value = String::new();
        let mut raw = String::new();
        loop {
            if self.is_at_end() {
                return Err(unterminated);
            }
            let ch = self.advance();
            if ch == quote {
                break;
            }
            if ch != '\\' {
                value.push(ch);
                raw.push(ch);
                continue;
            }
            if self.is_at_end() {
                return Err(unterminated);
            }
            let escaped = self.advance();
            raw.push('\\');
            raw.push(escaped);
            match escaped {
                'n' => value.push('\n'),
                't' => value.push('\t'),
                'r' => value.push('\r'),
                '\\' | '"' | '\'' => value.push(escaped),
                other => {
                    value.push('\\');
                    value.push(other);
                }
            }
        }

        Ok(Token {
            kind: TokenKind::String,
            value,
            raw,
            line: start.line,
            column: start.col,
        })
    }

    /// A `-` folds into the following number only when it is followed by a
    /// digit and the character right before it does not end an operand.
    /// `x - 5`, `x-5`, `f()-1` and `"a"-1` subtract; `= -5` and `a -5` are
    /// negative literals.
    fn starts_negative_literal(&self) -> bool {
        let digit_follows = self.peek_next().is_some_and(|c| c.is_ascii_digit());
        let after_operand = self.previous().is_some_and(|c| {
            c.is_ascii_alphanumeric() || matches!(c, '_' | ')' | '"' | '\'')
        });
        digit_follows && !after_operand
    }

    fn lex_number(&mut self) -> Token {
        let start = self.snapshot();
        let mut s = String::new();

        if self.peek() == '-' {
            s.push(self.advance());
        }
        while !self.is_at_end() && self.peek().is_ascii_digit() {
            s.push(self.advance());
        }
        let has_fraction = !self.is_at_end()
            && self.peek() == '.'
            && self.peek_next().is_some_and(|c| c.is_ascii_digit());
        if has_fraction {
            s.push(self.advance()); // consume '.'
            while !self.is_at_end() && self.peek().is_ascii_digit() {
                s.push(self.advance());
            }
        }

        self.make(TokenKind::Number, s, start)
    }

    /// Speculatively scan a hotkey candidate. On a grammar miss, rewind to
    /// the snapshot and lex the same text as an identifier.
    fn lex_hotkey_or_ident(&mut self) -> Token {
        let start = self.snapshot();
        let mut text = String::new();
        while !self.is_at_end() && is_hotkey_char(self.peek()) {
            text.push(self.advance());
        }

        if let Some(pattern) = HotkeyPattern::parse(&text) {
            return self.make(TokenKind::Hotkey(pattern), text, start);
        }

        trace!(candidate = %text, line = start.line, col = start.col, "not a hotkey, backtracking");
        self.restore(start);
        self.lex_ident_or_keyword()
    }

    fn lex_ident_or_keyword(&mut self) -> Token {
        let start = self.snapshot();
        let mut s = String::new();

        while !self.is_at_end() && (self.peek().is_ascii_alphanumeric() || self.peek() == '_') {
            s.push(self.advance());
        }

        let kind = keyword(&s).unwrap_or(TokenKind::Identifier);
        self.make(kind, s, start)
    }
}

fn is_hotkey_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '_')
}
