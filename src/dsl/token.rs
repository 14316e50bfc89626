//! Token types for the hotscript lexer.

use std::fmt;

use crate::hotkey::HotkeyPattern;

/// A line/column location in the source (both 1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A token produced by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Semantic payload: decoded string contents, numeric text, identifier name.
    pub value: String,
    /// Verbatim source slice (string literals exclude their delimiters).
    pub raw: String,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn position(&self) -> Position {
        Position::new(self.line, self.column)
    }
}

/// Arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl BinaryOp {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '+' => Some(Self::Add),
            '-' => Some(Self::Sub),
            '*' => Some(Self::Mul),
            '/' => Some(Self::Div),
            '%' => Some(Self::Rem),
            _ => None,
        }
    }

    /// Binding strength for precedence climbing; higher binds tighter.
    pub fn precedence(self) -> u8 {
        match self {
            Self::Add | Self::Sub => 1,
            Self::Mul | Self::Div | Self::Rem => 2,
        }
    }

    pub fn symbol(self) -> char {
        match self {
            Self::Add => '+',
            Self::Sub => '-',
            Self::Mul => '*',
            Self::Div => '/',
            Self::Rem => '%',
        }
    }
}

/// The kind of token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Keywords
    Let,
    If,
    Else,

    // Punctuation
    OpenParen,
    CloseParen,
    OpenBrace,
    CloseBrace,
    Dot,
    Comma,
    Semicolon,
    Pipe,   // |
    Arrow,  // =>
    Equals, // =

    // Literals
    Number,
    String,
    Identifier,
    Hotkey(HotkeyPattern),

    // Operators
    BinaryOp(BinaryOp),

    // Structural
    NewLine,
    EndOfInput,

    /// A character no rule recognises; reported by the parser.
    Unknown,
}

impl TokenKind {
    /// Short human description used in parse errors.
    pub fn describe(&self) -> String {
        match self {
            Self::Let => "'let'".into(),
            Self::If => "'if'".into(),
            Self::Else => "'else'".into(),
            Self::OpenParen => "'('".into(),
            Self::CloseParen => "')'".into(),
            Self::OpenBrace => "'{'".into(),
            Self::CloseBrace => "'}'".into(),
            Self::Dot => "'.'".into(),
            Self::Comma => "','".into(),
            Self::Semicolon => "';'".into(),
            Self::Pipe => "'|'".into(),
            Self::Arrow => "'=>'".into(),
            Self::Equals => "'='".into(),
            Self::Number => "number".into(),
            Self::String => "string".into(),
            Self::Identifier => "identifier".into(),
            Self::Hotkey(p) => format!("hotkey {p}"),
            Self::BinaryOp(op) => format!("'{}'", op.symbol()),
            Self::NewLine => "newline".into(),
            Self::EndOfInput => "end of input".into(),
            Self::Unknown => "unknown character".into(),
        }
    }
}

/// Fixed keyword table.
pub fn keyword(ident: &str) -> Option<TokenKind> {
    match ident {
        "let" => Some(TokenKind::Let),
        "if" => Some(TokenKind::If),
        "else" => Some(TokenKind::Else),
        _ => None,
    }
}

/// Single-character punctuation table.
pub fn punctuation(c: char) -> Option<TokenKind> {
    match c {
        '(' => Some(TokenKind::OpenParen),
        ')' => Some(TokenKind::CloseParen),
        '{' => Some(TokenKind::OpenBrace),
        '}' => Some(TokenKind::CloseBrace),
        '.' => Some(TokenKind::Dot),
        ',' => Some(TokenKind::Comma),
        ';' => Some(TokenKind::Semicolon),
        '|' => Some(TokenKind::Pipe),
        _ => BinaryOp::from_char(c).map(TokenKind::BinaryOp),
    }
}
