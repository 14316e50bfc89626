//! Error types for the hotscript compiler and runtime.

use std::fmt;

use thiserror::Error;

use super::token::Position;
use crate::hotkey::HotkeyPattern;

/// Lexing fails only on a string literal that never closes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    #[error("[{line}:{column}] unterminated string literal")]
    UnterminatedString { line: usize, column: usize },
}

impl LexError {
    pub fn line(&self) -> usize {
        match self {
            Self::UnterminatedString { line, .. } => *line,
        }
    }
}

/// The first unexpected token aborts the parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("[{line}:{column}] expected {expected}, found {found}")]
pub struct ParseError {
    pub expected: String,
    pub found: String,
    pub line: usize,
    pub column: usize,
}

impl ParseError {
    pub fn new(expected: impl Into<String>, found: impl Into<String>, pos: Position) -> Self {
        Self {
            expected: expected.into(),
            found: found.into(),
            line: pos.line,
            column: pos.column,
        }
    }

    pub fn position(&self) -> Position {
        Position::new(self.line, self.column)
    }
}

/// Value categories named in type errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Number,
    Integer,
    String,
    Bool,
    Unit,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Number => "number",
            Self::Integer => "integer",
            Self::String => "string",
            Self::Bool => "bool",
            Self::Unit => "unit",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileErrorKind {
    UnknownSymbol {
        name: String,
    },
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
    },
    TypeMismatch {
        expected: ValueType,
        found: ValueType,
    },
    /// A call target or pipe stage that is not a name.
    NotCallable,
    DuplicateHotkey {
        pattern: HotkeyPattern,
        first: Position,
    },
    /// A hotkey binding inside a block; bindings are top-level only.
    NestedHotkey {
        pattern: HotkeyPattern,
    },
}

impl fmt::Display for CompileErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownSymbol { name } => write!(f, "unknown symbol '{name}'"),
            Self::ArityMismatch {
                name,
                expected,
                found,
            } => write!(
                f,
                "'{name}' takes {expected} argument(s) but {found} were supplied"
            ),
            Self::TypeMismatch { expected, found } => {
                write!(f, "type mismatch: expected {expected}, found {found}")
            }
            Self::NotCallable => f.write_str("expression is not callable"),
            Self::DuplicateHotkey { pattern, first } => {
                write!(f, "hotkey {pattern} is already bound at {first}")
            }
            Self::NestedHotkey { pattern } => {
                write!(f, "hotkey {pattern} must be bound at the top level")
            }
        }
    }
}

/// Symbol resolution or static type failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("[{position}] {kind}")]
pub struct CompileError {
    pub kind: CompileErrorKind,
    pub position: Position,
}

impl CompileError {
    pub fn new(kind: CompileErrorKind, position: Position) -> Self {
        Self { kind, position }
    }

    pub fn unknown_symbol(name: impl Into<String>, position: Position) -> Self {
        Self::new(CompileErrorKind::UnknownSymbol { name: name.into() }, position)
    }
}

/// A failure raised while a compiled unit executes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("[{position}] {message}")]
pub struct RuntimeError {
    pub message: String,
    pub position: Position,
}

impl RuntimeError {
    pub fn new(message: impl Into<String>, position: Position) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }
}

/// Anything that can stop a script from loading.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptError {
    #[error("lex error {0}")]
    Lex(#[from] LexError),
    #[error("parse error {0}")]
    Parse(#[from] ParseError),
    #[error("compile error {0}")]
    Compile(#[from] CompileError),
    #[error("load error {0}")]
    Runtime(#[from] RuntimeError),
}

impl ScriptError {
    pub fn position(&self) -> Position {
        match self {
            Self::Lex(LexError::UnterminatedString { line, column }) => {
                Position::new(*line, *column)
            }
            Self::Parse(e) => e.position(),
            Self::Compile(e) => e.position,
            Self::Runtime(e) => e.position,
        }
    }
}
