//! Abstract Syntax Tree for hotscript.
//!
//! Every node carries the [`Position`] it was parsed from. The tree owns its
//! children outright; there is no sharing between nodes.

use super::token::{BinaryOp, Position};
use crate::hotkey::HotkeyPattern;

/// A complete script: top-level statements in source order.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub statements: Vec<Stmt>,
}

impl Program {
    /// Hotkey bindings in source order.
    pub fn hotkeys(&self) -> impl Iterator<Item = (&HotkeyPattern, &Body, Position)> {
        self.statements.iter().filter_map(|s| match &s.kind {
            StmtKind::Hotkey { pattern, body } => Some((pattern, body, s.pos)),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub pos: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// `let name = value`
    Let { name: String, value: Expr },
    /// `Pattern => body`
    Hotkey { pattern: HotkeyPattern, body: Body },
    /// `if (cond) { .. } else { .. }`
    If {
        condition: Expr,
        then_block: Block,
        else_block: Option<Block>,
    },
    Expr(Expr),
}

/// The right-hand side of `=>`.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Expr(Expr),
    Block(Block),
}

/// A brace-delimited statement list.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub statements: Vec<Stmt>,
    pub pos: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub pos: Position,
}

impl Expr {
    pub fn new(kind: ExprKind, pos: Position) -> Self {
        Self { kind, pos }
    }

    /// Dotted name for a pure identifier/member chain (`text.upper`), if it is one.
    pub fn qualified_name(&self) -> Option<String> {
        match &self.kind {
            ExprKind::Identifier(name) => Some(name.clone()),
            ExprKind::MemberAccess { object, member } => {
                let mut root = object.qualified_name()?;
                root.push('.');
                root.push_str(member);
                Some(root)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Unary minus.
    Negate(Box<Expr>),
    /// `input | stage`: `stage` receives `input` as its first argument.
    Pipe {
        input: Box<Expr>,
        stage: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    MemberAccess {
        object: Box<Expr>,
        member: String,
    },
    Identifier(String),
    NumberLiteral(f64),
    StringLiteral(String),
}
